//! Error types for the bus.

use thiserror::Error;

/// Main error type for bus operations.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("Unsupported subscriber for topic {topic}: expected Subscriber<T>, Sender<Arc<T>> or Arc<dyn Receiver<T>>, got {got}")]
    UnsupportedSubscriberKind { topic: &'static str, got: String },
}

/// Result type for bus operations.
pub type Result<T> = std::result::Result<T, BusError>;
