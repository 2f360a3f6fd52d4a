//! Process-wide bus and environment-scoped isolation.
//!
//! Libraries that cannot thread a [`Bus`] through their call graph can use
//! the free functions here. They resolve the active bus on every call:
//!
//! 1. If `PUBSUB_ISOLATE_SUBSYSTEM` names a live isolation scope, that
//!    scope's bus.
//! 2. Otherwise the global bus, created on first use.
//!
//! [`isolate`] installs a fresh bus for the duration of a guard, so a test
//! can run without seeing subscribers left behind by other tests. The
//! environment is process-wide, so only one isolation scope can be active
//! at a time; [`isolate`] blocks until the previous guard is dropped.
//!
//! Prefer passing a [`Bus`] explicitly. This module exists for code that
//! was written against a single global bus.

use crate::bus::Bus;
use crate::error::Result;
use crate::subscriptions::{Descriptor, Subscriber};
use crate::types::Message;
use parking_lot::{const_mutex, Mutex, MutexGuard};
use std::any::Any;
use std::collections::HashMap;
use std::env;
use std::ffi::OsString;
use std::sync::OnceLock;
use tracing::debug;
use uuid::Uuid;

/// Environment variable naming the active isolation scope.
pub const ISOLATE_ENV: &str = "PUBSUB_ISOLATE_SUBSYSTEM";

static GLOBAL: OnceLock<Bus> = OnceLock::new();

/// Isolated buses by scope name.
static SCOPES: OnceLock<Mutex<HashMap<String, Bus>>> = OnceLock::new();

/// Held by the active [`IsolationGuard`].
static EXCLUSIVE: Mutex<()> = const_mutex(());

fn scopes() -> &'static Mutex<HashMap<String, Bus>> {
    SCOPES.get_or_init(|| Mutex::new(HashMap::new()))
}

/// The process-wide bus, ignoring any isolation scope.
pub fn global() -> Bus {
    GLOBAL.get_or_init(Bus::new).clone()
}

/// The bus that free functions in this module currently use.
pub fn current() -> Bus {
    if let Some(scope) = env::var_os(ISOLATE_ENV) {
        if let Some(bus) = scope.to_str().and_then(|s| scopes().lock().get(s).cloned()) {
            return bus;
        }
    }
    global()
}

/// Install a fresh bus as the current one until the guard is dropped.
///
/// Blocks while another guard is alive.
pub fn isolate() -> IsolationGuard {
    let exclusive = EXCLUSIVE.lock();

    let scope = Uuid::new_v4().to_string();
    let bus = Bus::new();
    scopes().lock().insert(scope.clone(), bus.clone());

    let previous = env::var_os(ISOLATE_ENV);
    env::set_var(ISOLATE_ENV, &scope);
    debug!(scope = %scope, "isolation scope installed");

    IsolationGuard {
        scope,
        bus,
        previous,
        _exclusive: exclusive,
    }
}

/// Keeps an isolation scope active. Dropping it restores the previous
/// environment and discards the isolated bus.
///
/// The guard holds the scope lock and is `!Send`: drop it on the thread
/// that created it. Threads spawned inside the scope can take a clone of
/// [`IsolationGuard::bus`] or call [`current`].
pub struct IsolationGuard {
    scope: String,
    bus: Bus,
    previous: Option<OsString>,
    _exclusive: MutexGuard<'static, ()>,
}

impl IsolationGuard {
    /// Scope name, as stored in [`ISOLATE_ENV`].
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// The isolated bus.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }
}

impl Drop for IsolationGuard {
    fn drop(&mut self) {
        match self.previous.take() {
            Some(value) => env::set_var(ISOLATE_ENV, value),
            None => env::remove_var(ISOLATE_ENV),
        }
        scopes().lock().remove(&self.scope);
        debug!(scope = %self.scope, "isolation scope removed");
    }
}

impl std::fmt::Debug for IsolationGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IsolationGuard")
            .field("scope", &self.scope)
            .finish()
    }
}

// --- Free functions over the current bus ---

/// Publish on the current bus.
pub fn publish<T: Message>(message: T) -> usize {
    current().publish(message)
}

/// Subscribe on the current bus.
pub fn subscribe<T: Message>(subscriber: impl Into<Subscriber<T>>) -> Descriptor {
    current().subscribe(subscriber)
}

/// Subscribe on the current bus, checking the consumer shape at runtime.
pub fn subscribe_any<T: Message, S: Any>(consumer: S) -> Result<Descriptor> {
    current().subscribe_any::<T, S>(consumer)
}

/// Unsubscribe from the current bus.
///
/// Descriptors from another bus are ignored.
pub fn unsubscribe(descriptor: &Descriptor) {
    current().unsubscribe(descriptor)
}
