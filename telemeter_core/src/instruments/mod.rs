pub mod exception_meter;
pub mod gauge;
pub mod meter;
pub mod timer;

use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::{Future, IntoFuture};

use crate::payload::FieldValue;

pub use exception_meter::ExceptionMeter;
pub use gauge::Gauge;
pub use meter::Meter;
pub use timer::Timer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentKind {
    Meter,
    Timer,
    Gauge,
    ExceptionMeter,
}

impl InstrumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstrumentKind::Meter => "meter",
            InstrumentKind::Timer => "timer",
            InstrumentKind::Gauge => "gauge",
            InstrumentKind::ExceptionMeter => "exception_meter",
        }
    }
}

impl fmt::Display for InstrumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The outcome of invoking a wrapped callable: either already settled, or a
/// future that settles later.
pub enum Invocation<'a, T, E> {
    Sync(Result<T, E>),
    Async(BoxFuture<'a, Result<T, E>>),
}

impl<'a, T, E> Invocation<'a, T, E> {
    pub fn ready(result: Result<T, E>) -> Self {
        Invocation::Sync(result)
    }

    pub fn future<F>(future: F) -> Self
    where
        F: Future<Output = Result<T, E>> + Send + 'a,
    {
        Invocation::Async(future.boxed())
    }

    pub fn is_async(&self) -> bool {
        matches!(self, Invocation::Async(_))
    }

    /// Resolves either variant to its result.
    pub async fn settle(self) -> Result<T, E> {
        match self {
            Invocation::Sync(result) => result,
            Invocation::Async(future) => future.await,
        }
    }

    /// Returns the result of a synchronous invocation immediately. An
    /// asynchronous invocation blocks the current thread until it settles, so
    /// never call this on an async invocation from inside a runtime worker.
    pub fn wait(self) -> Result<T, E> {
        match self {
            Invocation::Sync(result) => result,
            Invocation::Async(future) => futures::executor::block_on(future),
        }
    }
}

impl<'a, T, E> From<Result<T, E>> for Invocation<'a, T, E> {
    fn from(result: Result<T, E>) -> Self {
        Invocation::Sync(result)
    }
}

impl<'a, T: Send + 'a, E: Send + 'a> IntoFuture for Invocation<'a, T, E> {
    type Output = Result<T, E>;
    type IntoFuture = BoxFuture<'a, Result<T, E>>;

    fn into_future(self) -> Self::IntoFuture {
        match self {
            Invocation::Sync(result) => futures::future::ready(result).boxed(),
            Invocation::Async(future) => future,
        }
    }
}

impl<'a, T, E> fmt::Debug for Invocation<'a, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Invocation::Sync(result) => {
                let state = if result.is_ok() { "Ok(..)" } else { "Err(..)" };
                f.debug_tuple("Sync").field(&format_args!("{}", state)).finish()
            }
            Invocation::Async(_) => f.write_str("Async(..)"),
        }
    }
}

/// One-shot callback an instrument uses to hand a raw value to the registry.
pub struct FieldCollector {
    inner: Box<dyn FnOnce(FieldValue) + Send + 'static>,
}

impl FieldCollector {
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(FieldValue) + Send + 'static,
    {
        Self { inner: Box::new(f) }
    }

    /// A collector that drops whatever it receives.
    pub fn noop() -> Self {
        Self::new(|_| {})
    }

    pub fn collect(self, value: impl Into<FieldValue>) {
        (self.inner)(value.into())
    }
}

impl fmt::Debug for FieldCollector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FieldCollector")
    }
}

/// Strategy deciding what value is collected, and when, around a call.
///
/// Implementations must invoke `call` exactly once, keep the variant it
/// returns (sync stays sync, async stays async) and hand the caller the
/// callable's own result or error untouched.
pub trait Instrument<T, E>: Send + Sync {
    fn kind(&self) -> InstrumentKind;

    fn instrument<F>(&self, collect: FieldCollector, call: F) -> Invocation<'static, T, E>
    where
        F: FnOnce() -> Invocation<'static, T, E>;
}
