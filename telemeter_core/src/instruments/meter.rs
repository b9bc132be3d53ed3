use super::{FieldCollector, Instrument, InstrumentKind, Invocation};

/// Counts invocations. Collects `1` at call time, before the callable runs,
/// independent of how (or whether) it completes.
#[derive(Debug, Clone, Copy, Default)]
pub struct Meter;

impl<T, E> Instrument<T, E> for Meter {
    fn kind(&self) -> InstrumentKind {
        InstrumentKind::Meter
    }

    fn instrument<F>(&self, collect: FieldCollector, call: F) -> Invocation<'static, T, E>
    where
        F: FnOnce() -> Invocation<'static, T, E>,
    {
        collect.collect(1i64);
        call()
    }
}
