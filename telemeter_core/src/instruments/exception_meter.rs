use futures::FutureExt;

use super::{FieldCollector, Instrument, InstrumentKind, Invocation};

/// Counts failures. Collects `1` when the callable returns (or its future
/// resolves to) an error, then hands that same error back to the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExceptionMeter;

impl<T, E> Instrument<T, E> for ExceptionMeter
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn kind(&self) -> InstrumentKind {
        InstrumentKind::ExceptionMeter
    }

    fn instrument<F>(&self, collect: FieldCollector, call: F) -> Invocation<'static, T, E>
    where
        F: FnOnce() -> Invocation<'static, T, E>,
    {
        match call() {
            Invocation::Sync(result) => {
                if result.is_err() {
                    collect.collect(1i64);
                }
                Invocation::Sync(result)
            }
            Invocation::Async(future) => Invocation::Async(
                async move {
                    let result = future.await;
                    if result.is_err() {
                        collect.collect(1i64);
                    }
                    result
                }
                .boxed(),
            ),
        }
    }
}
