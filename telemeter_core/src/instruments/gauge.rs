use futures::FutureExt;

use super::{FieldCollector, Instrument, InstrumentKind, Invocation};
use crate::payload::FieldValue;

/// Collects the callable's return value (or resolved value) once it
/// completes successfully. Failures propagate uncollected.
#[derive(Debug, Clone, Copy, Default)]
pub struct Gauge;

impl<T, E> Instrument<T, E> for Gauge
where
    T: Clone + Into<FieldValue> + Send + 'static,
    E: Send + 'static,
{
    fn kind(&self) -> InstrumentKind {
        InstrumentKind::Gauge
    }

    fn instrument<F>(&self, collect: FieldCollector, call: F) -> Invocation<'static, T, E>
    where
        F: FnOnce() -> Invocation<'static, T, E>,
    {
        match call() {
            Invocation::Sync(result) => {
                if let Ok(value) = &result {
                    collect.collect(value.clone());
                }
                Invocation::Sync(result)
            }
            Invocation::Async(future) => Invocation::Async(
                async move {
                    let result = future.await;
                    if let Ok(value) = &result {
                        collect.collect(value.clone());
                    }
                    result
                }
                .boxed(),
            ),
        }
    }
}
