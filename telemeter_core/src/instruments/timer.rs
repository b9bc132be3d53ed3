use futures::FutureExt;
use std::time::Instant;

use super::{FieldCollector, Instrument, InstrumentKind, Invocation};

/// Measures wall-clock time from just before the call until it settles, on
/// success and on failure alike. Reported as integer nanoseconds.
#[derive(Debug, Clone, Copy, Default)]
pub struct Timer;

impl<T, E> Instrument<T, E> for Timer
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn kind(&self) -> InstrumentKind {
        InstrumentKind::Timer
    }

    fn instrument<F>(&self, collect: FieldCollector, call: F) -> Invocation<'static, T, E>
    where
        F: FnOnce() -> Invocation<'static, T, E>,
    {
        let start = Instant::now();

        match call() {
            Invocation::Sync(result) => {
                collect.collect(start.elapsed());
                Invocation::Sync(result)
            }
            Invocation::Async(future) => Invocation::Async(
                async move {
                    let result = future.await;
                    collect.collect(start.elapsed());
                    result
                }
                .boxed(),
            ),
        }
    }
}
