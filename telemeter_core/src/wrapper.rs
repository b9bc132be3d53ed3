use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::instruments::{
    ExceptionMeter, FieldCollector, Gauge, Instrument, InstrumentKind, Invocation, Meter, Timer,
};
use crate::payload::MeasurementSpec;
use crate::registry::{CollectorRegistry, Origin};

/// Binds a spec to an instrument. Turn it into a callable with
/// [`Wrapper::build`], [`Wrapper::sync`] or [`Wrapper::future`].
pub fn wrap<I, A, R>(
    registry: &Arc<CollectorRegistry>,
    instrument: I,
    spec: MeasurementSpec<A, R>,
) -> Wrapper<I, A, R> {
    Wrapper {
        registry: Arc::clone(registry),
        instrument,
        spec: Arc::new(spec),
    }
}

pub fn metered<A, R>(
    registry: &Arc<CollectorRegistry>,
    spec: MeasurementSpec<A, R>,
) -> Wrapper<Meter, A, R> {
    wrap(registry, Meter, spec)
}

pub fn timed<A, R>(
    registry: &Arc<CollectorRegistry>,
    spec: MeasurementSpec<A, R>,
) -> Wrapper<Timer, A, R> {
    wrap(registry, Timer, spec)
}

pub fn gauged<A, R>(
    registry: &Arc<CollectorRegistry>,
    spec: MeasurementSpec<A, R>,
) -> Wrapper<Gauge, A, R> {
    wrap(registry, Gauge, spec)
}

pub fn exception_metered<A, R>(
    registry: &Arc<CollectorRegistry>,
    spec: MeasurementSpec<A, R>,
) -> Wrapper<ExceptionMeter, A, R> {
    wrap(registry, ExceptionMeter, spec)
}

pub struct Wrapper<I, A, R = ()> {
    registry: Arc<CollectorRegistry>,
    instrument: I,
    spec: Arc<MeasurementSpec<A, R>>,
}

impl<I, A, R> Wrapper<I, A, R> {
    /// Produces the replacement for `target`. `name` identifies the callable
    /// in every measurement it emits.
    pub fn build<T, E, F>(self, name: impl Into<String>, target: F) -> Wrapped<I, A, R, F>
    where
        I: Instrument<T, E>,
        F: Fn(&R, A) -> Invocation<'static, T, E>,
    {
        let origin = Origin::new(self.instrument.kind(), name);
        Wrapped {
            registry: self.registry,
            instrument: self.instrument,
            spec: self.spec,
            origin: Arc::new(origin),
            target,
        }
    }

    pub fn sync<T, E, F>(
        self,
        name: impl Into<String>,
        target: F,
    ) -> Wrapped<I, A, R, impl Fn(&R, A) -> Invocation<'static, T, E>>
    where
        I: Instrument<T, E>,
        F: Fn(&R, A) -> Result<T, E>,
    {
        self.build(name, move |receiver: &R, args: A| {
            Invocation::Sync(target(receiver, args))
        })
    }

    pub fn future<T, E, F, Fut>(
        self,
        name: impl Into<String>,
        target: F,
    ) -> Wrapped<I, A, R, impl Fn(&R, A) -> Invocation<'static, T, E>>
    where
        I: Instrument<T, E>,
        F: Fn(&R, A) -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        self.build(name, move |receiver: &R, args: A| {
            Invocation::future(target(receiver, args))
        })
    }
}

/// An instrumented callable. Behaves exactly like the target it wraps: same
/// receiver, same arguments, same result or error.
pub struct Wrapped<I, A, R, F> {
    registry: Arc<CollectorRegistry>,
    instrument: I,
    spec: Arc<MeasurementSpec<A, R>>,
    origin: Arc<Origin>,
    target: F,
}

impl<I, A, R, F> Wrapped<I, A, R, F> {
    pub fn name(&self) -> &str {
        &self.origin.target
    }

    pub fn kind(&self) -> InstrumentKind {
        self.origin.instrument
    }

    /// Invokes the target as a method of `receiver`.
    ///
    /// `args` and `receiver` are cloned on every call, whether or not a
    /// collector is installed: the collection callback owns its copies so it
    /// can run after an async target settles. Pass cheap handles (`Arc`,
    /// small tuples) when the arguments are large.
    pub fn call_on<T, E>(&self, receiver: &R, args: A) -> Invocation<'static, T, E>
    where
        I: Instrument<T, E>,
        F: Fn(&R, A) -> Invocation<'static, T, E>,
        A: Clone + Send + 'static,
        R: Clone + Send + 'static,
    {
        let collect = self.collector(receiver.clone(), args.clone());
        self.instrument
            .instrument(collect, || (self.target)(receiver, args))
    }

    fn collector(&self, receiver: R, args: A) -> FieldCollector
    where
        A: Send + 'static,
        R: Send + 'static,
    {
        let registry = Arc::clone(&self.registry);
        let spec = Arc::clone(&self.spec);
        let origin = Arc::clone(&self.origin);

        FieldCollector::new(move |value| {
            registry.dispatch(&spec, &args, &receiver, &origin, value);
        })
    }
}

impl<I, A, F> Wrapped<I, A, (), F> {
    pub fn call<T, E>(&self, args: A) -> Invocation<'static, T, E>
    where
        I: Instrument<T, E>,
        F: Fn(&(), A) -> Invocation<'static, T, E>,
        A: Clone + Send + 'static,
    {
        self.call_on(&(), args)
    }
}

impl<I, A, R, F> fmt::Debug for Wrapped<I, A, R, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wrapped")
            .field("instrument", &self.origin.instrument)
            .field("target", &self.origin.target)
            .finish()
    }
}
