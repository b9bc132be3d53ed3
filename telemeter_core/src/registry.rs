use arc_swap::ArcSwapOption;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, trace};

use crate::error::{Result, TelemetryError};
use crate::instruments::InstrumentKind;
use crate::payload::{EvaluatedMeasurement, FieldValue, Fields, MeasurementSpec};

/// Receives every evaluated measurement. This is the only interface a
/// backend has to implement.
pub trait Collector: Send + Sync {
    fn collect(&self, measurement: &EvaluatedMeasurement) -> anyhow::Result<()>;
}

impl<F> Collector for F
where
    F: Fn(&EvaluatedMeasurement) -> anyhow::Result<()> + Send + Sync,
{
    fn collect(&self, measurement: &EvaluatedMeasurement) -> anyhow::Result<()> {
        self(measurement)
    }
}

pub type DynCollector = Arc<dyn Collector>;

/// Identifies the instrument and callable a value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub instrument: InstrumentKind,
    pub target: String,
}

impl Origin {
    pub fn new(instrument: InstrumentKind, target: impl Into<String>) -> Self {
        Self {
            instrument,
            target: target.into(),
        }
    }
}

/// Holds the single active collector and turns raw instrument values into
/// evaluated measurements for it.
///
/// Built once by the application and shared as `Arc<CollectorRegistry>` with
/// every wrapper. Installing a collector replaces the previous one; calls
/// already dispatching keep the collector they started with.
#[derive(Default)]
pub struct CollectorRegistry {
    collector: ArcSwapOption<DynCollector>,
}

impl CollectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set<C>(&self, collector: C)
    where
        C: Collector + 'static,
    {
        self.set_shared(Arc::new(collector));
    }

    pub fn set_shared(&self, collector: DynCollector) {
        self.collector.store(Some(Arc::new(collector)));
        debug!("Collector installed");
    }

    pub fn clear(&self) {
        self.collector.store(None);
        debug!("Collector cleared");
    }

    pub fn get(&self) -> Option<DynCollector> {
        self.collector
            .load_full()
            .map(|installed| Arc::clone(&*installed))
    }

    pub fn is_set(&self) -> bool {
        self.collector.load().is_some()
    }

    /// Resolves every dynamic piece of `spec` against the call's arguments
    /// and receiver and folds the transformed value under the resolved key.
    pub fn evaluate<A, R>(
        spec: &MeasurementSpec<A, R>,
        args: &A,
        receiver: &R,
        origin: &Origin,
        value: FieldValue,
    ) -> EvaluatedMeasurement {
        let measurement = spec.measurement.resolve(args, receiver);
        let key = spec.key.resolve(args, receiver);
        let tags = spec.tags.resolve(args, receiver);

        let mut fields = Fields::new();
        fields.insert(key, spec.apply_transform(value));

        EvaluatedMeasurement {
            measurement,
            tags,
            fields,
            timestamp: None,
            instrument: Some(origin.instrument),
            target: Some(origin.target.clone()),
        }
    }

    /// Evaluates and delivers one value to the active collector. Does nothing
    /// when no collector is installed. Failures are logged, never returned.
    pub fn dispatch<A, R>(
        &self,
        spec: &MeasurementSpec<A, R>,
        args: &A,
        receiver: &R,
        origin: &Origin,
        value: FieldValue,
    ) {
        let Some(collector) = self.get() else {
            trace!(
                instrument = %origin.instrument,
                target = %origin.target,
                "No collector installed, skipping measurement"
            );
            return;
        };

        if let Err(e) = Self::deliver(collector.as_ref(), spec, args, receiver, origin, value) {
            error!(
                instrument = %origin.instrument,
                target = %origin.target,
                error = %e,
                "Measurement dropped"
            );
        }
    }

    fn deliver<A, R>(
        collector: &dyn Collector,
        spec: &MeasurementSpec<A, R>,
        args: &A,
        receiver: &R,
        origin: &Origin,
        value: FieldValue,
    ) -> Result<()> {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let measurement = Self::evaluate(spec, args, receiver, origin, value);
            collector.collect(&measurement)
        }));

        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(source)) => Err(TelemetryError::CollectorFailed {
                instrument: origin.instrument,
                target: origin.target.clone(),
                source,
            }),
            Err(payload) => Err(TelemetryError::from_panic(
                origin.instrument,
                &origin.target,
                payload,
            )),
        }
    }
}

impl fmt::Debug for CollectorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectorRegistry")
            .field("installed", &self.is_set())
            .finish()
    }
}
