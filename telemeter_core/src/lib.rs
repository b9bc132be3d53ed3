pub mod error;
pub mod instruments;
pub mod payload;
pub mod registry;
pub mod wrapper;

pub use error::{Result, TelemetryError};
pub use instruments::{
    ExceptionMeter, FieldCollector, Gauge, Instrument, InstrumentKind, Invocation, Meter, Timer,
};
pub use payload::{Dynamic, EvaluatedMeasurement, FieldValue, Fields, MeasurementSpec, Tags};
pub use registry::{Collector, CollectorRegistry, DynCollector, Origin};
pub use wrapper::{exception_metered, gauged, metered, timed, wrap, Wrapped, Wrapper};
