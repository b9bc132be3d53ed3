use thiserror::Error;

use crate::instruments::InstrumentKind;

#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Collector failed for {instrument} on '{target}': {source}")]
    CollectorFailed {
        instrument: InstrumentKind,
        target: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Collector panicked for {instrument} on '{target}': {message}")]
    CollectorPanicked {
        instrument: InstrumentKind,
        target: String,
        message: String,
    },
}

impl TelemetryError {
    pub(crate) fn from_panic(
        instrument: InstrumentKind,
        target: &str,
        payload: Box<dyn std::any::Any + Send>,
    ) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };

        Self::CollectorPanicked {
            instrument,
            target: target.to_string(),
            message,
        }
    }
}

pub type Result<T> = std::result::Result<T, TelemetryError>;
