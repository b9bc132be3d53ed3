use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::instruments::InstrumentKind;

pub type Tags = BTreeMap<String, String>;
pub type Fields = BTreeMap<String, FieldValue>;

/// A scalar carried in the field set of a measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    UnsignedInteger(u64),
    Float(f64),
    Boolean(bool),
    String(String),
}

impl FieldValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Integer(v) => Some(*v as f64),
            FieldValue::UnsignedInteger(v) => Some(*v as f64),
            FieldValue::Float(v) => Some(*v),
            FieldValue::Boolean(_) | FieldValue::String(_) => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Integer(v) => write!(f, "{}", v),
            FieldValue::UnsignedInteger(v) => write!(f, "{}", v),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Boolean(v) => write!(f, "{}", v),
            FieldValue::String(v) => write!(f, "{}", v),
        }
    }
}

macro_rules! impl_from_signed {
    ($($t:ty),*) => {
        $(impl From<$t> for FieldValue {
            fn from(value: $t) -> Self {
                FieldValue::Integer(value as i64)
            }
        })*
    };
}

macro_rules! impl_from_unsigned {
    ($($t:ty),*) => {
        $(impl From<$t> for FieldValue {
            fn from(value: $t) -> Self {
                FieldValue::UnsignedInteger(value as u64)
            }
        })*
    };
}

impl_from_signed!(i8, i16, i32, i64);
impl_from_unsigned!(u8, u16, u32, u64);

impl From<isize> for FieldValue {
    fn from(value: isize) -> Self {
        FieldValue::Integer(value as i64)
    }
}

impl From<usize> for FieldValue {
    fn from(value: usize) -> Self {
        FieldValue::UnsignedInteger(value as u64)
    }
}

impl From<f32> for FieldValue {
    fn from(value: f32) -> Self {
        FieldValue::Float(f64::from(value))
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Boolean(value)
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

/// Durations are reported as whole nanoseconds, saturating at `i64::MAX`.
impl From<Duration> for FieldValue {
    fn from(value: Duration) -> Self {
        FieldValue::Integer(i64::try_from(value.as_nanos()).unwrap_or(i64::MAX))
    }
}

/// A spec field that is either fixed up front or computed from the
/// arguments and receiver of each call.
pub enum Dynamic<T, A, R = ()> {
    Literal(T),
    Computed(Arc<dyn Fn(&A, &R) -> T + Send + Sync>),
}

impl<T: Clone, A, R> Dynamic<T, A, R> {
    pub fn computed<F>(f: F) -> Self
    where
        F: Fn(&A, &R) -> T + Send + Sync + 'static,
    {
        Dynamic::Computed(Arc::new(f))
    }

    pub fn resolve(&self, args: &A, receiver: &R) -> T {
        match self {
            Dynamic::Literal(value) => value.clone(),
            Dynamic::Computed(f) => f(args, receiver),
        }
    }

    pub fn is_computed(&self) -> bool {
        matches!(self, Dynamic::Computed(_))
    }
}

impl<T: Clone, A, R> Clone for Dynamic<T, A, R> {
    fn clone(&self) -> Self {
        match self {
            Dynamic::Literal(value) => Dynamic::Literal(value.clone()),
            Dynamic::Computed(f) => Dynamic::Computed(Arc::clone(f)),
        }
    }
}

impl<T: fmt::Debug, A, R> fmt::Debug for Dynamic<T, A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dynamic::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            Dynamic::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

impl<A, R> From<&str> for Dynamic<String, A, R> {
    fn from(value: &str) -> Self {
        Dynamic::Literal(value.to_string())
    }
}

impl<A, R> From<String> for Dynamic<String, A, R> {
    fn from(value: String) -> Self {
        Dynamic::Literal(value)
    }
}

pub type Transform = Arc<dyn Fn(FieldValue) -> FieldValue + Send + Sync>;

/// Describes what to emit for one wrapped callable.
///
/// `A` is the argument bundle the callable receives (usually a tuple) and `R`
/// its receiver; free functions use `()`. Dynamic fields are resolved once per
/// call with the same arguments and receiver the callable saw.
pub struct MeasurementSpec<A, R = ()> {
    pub measurement: Dynamic<String, A, R>,
    pub key: Dynamic<String, A, R>,
    pub tags: Dynamic<Tags, A, R>,
    pub transform: Option<Transform>,
}

impl<A, R> MeasurementSpec<A, R> {
    pub fn new(
        measurement: impl Into<Dynamic<String, A, R>>,
        key: impl Into<Dynamic<String, A, R>>,
    ) -> Self {
        Self {
            measurement: measurement.into(),
            key: key.into(),
            tags: Dynamic::Literal(Tags::new()),
            transform: None,
        }
    }

    pub fn measurement_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&A, &R) -> String + Send + Sync + 'static,
    {
        self.measurement = Dynamic::computed(f);
        self
    }

    pub fn key_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&A, &R) -> String + Send + Sync + 'static,
    {
        self.key = Dynamic::computed(f);
        self
    }

    /// Adds a static tag. Has no effect once the tags are computed.
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        if let Dynamic::Literal(tags) = &mut self.tags {
            tags.insert(key.into(), value.into());
        }
        self
    }

    pub fn tags(mut self, tags: Tags) -> Self {
        self.tags = Dynamic::Literal(tags);
        self
    }

    pub fn tags_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&A, &R) -> Tags + Send + Sync + 'static,
    {
        self.tags = Dynamic::computed(f);
        self
    }

    pub fn transform<F>(mut self, f: F) -> Self
    where
        F: Fn(FieldValue) -> FieldValue + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(f));
        self
    }

    pub fn apply_transform(&self, value: FieldValue) -> FieldValue {
        match &self.transform {
            Some(transform) => transform(value),
            None => value,
        }
    }
}

impl<A, R> fmt::Debug for MeasurementSpec<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MeasurementSpec")
            .field("measurement", &self.measurement)
            .field("key", &self.key)
            .field("tags", &self.tags)
            .field("transform", &self.transform.is_some())
            .finish()
    }
}

/// A measurement with every dynamic piece resolved for one specific call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluatedMeasurement {
    pub measurement: String,
    #[serde(default)]
    pub tags: Tags,
    pub fields: Fields,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub instrument: Option<InstrumentKind>,
    #[serde(default)]
    pub target: Option<String>,
}

impl EvaluatedMeasurement {
    pub fn new(measurement: impl Into<String>) -> Self {
        Self {
            measurement: measurement.into(),
            tags: Tags::new(),
            fields: Fields::new(),
            timestamp: None,
            instrument: None,
            target: None,
        }
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn origin(mut self, instrument: InstrumentKind, target: impl Into<String>) -> Self {
        self.instrument = Some(instrument);
        self.target = Some(target.into());
        self
    }
}
