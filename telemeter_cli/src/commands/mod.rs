pub mod emit;
pub mod line;
pub mod validate;

use clap::Args;
use std::path::PathBuf;
use telemeter_core::{EvaluatedMeasurement, FieldValue};

#[derive(Args, Debug)]
pub struct EmitArgs {
    /// Listener URI, e.g. udp://telegraf:8094
    #[arg(short, long, env = "TELEGRAF_SOCKET_LISTENER_URI")]
    pub uri: Option<String>,

    /// Sink config file (YAML, TOML, or JSON)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Report the first field through a gauged function and the registry
    #[arg(short, long)]
    pub gauge: bool,
}

#[derive(Args, Debug, Clone)]
pub struct MeasurementArgs {
    /// Measurement name
    #[arg(short, long)]
    pub measurement: String,

    /// Field as key=value (repeatable)
    #[arg(short, long = "field", value_parser = parse_field, required = true)]
    pub fields: Vec<(String, FieldValue)>,

    /// Tag as key=value (repeatable)
    #[arg(short, long = "tag", value_parser = parse_tag)]
    pub tags: Vec<(String, String)>,

    /// Prefix prepended to the measurement name
    #[arg(short, long)]
    pub prefix: Option<String>,

    /// Timestamp in nanoseconds since the epoch (defaults to now)
    #[arg(long)]
    pub timestamp: Option<i64>,
}

impl MeasurementArgs {
    pub fn to_measurement(&self) -> EvaluatedMeasurement {
        let mut measurement = EvaluatedMeasurement::new(self.measurement.clone());
        for (key, value) in &self.tags {
            measurement = measurement.tag(key.clone(), value.clone());
        }
        for (key, value) in &self.fields {
            measurement = measurement.field(key.clone(), value.clone());
        }
        if let Some(timestamp) = self.timestamp {
            measurement = measurement.timestamp(timestamp);
        }
        measurement
    }
}

fn split_assignment(raw: &str) -> Result<(String, &str), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value)),
        _ => Err(format!("expected key=value, got '{}'", raw)),
    }
}

fn parse_tag(raw: &str) -> Result<(String, String), String> {
    let (key, value) = split_assignment(raw)?;
    Ok((key, value.to_string()))
}

fn parse_field(raw: &str) -> Result<(String, FieldValue), String> {
    let (key, value) = split_assignment(raw)?;
    Ok((key, parse_value(value)))
}

/// Integer, then finite float, then boolean, otherwise string.
pub fn parse_value(raw: &str) -> FieldValue {
    if let Ok(i) = raw.parse::<i64>() {
        return FieldValue::Integer(i);
    }
    if let Ok(f) = raw.parse::<f64>() {
        if f.is_finite() {
            return FieldValue::Float(f);
        }
    }
    match raw {
        "true" => FieldValue::Boolean(true),
        "false" => FieldValue::Boolean(false),
        _ => FieldValue::String(raw.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_value_precedence() {
        assert_eq!(parse_value("42"), FieldValue::Integer(42));
        assert_eq!(parse_value("-7"), FieldValue::Integer(-7));
        assert_eq!(parse_value("1.5"), FieldValue::Float(1.5));
        assert_eq!(parse_value("true"), FieldValue::Boolean(true));
        assert_eq!(parse_value("NaN"), FieldValue::String("NaN".to_string()));
        assert_eq!(parse_value("ok"), FieldValue::String("ok".to_string()));
    }

    #[test]
    fn test_parse_assignments() {
        assert_eq!(
            parse_field("load=0.5").unwrap(),
            ("load".to_string(), FieldValue::Float(0.5))
        );
        assert_eq!(
            parse_tag("url=/a?b=c").unwrap(),
            ("url".to_string(), "/a?b=c".to_string())
        );
        assert!(parse_tag("novalue").is_err());
        assert!(parse_field("=1").is_err());
    }

    #[test]
    fn test_to_measurement() {
        let args = MeasurementArgs {
            measurement: "cpu".to_string(),
            fields: vec![("load".to_string(), FieldValue::Float(0.5))],
            tags: vec![("host".to_string(), "a".to_string())],
            prefix: None,
            timestamp: Some(7),
        };

        let measurement = args.to_measurement();
        assert_eq!(measurement.measurement, "cpu");
        assert_eq!(measurement.tags["host"], "a");
        assert_eq!(measurement.fields["load"], FieldValue::Float(0.5));
        assert_eq!(measurement.timestamp, Some(7));
    }
}
