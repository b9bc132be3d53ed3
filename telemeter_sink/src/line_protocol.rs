use chrono::Utc;
use influxdb_line_protocol::LineProtocolBuilder;
use telemeter_core::{EvaluatedMeasurement, FieldValue};

use crate::error::{Result, SinkError};

/// Current wall-clock time in nanoseconds since the Unix epoch.
pub fn now_nanos() -> i64 {
    let now = Utc::now();
    now.timestamp_nanos_opt()
        .unwrap_or_else(|| now.timestamp_millis().saturating_mul(1_000_000))
}

/// Prepends `prefix.` to the measurement name when a non-empty prefix is set.
pub fn qualified_name(prefix: Option<&str>, measurement: &str) -> String {
    match prefix {
        Some(prefix) if !prefix.is_empty() => format!("{}.{}", prefix, measurement),
        _ => measurement.to_string(),
    }
}

/// Serializes one measurement as a single newline-terminated line.
///
/// Tags and fields come out in key order and tags with an empty value are
/// left out. `default_timestamp` is used when the measurement carries none
/// of its own. Names containing line breaks, empty names and keys, and
/// non-finite floats are rejected so one bad measurement never corrupts a
/// batched datagram.
pub fn to_line(
    measurement: &EvaluatedMeasurement,
    prefix: Option<&str>,
    default_timestamp: i64,
) -> Result<String> {
    let mut fields = measurement.fields.iter();
    let Some((first_key, first_value)) = fields.next() else {
        return Err(SinkError::NoFields(measurement.measurement.clone()));
    };

    let name = qualified_name(prefix, &measurement.measurement);
    check_identifier(measurement, "measurement name", &name)?;
    for (key, value) in &measurement.tags {
        check_identifier(measurement, "tag key", key)?;
        check_line_breaks(measurement, "tag value", value)?;
    }
    for (key, value) in &measurement.fields {
        check_identifier(measurement, "field key", key)?;
        if let FieldValue::Float(f) = value {
            if !f.is_finite() {
                return Err(invalid(measurement, format!("field '{}' is {}", key, f)));
            }
        }
    }

    let mut builder = LineProtocolBuilder::new().measurement(&name);
    for (key, value) in measurement.tags.iter().filter(|(_, value)| !value.is_empty()) {
        builder = builder.tag(key.as_str(), value.as_str());
    }

    let key = first_key.as_str();
    let mut line = match first_value {
        FieldValue::Integer(i) => builder.field(key, *i),
        FieldValue::UnsignedInteger(u) => builder.field(key, *u),
        FieldValue::Float(f) => builder.field(key, *f),
        FieldValue::Boolean(b) => builder.field(key, *b),
        FieldValue::String(s) => builder.field(key, s.as_str()),
    };

    for (key, value) in fields {
        let key = key.as_str();
        line = match value {
            FieldValue::Integer(i) => line.field(key, *i),
            FieldValue::UnsignedInteger(u) => line.field(key, *u),
            FieldValue::Float(f) => line.field(key, *f),
            FieldValue::Boolean(b) => line.field(key, *b),
            FieldValue::String(s) => line.field(key, s.as_str()),
        };
    }

    let timestamp = measurement.timestamp.unwrap_or(default_timestamp);
    let bytes = line.timestamp(timestamp).close_line().build();
    Ok(String::from_utf8(bytes)?)
}

fn invalid(measurement: &EvaluatedMeasurement, reason: String) -> SinkError {
    SinkError::InvalidLine {
        measurement: measurement.measurement.clone(),
        reason,
    }
}

fn check_identifier(measurement: &EvaluatedMeasurement, what: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(invalid(measurement, format!("empty {}", what)));
    }
    check_line_breaks(measurement, what, value)
}

// Line protocol has no escape for line breaks outside string field values.
fn check_line_breaks(measurement: &EvaluatedMeasurement, what: &str, value: &str) -> Result<()> {
    if value.contains(['\n', '\r']) {
        return Err(invalid(measurement, format!("{} {:?} contains a line break", what, value)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use influxdb_line_protocol::{parse_lines, FieldValue as ParsedValue};

    const TS: i64 = 1_609_459_200_000_000_000;

    #[test]
    fn test_typed_fields() {
        let measurement = EvaluatedMeasurement::new("mixed")
            .tag("app", "test")
            .field("int_val", -42i64)
            .field("uint_val", 42u64)
            .field("float_val", 1.5)
            .field("bool_val", true)
            .field("string_val", "hello world");

        let line = to_line(&measurement, None, TS).unwrap();

        assert!(line.starts_with("mixed,app=test "));
        assert!(line.contains("int_val=-42i"));
        assert!(line.contains("uint_val=42u"));
        assert!(line.contains("float_val=1.5"));
        assert!(line.contains("bool_val=true"));
        assert!(line.contains("string_val=\"hello world\""));
        assert!(line.ends_with(&format!(" {}\n", TS)));
    }

    #[test]
    fn test_tags_and_fields_sorted() {
        let measurement = EvaluatedMeasurement::new("m")
            .tag("zone", "b")
            .tag("app", "a")
            .field("z", 1i64)
            .field("a", 2i64)
            .timestamp(5);

        let line = to_line(&measurement, None, TS).unwrap();
        assert_eq!(line, "m,app=a,zone=b a=2i,z=1i 5\n");
    }

    #[test]
    fn test_escaping() {
        let measurement = EvaluatedMeasurement::new("a,b")
            .tag("t k", "v=1")
            .field("f k", "a \"b\"")
            .timestamp(123);

        let line = to_line(&measurement, None, TS).unwrap();
        assert_eq!(line, "a\\,b,t\\ k=v\\=1 f\\ k=\"a \\\"b\\\"\" 123\n");

        let parsed = parse_lines(&line).next().unwrap().unwrap();
        assert_eq!(parsed.series.measurement.to_string(), "a,b");
        let tags = parsed.series.tag_set.unwrap();
        assert_eq!(tags[0].0.to_string(), "t k");
        assert_eq!(tags[0].1.to_string(), "v=1");
        assert_eq!(parsed.field_set[0].0.to_string(), "f k");
        match &parsed.field_set[0].1 {
            ParsedValue::String(s) => assert_eq!(s.to_string(), "a \"b\""),
            other => panic!("unexpected field value {:?}", other),
        }
        assert_eq!(parsed.timestamp, Some(123));
    }

    #[test]
    fn test_prefix() {
        let measurement = EvaluatedMeasurement::new("requests").field("count", 1i64);

        let line = to_line(&measurement, Some("api"), TS).unwrap();
        assert!(line.starts_with("api.requests "));

        let unprefixed = to_line(&measurement, Some(""), TS).unwrap();
        assert!(unprefixed.starts_with("requests "));
    }

    #[test]
    fn test_default_timestamp() {
        let measurement = EvaluatedMeasurement::new("m").field("v", 1i64);
        let line = to_line(&measurement, None, TS).unwrap();

        let parsed = parse_lines(&line).next().unwrap().unwrap();
        assert_eq!(parsed.timestamp, Some(TS));
        assert!(matches!(parsed.field_set[0].1, ParsedValue::I64(1)));
    }

    #[test]
    fn test_no_fields() {
        let measurement = EvaluatedMeasurement::new("empty").tag("a", "b");
        assert!(matches!(
            to_line(&measurement, None, TS),
            Err(SinkError::NoFields(name)) if name == "empty"
        ));
    }

    fn rejected(measurement: EvaluatedMeasurement) -> String {
        match to_line(&measurement, None, TS) {
            Err(SinkError::InvalidLine { reason, .. }) => reason,
            other => panic!("expected InvalidLine, got {:?}", other),
        }
    }

    #[test]
    fn test_line_break_in_tag_value_rejected() {
        let reason = rejected(EvaluatedMeasurement::new("m").tag("t", "a\nb").field("v", 1i64));
        assert!(reason.contains("tag value"), "{}", reason);
    }

    #[test]
    fn test_line_break_in_names_rejected() {
        rejected(EvaluatedMeasurement::new("m\r").field("v", 1i64));
        rejected(EvaluatedMeasurement::new("m").tag("t\n", "a").field("v", 1i64));
        rejected(EvaluatedMeasurement::new("m").field("v\n", 1i64));
    }

    #[test]
    fn test_non_finite_float_rejected() {
        rejected(EvaluatedMeasurement::new("m").field("v", f64::NAN));
        rejected(EvaluatedMeasurement::new("m").field("v", f64::INFINITY));
        rejected(EvaluatedMeasurement::new("m").field("v", f64::NEG_INFINITY));
    }

    #[test]
    fn test_empty_names_rejected() {
        rejected(EvaluatedMeasurement::new("").field("v", 1i64));
        rejected(EvaluatedMeasurement::new("m").field("", 1i64));
        rejected(EvaluatedMeasurement::new("m").tag("", "a").field("v", 1i64));
    }

    #[test]
    fn test_empty_prefix_and_name_rejected() {
        let measurement = EvaluatedMeasurement::new("").field("v", 1i64);
        assert!(to_line(&measurement, Some("api"), TS).is_ok());
        assert!(to_line(&measurement, Some(""), TS).is_err());
    }

    #[test]
    fn test_empty_tag_value_skipped() {
        let measurement = EvaluatedMeasurement::new("m")
            .tag("empty", "")
            .tag("host", "a")
            .field("v", 1i64)
            .timestamp(1);

        let line = to_line(&measurement, None, TS).unwrap();
        assert_eq!(line, "m,host=a v=1i 1\n");

        let parsed: Vec<_> = parse_lines(&line).collect();
        assert_eq!(parsed.len(), 1);
        assert!(parsed[0].is_ok());
    }

    #[test]
    fn test_now_nanos_is_recent() {
        // 2020-01-01T00:00:00Z
        assert!(now_nanos() > 1_577_836_800_000_000_000);
    }
}
