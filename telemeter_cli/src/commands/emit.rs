use anyhow::{anyhow, Result};
use std::convert::Infallible;
use std::sync::Arc;
use telemeter_core::{gauged, CollectorRegistry, DynCollector, FieldValue, MeasurementSpec};
use telemeter_sink::{load_sink_config, SinkConfig, TelegrafSink};
use tracing::debug;

use super::{EmitArgs, MeasurementArgs};
use crate::ui;

pub async fn execute(args: EmitArgs, measurement: MeasurementArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => load_sink_config(path).await?,
        None => SinkConfig::from_env(),
    };
    if let Some(uri) = args.uri {
        config.uri = uri;
    }
    if measurement.prefix.is_some() {
        config.prefix = measurement.prefix.clone();
    }

    ui::print_header("Emitting Measurement");
    ui::print_field("Destination", config.destination());
    ui::print_field("Measurement", &measurement.measurement);

    let sink = Arc::new(TelegrafSink::configure(config)?);

    if args.gauge {
        emit_gauged(&sink, &measurement)?;
    } else {
        sink.send(&measurement.to_measurement());
    }

    let pending = sink.buffered();
    sink.flush();
    debug!(lines = pending, "Flushed remaining lines");

    ui::print_success(&format!("Sent to {}", sink.destination()));
    Ok(())
}

fn emit_gauged(sink: &Arc<TelegrafSink>, args: &MeasurementArgs) -> Result<()> {
    let (key, value) = args
        .fields
        .first()
        .cloned()
        .ok_or_else(|| anyhow!("at least one --field is required"))?;

    if args.fields.len() > 1 {
        ui::print_warning(&format!("Only '{}' is gauged, other fields are ignored", key));
    }
    if args.timestamp.is_some() {
        ui::print_warning("--timestamp is ignored for gauged measurements");
    }

    let registry = Arc::new(CollectorRegistry::new());
    let collector: DynCollector = sink.clone();
    registry.set_shared(collector);

    let mut spec: MeasurementSpec<(FieldValue,)> =
        MeasurementSpec::new(args.measurement.clone(), key);
    for (tag, tag_value) in &args.tags {
        spec = spec.tag(tag.clone(), tag_value.clone());
    }

    let report = gauged(&registry, spec).sync("telemeter-emit", |_: &(), (value,): (FieldValue,)| {
        Ok::<_, Infallible>(value)
    });
    report.call((value,)).wait()?;

    Ok(())
}
