use anyhow::Result;
use telemeter_sink::{now_nanos, to_line};

use super::MeasurementArgs;

pub fn execute(args: MeasurementArgs) -> Result<()> {
    let line = to_line(&args.to_measurement(), args.prefix.as_deref(), now_nanos())?;
    print!("{}", line);
    Ok(())
}
