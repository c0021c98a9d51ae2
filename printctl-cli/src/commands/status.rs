//! One-shot printer status readout.

use printctl::client::Reply;
use printctl::ControlResult;
use serde_json::{json, Value};

use super::common::DeviceArgs;
use crate::error::CliError;

pub fn run(args: DeviceArgs) -> Result<(), CliError> {
    let printer = args.connect()?;

    if !printer.is_accessible()? {
        tracing::warn!(device = %args.name, "Credentials were not accepted; some reads may fail");
    }

    let batch = printer.client().batch()?;
    let readings: Vec<(&str, ControlResult<Reply>)> = vec![
        ("status", printer.status()),
        ("job_state", printer.job_state()),
        ("bed_temp", printer.bed().temperature()),
        ("bed_target", printer.bed().target_temperature()),
        ("nozzle1_temp", printer.main_nozzle().temperature()),
        ("nozzle2_temp", printer.sub_nozzle().temperature()),
        ("amb_temp", printer.peripherals().ambient_temperature()),
    ];
    if let Err(e) = batch.execute() {
        tracing::warn!(error = %e, "Some readings failed");
    }

    let mut report = serde_json::Map::new();
    report.insert("device".into(), json!(args.name));
    for (name, reading) in readings {
        let value = reading.and_then(Reply::into_value).unwrap_or(Value::Null);
        report.insert(name.into(), value);
    }

    println!(
        "{}",
        serde_json::to_string_pretty(&Value::Object(report)).unwrap_or_default()
    );
    Ok(())
}
