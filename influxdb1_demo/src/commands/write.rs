use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::Parser;
use observability_deps::tracing::info;
use serde_json::Value;

use super::common::InfluxDb1Config;

#[derive(Debug, Parser)]
#[clap(visible_alias = "w")]
pub(crate) struct Config {
    #[clap(flatten)]
    influxdb1_config: InfluxDb1Config,

    /// File holding a JSON object, an array of objects, or one object per
    /// line. Each object becomes one point.
    #[clap(short = 'f', long = "file")]
    file_path: PathBuf,

    /// Measurement for every point, replacing `InfluxMeasurement` keys
    #[clap(short = 'm', long = "measurement")]
    measurement: Option<String>,

    /// Key holding the time of each point
    #[clap(short = 't', long = "time-field", default_value = "time")]
    time_field: String,
}

pub(crate) async fn command(config: Config) -> anyhow::Result<()> {
    let contents = tokio::fs::read_to_string(&config.file_path)
        .await
        .with_context(|| format!("error reading file {}", config.file_path.display()))?;
    let documents = parse_documents(&contents)?;

    let mut client = config.influxdb1_config.mapping_client()?;
    client.use_time_field(&config.time_field);
    if let Some(measurement) = &config.measurement {
        client.use_measurement(measurement);
    }

    for (i, document) in documents.iter().enumerate() {
        client
            .write_json(document)
            .await
            .with_context(|| format!("writing document {i}"))?;
    }

    info!(
        points = documents.len(),
        database = %config.influxdb1_config.database_name,
        "write complete"
    );
    println!("success");

    Ok(())
}

/// Documents of a write file: one JSON value, an array, or JSON lines.
fn parse_documents(contents: &str) -> anyhow::Result<Vec<Value>> {
    match serde_json::from_str::<Value>(contents) {
        Ok(Value::Array(documents)) => Ok(documents),
        Ok(document) => Ok(vec![document]),
        Err(_) => {
            let documents = contents
                .lines()
                .enumerate()
                .filter(|(_, line)| !line.trim().is_empty())
                .map(|(n, line)| {
                    serde_json::from_str(line)
                        .with_context(|| format!("invalid JSON on line {}", n + 1))
                })
                .collect::<anyhow::Result<Vec<Value>>>()?;
            if documents.is_empty() {
                bail!("no documents to write");
            }
            Ok(documents)
        }
    }
}
