//! Write a handful of environment samples and read them back.

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::Parser;
use influxdb1_mapper::{QueryOption, influx_record};
use observability_deps::tracing::{info, warn};

use super::common::InfluxDb1Config;

const MEASUREMENT: &str = "test";

#[derive(Debug, Parser)]
pub(crate) struct Config {
    #[clap(flatten)]
    influxdb1_config: InfluxDb1Config,

    /// Number of samples to write
    #[clap(short = 'n', long = "samples", default_value_t = 10)]
    samples: usize,
}

influx_record! {
    #[derive(Debug, Clone, Default)]
    pub(crate) struct EnvSample {
        pub(crate) influx_measurement: String,
        #[influx("time")]
        pub(crate) time: DateTime<Utc>,
        #[influx("location,tag")]
        pub(crate) location: String,
        #[influx("temperature")]
        pub(crate) temperature: f64,
        #[influx("humidity")]
        pub(crate) humidity: f64,
        #[influx("-")]
        pub(crate) id: String,
    }
}

// reads more fields than were written to show unused fields stay at their
// defaults
influx_record! {
    #[derive(Debug, Clone, Default)]
    pub(crate) struct EnvSampleRead {
        pub(crate) influx_measurement: String,
        #[influx("time")]
        pub(crate) time: DateTime<Utc>,
        #[influx("location,tag")]
        pub(crate) location: String,
        #[influx("city,tag,field")]
        pub(crate) city: String,
        #[influx("temperature")]
        pub(crate) temperature: f64,
        #[influx("humidity")]
        pub(crate) humidity: f64,
        #[influx("cycles")]
        pub(crate) cycles: f64,
        #[influx("-")]
        pub(crate) id: String,
    }
}

influx_record! {
    #[derive(Debug, Clone, Default)]
    pub(crate) struct MeasurementName {
        #[influx("name")]
        pub(crate) name: String,
    }
}

influx_record! {
    #[derive(Debug, Clone, Default)]
    pub(crate) struct Sum {
        #[influx("sum")]
        pub(crate) sum: f64,
    }
}

pub(crate) fn generate_samples(count: usize, now: DateTime<Utc>) -> Vec<EnvSample> {
    (0..count)
        .map(|i| EnvSample {
            influx_measurement: MEASUREMENT.to_owned(),
            // distinct timestamps so no sample overwrites another
            time: now + chrono::Duration::milliseconds(i as i64),
            location: "Rm 243".to_owned(),
            temperature: 70.0 + i as f64,
            humidity: 60.0 - i as f64,
            id: "12432as32".to_owned(),
        })
        .collect()
}

pub(crate) async fn command(config: Config) -> anyhow::Result<()> {
    let database = &config.influxdb1_config.database_name;
    let mut client = config.influxdb1_config.mapping_client()?;

    client
        .executor()
        .query(&format!(r#"CREATE DATABASE "{database}""#), "")
        .await
        .with_context(|| format!("creating database {database}"))?;
    info!(%database, "database initialized");

    for sample in generate_samples(config.samples, Utc::now()) {
        client
            .write_record(&sample)
            .await
            .context("error writing point")?;
    }

    let mut samples_read: Vec<EnvSampleRead> = vec![];
    let mut option = QueryOption::new().with_tags_return(0);
    client
        .decode_query(
            &format!("SELECT * FROM {MEASUREMENT} ORDER BY time DESC LIMIT {}", config.samples),
            &mut samples_read,
            &mut option,
        )
        .await
        .context("query error")?;
    info!(count = samples_read.len(), "samples read");
    for sample in &samples_read {
        info!(?sample, "sample");
    }
    info!(tags = ?option.tags(), "tag values");

    let mut measurements: Vec<MeasurementName> = vec![];
    if let Err(e) = client
        .decode_query("SHOW MEASUREMENTS", &mut measurements, &mut QueryOption::new())
        .await
    {
        warn!(error = %e, "listing measurements failed");
    }
    info!(?measurements, "measurements read");

    let mut sum: Vec<Sum> = vec![];
    if let Err(e) = client
        .decode_query(
            &format!("SELECT sum(temperature) FROM {MEASUREMENT}"),
            &mut sum,
            &mut QueryOption::new(),
        )
        .await
    {
        warn!(error = %e, "sum query failed");
    }
    info!(?sum, "sum read");

    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use influxdb1_mapper::{FieldValue, encode};
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn samples_encode_to_test_points() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let samples = generate_samples(3, now);
        assert_eq!(samples.len(), 3);

        let point = encode(&samples[2], None).unwrap();
        assert_eq!(point.measurement, "test");
        assert_eq!(point.time, Some(now + chrono::Duration::milliseconds(2)));
        assert_eq!(point.tags["location"], "Rm 243");
        assert_eq!(point.fields["temperature"], FieldValue::Float(72.0));
        assert_eq!(point.fields["humidity"], FieldValue::Float(58.0));
        assert!(!point.fields.contains_key("id"));
        assert!(!point.fields.contains_key("-"));
    }
}
