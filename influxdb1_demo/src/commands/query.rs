use std::collections::BTreeMap;

use anyhow::Context;
use clap::Parser;
use influxdb1_mapper::{QueryOption, TagValues};
use observability_deps::tracing::info;
use serde_json::Value;

use super::common::InfluxDb1Config;

#[derive(Debug, Parser)]
#[clap(visible_alias = "q", trailing_var_arg = true)]
pub(crate) struct Config {
    #[clap(flatten)]
    influxdb1_config: InfluxDb1Config,

    /// Also print the observed values of every tag key of the measurement
    #[clap(long = "tags", default_value_t = false)]
    tags: bool,

    /// Maximum number of values printed per tag key, 0 for all
    #[clap(long = "tag-limit", default_value_t = 0)]
    tag_limit: usize,

    /// The InfluxQL query string to execute
    query: Vec<String>,
}

pub(crate) async fn command(config: Config) -> anyhow::Result<()> {
    let query = config.query.join(" ");
    let mut client = config.influxdb1_config.mapping_client()?;

    let mut option = QueryOption::new();
    if config.tags {
        option = option.with_tags_return(config.tag_limit);
    }

    let mut rows: Vec<BTreeMap<String, Value>> = vec![];
    client
        .decode_query(&query, &mut rows, &mut option)
        .await
        .with_context(|| format!("query failed: {query}"))?;

    info!(rows = rows.len(), "query complete");
    for row in &rows {
        println!("{}", serde_json::to_string(row)?);
    }

    if let Some(tags) = option.take_tags() {
        print!("{}", format_tags(&tags));
    }

    Ok(())
}

fn format_tags(tags: &TagValues) -> String {
    tags.iter()
        .map(|(key, values)| format!("{key}: {}\n", values.join(", ")))
        .collect()
}
