//! Tag key discovery and tag value collection.
//!
//! When a caller asks for the observed tag values of a query, the tag keys of
//! the queried measurement are resolved with a `show tag keys` command whose
//! result is cached per connection, database and measurement. The rows are
//! then flattened through a [`TagValuesCollector`] that keeps the distinct
//! values seen for each key.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
    time::Duration,
};

use iox_time::TimeProvider;
use observability_deps::tracing::debug;
use serde_json::Value;

use crate::{
    client::QueryExecutor,
    distinct_set::BoundedDistinctSet,
    error::{Error, Result},
    loading_cache::LoadingCache,
    point::Row,
    query::{database_from_query, show_tag_keys_command},
    value::tag_string,
};

/// Distinct values observed per tag key, sorted ascending.
pub type TagValues = BTreeMap<String, Vec<String>>;

/// Tag keys of a measurement.
pub type TagKeys = BTreeSet<String>;

/// How long discovered tag keys are reused.
pub const TAG_KEYS_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Per-query options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOption {
    return_tags: Option<TagValues>,
    return_tag_values_limit: usize,
    resolved_tag_keys: TagKeys,
}

impl QueryOption {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the observed values of every tag key of the measurement,
    /// keeping at most `limit` values per key (0 for no limit).
    pub fn with_tags_return(mut self, limit: usize) -> Self {
        self.return_tags = Some(TagValues::new());
        self.return_tag_values_limit = limit;
        self
    }

    pub fn wants_tags(&self) -> bool {
        self.return_tags.is_some()
    }

    pub fn return_tag_values_limit(&self) -> usize {
        self.return_tag_values_limit
    }

    /// Tag values collected by the last query, if they were requested.
    pub fn tags(&self) -> Option<&TagValues> {
        self.return_tags.as_ref()
    }

    pub fn take_tags(&mut self) -> Option<TagValues> {
        self.return_tags.take()
    }

    /// Tag keys resolved for the last query.
    pub fn resolved_tag_keys(&self) -> &TagKeys {
        &self.resolved_tag_keys
    }

    pub(crate) fn set_resolved_tag_keys(&mut self, keys: TagKeys) {
        self.resolved_tag_keys = keys;
    }

    /// Store collected values, if they were requested.
    pub(crate) fn set_tags(&mut self, tags: TagValues) {
        if let Some(return_tags) = &mut self.return_tags {
            *return_tags = tags;
        }
    }

    /// Collector for the next decode: a [`NoopTagCollector`] unless tag values
    /// were requested and keys resolved.
    pub fn collector(&self) -> Box<dyn TagCollector + Send> {
        if self.return_tags.is_none() || self.resolved_tag_keys.is_empty() {
            return Box::new(NoopTagCollector);
        }
        Box::new(TagValuesCollector::new(
            self.resolved_tag_keys.clone(),
            self.return_tag_values_limit,
        ))
    }
}

/// Receives every column and tag value seen while flattening rows.
pub trait TagCollector {
    fn collect(&mut self, key: &str, value: &Value);

    /// Values collected so far, one entry per resolved key.
    fn complete(&mut self) -> TagValues {
        TagValues::new()
    }
}

/// Collector used when no tag values were requested.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTagCollector;

impl TagCollector for NoopTagCollector {
    fn collect(&mut self, _key: &str, _value: &Value) {}
}

/// Keeps the distinct values of a fixed set of tag keys.
#[derive(Debug)]
pub struct TagValuesCollector {
    tag_keys: TagKeys,
    values: BTreeMap<String, BoundedDistinctSet>,
    limit: usize,
}

impl TagValuesCollector {
    pub fn new(tag_keys: TagKeys, limit: usize) -> Self {
        Self {
            tag_keys,
            values: BTreeMap::new(),
            limit,
        }
    }
}

impl TagCollector for TagValuesCollector {
    fn collect(&mut self, key: &str, value: &Value) {
        if !self.tag_keys.contains(key) {
            return;
        }
        let Some(value) = tag_string(value) else {
            return;
        };

        let limit = self.limit;
        self.values
            .entry(key.to_owned())
            .or_insert_with(|| BoundedDistinctSet::new(limit))
            .insert(value);
    }

    /// Keys without observed values map to an empty list.
    fn complete(&mut self) -> TagValues {
        let mut values = std::mem::take(&mut self.values);
        self.tag_keys
            .iter()
            .map(|k| {
                let observed = values
                    .remove(k)
                    .map(BoundedDistinctSet::into_sorted_vec)
                    .unwrap_or_default();
                (k.clone(), observed)
            })
            .collect()
    }
}

/// Identifies the tag keys of one measurement on one server.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TagKeysCacheKey {
    pub addr: String,
    pub database: String,
    pub measurement: String,
}

pub type TagKeysCache = LoadingCache<TagKeysCacheKey, TagKeys>;

/// A tag key cache holding entries for [`TAG_KEYS_TTL`].
pub fn tag_keys_cache(time_provider: Arc<dyn TimeProvider>) -> TagKeysCache {
    LoadingCache::new(TAG_KEYS_TTL, time_provider)
}

/// Resolve the tag keys of the measurement of the first series in `series`.
///
/// The database is `database` when set, otherwise the one named by a
/// qualified `query`. A failed discovery command is returned as
/// [`Error::Discovery`].
pub async fn resolve_tag_keys<Q>(
    executor: &Q,
    cache: &TagKeysCache,
    query: &str,
    database: &str,
    series: &[Row],
) -> Result<TagKeys>
where
    Q: QueryExecutor + ?Sized,
{
    let Some(first) = series.first() else {
        return Ok(TagKeys::new());
    };

    let database = if database.is_empty() {
        database_from_query(query).unwrap_or_default()
    } else {
        database.to_owned()
    };

    let key = TagKeysCacheKey {
        addr: executor.addr().to_owned(),
        database,
        measurement: first.name.clone(),
    };

    cache
        .get(key, |key| {
            let command = show_tag_keys_command(&key.measurement);
            let database = key.database.clone();
            async move {
                debug!(%command, %database, "discovering tag keys");
                match executor.execute(&command, &database).await {
                    Ok(rows) => Ok(tag_keys_from_rows(&rows)),
                    Err(source) => Err(Error::Discovery { command, source }),
                }
            }
        })
        .await
}

/// First column of every value of the first series.
fn tag_keys_from_rows(rows: &[Row]) -> TagKeys {
    rows.first()
        .map(|row| {
            row.values
                .iter()
                .filter_map(|values| values.first()?.as_str().map(str::to_owned))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use iox_time::{MockProvider, Time};
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use test_helpers::assert_contains;

    use super::*;
    use crate::error::DynError;

    #[derive(Debug, Default)]
    struct ShowTagKeys {
        calls: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl QueryExecutor for ShowTagKeys {
        fn addr(&self) -> &str {
            "http://localhost:8086"
        }

        async fn execute(
            &self,
            command: &str,
            database: &str,
        ) -> Result<Vec<Row>, DynError> {
            self.calls
                .lock()
                .push((command.to_owned(), database.to_owned()));
            if self.fail {
                return Err("database not found: nope".into());
            }
            Ok(vec![
                Row::new("cpu", ["tagKey"])
                    .with_values(vec![json!("host")])
                    .with_values(vec![json!("region")]),
            ])
        }
    }

    fn cache() -> TagKeysCache {
        tag_keys_cache(Arc::new(MockProvider::new(Time::from_timestamp_nanos(0))))
    }

    fn keys(keys: &[&str]) -> TagKeys {
        keys.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn query_option_defaults_to_no_tags() {
        let mut option = QueryOption::new();
        assert!(!option.wants_tags());
        option.set_tags(TagValues::from([("a".to_owned(), vec![])]));
        assert_eq!(option.tags(), None);

        let option = QueryOption::new().with_tags_return(10);
        assert!(option.wants_tags());
        assert_eq!(option.return_tag_values_limit(), 10);
        assert_eq!(option.tags(), Some(&TagValues::new()));
    }

    #[test]
    fn collector_limits_values_per_key() {
        let mut collector = TagValuesCollector::new(keys(&["host", "port"]), 2);
        for v in ["c", "a", "b", "a"] {
            collector.collect("host", &json!(v));
        }
        collector.collect("port", &json!(8086));
        collector.collect("port", &json!(8086.0));
        collector.collect("port", &Value::Null);
        collector.collect("usage", &json!("ignored"));

        assert_eq!(
            collector.complete(),
            TagValues::from([
                ("host".to_owned(), vec!["a".to_owned(), "c".to_owned()]),
                ("port".to_owned(), vec!["8086".to_owned()]),
            ])
        );
    }

    #[test]
    fn noop_collector_completes_empty() {
        let mut collector = NoopTagCollector;
        collector.collect("host", &json!("a"));
        assert!(collector.complete().is_empty());

        let option = QueryOption::new().with_tags_return(0);
        // no resolved keys yet
        assert!(option.collector().complete().is_empty());
    }

    #[tokio::test]
    async fn resolves_and_caches_tag_keys() {
        let executor = ShowTagKeys::default();
        let cache = cache();
        let series = [Row::new("cpu", ["time", "usage"])];

        for _ in 0..3 {
            let resolved = resolve_tag_keys(&executor, &cache, "select * from cpu", "metrics", &series)
                .await
                .unwrap();
            assert_eq!(resolved, keys(&["host", "region"]));
        }

        assert_eq!(
            *executor.calls.lock(),
            [(r#"show tag keys from "cpu""#.to_owned(), "metrics".to_owned())]
        );
    }

    #[tokio::test]
    async fn database_falls_back_to_query_source() {
        let executor = ShowTagKeys::default();
        let cache = cache();
        let series = [Row::new("cpu", ["time"])];

        resolve_tag_keys(&executor, &cache, "select * from telegraf.autogen.cpu", "", &series)
            .await
            .unwrap();

        assert_eq!(executor.calls.lock()[0].1, "telegraf");
    }

    #[tokio::test]
    async fn no_series_skips_discovery() {
        let executor = ShowTagKeys::default();
        let resolved = resolve_tag_keys(&executor, &cache(), "select * from cpu", "db", &[])
            .await
            .unwrap();
        assert!(resolved.is_empty());
        assert!(executor.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn discovery_failure_names_the_command() {
        let executor = ShowTagKeys {
            fail: true,
            ..Default::default()
        };
        let cache = cache();
        let series = [Row::new("cpu", ["time"])];

        let err = resolve_tag_keys(&executor, &cache, "select * from cpu", "nope", &series)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Discovery { .. }));
        assert_contains!(
            err.to_string(),
            r#"execute show tag keys from "cpu": database not found: nope"#
        );
        assert!(cache.is_empty().await);
    }
}
