//! Minimal InfluxQL text handling.

use std::sync::LazyLock;

use regex::Regex;

static EXTRA_SPACE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s\s+").expect("whitespace pattern is valid")
});

static SELECT_FROM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)select\s+.+?\s+from\s+(\S+)").expect("select pattern is valid")
});

/// Strip line breaks from `query` and collapse whitespace runs into one
/// space. Mostly useful for logging.
pub fn clean_query(query: &str) -> String {
    let stripped = query.replace(['\n', '\r'], "");
    EXTRA_SPACE.replace_all(&stripped, " ").into_owned()
}

/// Database named by a qualified `select ... from db.rp.measurement` query.
///
/// Unqualified sources yield `None`.
pub fn database_from_query(query: &str) -> Option<String> {
    let source = SELECT_FROM.captures(query)?.get(1)?.as_str();
    let (database, _) = source.split_once('.')?;
    let database = database.trim_matches('"');
    (!database.is_empty()).then(|| database.to_owned())
}

/// Discovery command listing the tag keys of `measurement`.
pub fn show_tag_keys_command(measurement: &str) -> String {
    format!(r#"show tag keys from "{}""#, measurement.replace('"', r#"\""#))
}
