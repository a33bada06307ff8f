//! HTTP client for the InfluxDB 1.x `/query`, `/write` and `/ping` APIs.
//!
//! [`Client`] implements the [`QueryExecutor`] and [`PointWriter`]
//! capabilities of [`influxdb1_mapper`], so a mapping client is built from
//! two clones of it:
//!
//! ```no_run
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//! let http = influxdb1_client::Client::new("http://localhost:8086")?
//!     .with_credentials("admin", "secret");
//! let mut client = influxdb1_mapper::Client::new(http.clone(), http);
//! client.use_db("metrics");
//! # Ok(())
//! # }
//! ```

pub mod line_protocol;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use influxdb1_mapper::{DynError, Point, PointWriter, Precision, QueryExecutor, Row};
use observability_deps::tracing::debug;
use reqwest::{IntoUrl, Method, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use url::Url;

/// Header carrying the server version in `/ping` responses.
pub const VERSION_HEADER: &str = "X-Influxdb-Version";

/// Primary error type for the [`Client`]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("base URL error: {0}")]
    BaseUrl(#[source] reqwest::Error),

    #[error("request URL error: {0}")]
    RequestUrl(#[from] url::ParseError),

    #[error("failed to parse JSON response: {0}")]
    Json(#[source] reqwest::Error),

    #[error("failed to parse plaintext response: {0}")]
    Text(#[source] reqwest::Error),

    #[error("server responded with error [{code}]: {message}")]
    ApiError { code: StatusCode, message: String },

    #[error("query failed: {0}")]
    Query(String),

    #[error("statement {statement_id} failed: {message}")]
    Statement { statement_id: usize, message: String },

    #[error("failed to send {method} {url} request: {source}")]
    RequestSend {
        method: Method,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("point {measurement} has no fields")]
    EmptyFields { measurement: String },

    #[error("field {field} is not a finite number")]
    NonFiniteField { field: String },

    #[error("timestamp {time} cannot be expressed in nanoseconds")]
    TimestampOutOfRange { time: DateTime<Utc> },
}

impl Error {
    fn request_send(method: Method, url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::RequestSend {
            method,
            url: url.into(),
            source,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Body of a `/query` response.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub results: Vec<StatementResult>,
    /// Set when the whole request failed.
    pub error: Option<String>,
}

/// The result of one statement of a query.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StatementResult {
    #[serde(default)]
    pub statement_id: usize,
    #[serde(default)]
    pub series: Vec<Row>,
    pub error: Option<String>,
}

impl QueryResponse {
    /// Series of the first statement, or the first error reported.
    pub fn into_first_series(self) -> Result<Vec<Row>> {
        if let Some(message) = self.error {
            return Err(Error::Query(message));
        }
        if let Some(failed) = self.results.iter().find(|r| r.error.is_some()) {
            return Err(Error::Statement {
                statement_id: failed.statement_id,
                message: failed.error.clone().unwrap_or_default(),
            });
        }
        Ok(self
            .results
            .into_iter()
            .next()
            .map(|r| r.series)
            .unwrap_or_default())
    }
}

/// The InfluxDB 1.x Client
#[derive(Debug, Clone)]
pub struct Client {
    /// The base URL of the server, e.g. `http://localhost:8086`
    base_url: Url,
    /// User name and password sent as HTTP basic auth on each request
    credentials: Option<(String, Secret<String>)>,
    /// A [`reqwest::Client`] for handling HTTP requests
    http_client: reqwest::Client,
}

impl Client {
    /// Create a new [`Client`]
    pub fn new<U: IntoUrl>(base_url: U) -> Result<Self> {
        Ok(Self {
            base_url: base_url.into_url().map_err(Error::BaseUrl)?,
            credentials: None,
            http_client: reqwest::Client::new(),
        })
    }

    /// Authenticate every request with HTTP basic auth.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Some((username.into(), Secret::new(password.into())));
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn authenticated(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Some((username, password)) => {
                req.basic_auth(username, Some(password.expose_secret()))
            }
            None => req,
        }
    }

    /// Make a request to the `/query` API and return the series of the first
    /// statement.
    ///
    /// `SELECT` and `SHOW` commands are sent with `GET`, everything else with
    /// `POST` as the server requires.
    pub async fn query(&self, command: &str, db: &str) -> Result<Vec<Row>> {
        let api_path = "/query";
        let url = self.base_url.join(api_path)?;
        let method = query_method(command);

        let mut req = self.http_client.request(method.clone(), url);
        if !db.is_empty() {
            req = req.query(&[("db", db)]);
        }
        let req = self.authenticated(req.query(&[("q", command)]));

        let resp = req
            .send()
            .await
            .map_err(|src| Error::request_send(method, api_path, src))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::ApiError {
                code: status,
                message: resp.text().await.map_err(Error::Text)?,
            });
        }

        let body: QueryResponse = resp.json().await.map_err(Error::Json)?;
        body.into_first_series()
    }

    /// Make a request to the `POST /write` API with a line protocol body.
    pub async fn write_lp(
        &self,
        db: &str,
        precision: Precision,
        body: impl Into<String> + Send,
    ) -> Result<()> {
        let api_path = "/write";
        let url = self.base_url.join(api_path)?;

        let req = self
            .http_client
            .post(url)
            .query(&[("db", db), ("precision", precision.as_str())])
            .body(body.into());
        let resp = self
            .authenticated(req)
            .send()
            .await
            .map_err(|src| Error::request_send(Method::POST, api_path, src))?;

        let status = resp.status();
        match status {
            StatusCode::NO_CONTENT | StatusCode::OK => Ok(()),
            code => Err(Error::ApiError {
                code,
                message: resp.text().await.map_err(Error::Text)?,
            }),
        }
    }

    /// Write `points` in a single request.
    pub async fn write_points(&self, db: &str, precision: Precision, points: &[Point]) -> Result<()> {
        let body = line_protocol::render_all(points, precision)?;
        debug!(%db, points = points.len(), "writing points");
        self.write_lp(db, precision, body).await
    }

    /// Make a request to the `GET /ping` API, returning the server version
    /// when the server reports one.
    pub async fn ping(&self) -> Result<Option<String>> {
        let api_path = "/ping";
        let url = self.base_url.join(api_path)?;

        let resp = self
            .authenticated(self.http_client.get(url))
            .send()
            .await
            .map_err(|src| Error::request_send(Method::GET, api_path, src))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::ApiError {
                code: status,
                message: resp.text().await.map_err(Error::Text)?,
            });
        }

        Ok(resp
            .headers()
            .get(VERSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned))
    }
}

fn query_method(command: &str) -> Method {
    let verb = command.split_whitespace().next().unwrap_or_default();
    if verb.eq_ignore_ascii_case("select") || verb.eq_ignore_ascii_case("show") {
        Method::GET
    } else {
        Method::POST
    }
}

#[async_trait]
impl QueryExecutor for Client {
    fn addr(&self) -> &str {
        self.base_url.as_str()
    }

    async fn execute(&self, command: &str, database: &str) -> Result<Vec<Row>, DynError> {
        Ok(self.query(command, database).await?)
    }
}

#[async_trait]
impl PointWriter for Client {
    async fn write(
        &self,
        point: &Point,
        database: &str,
        precision: Precision,
    ) -> Result<(), DynError> {
        Ok(self
            .write_points(database, precision, std::slice::from_ref(point))
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::TimeZone;
    use influxdb1_mapper::{QueryOption, influx_record};
    use iox_time::{MockProvider, Time};
    use mockito::{Matcher, Server};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use test_helpers::assert_contains;

    use super::*;

    #[tokio::test]
    async fn query_returns_first_series() {
        let body = json!({
            "results": [{
                "statement_id": 0,
                "series": [{
                    "name": "cpu",
                    "tags": {"host": "server01"},
                    "columns": ["time", "usage"],
                    "values": [["2015-06-11T20:46:02Z", 0.64]]
                }]
            }]
        });

        let mut mock_server = Server::new_async().await;
        let mock = mock_server
            .mock("GET", "/query")
            .match_header("Authorization", "Basic YWRtaW46c2VjcmV0")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("db".into(), "metrics".into()),
                Matcher::UrlEncoded("q".into(), "select * from cpu".into()),
            ]))
            .with_status(200)
            .with_body(body.to_string())
            .create_async()
            .await;

        let client = Client::new(mock_server.url())
            .expect("create client")
            .with_credentials("admin", "secret");

        let series = client
            .query("select * from cpu", "metrics")
            .await
            .expect("send query request");

        mock.assert_async().await;
        assert_eq!(
            series,
            vec![
                Row::new("cpu", ["time", "usage"])
                    .with_tag("host", "server01")
                    .with_values(vec![json!("2015-06-11T20:46:02Z"), json!(0.64)])
            ]
        );
    }

    #[tokio::test]
    async fn query_empty_result() {
        let mut mock_server = Server::new_async().await;
        let _mock = mock_server
            .mock("GET", "/query")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"results":[{"statement_id":0}]}"#)
            .create_async()
            .await;

        let client = Client::new(mock_server.url()).expect("create client");
        let series = client.query("select * from nothing", "metrics").await.unwrap();
        assert!(series.is_empty());
    }

    #[tokio::test]
    async fn query_errors() {
        let mut mock_server = Server::new_async().await;
        let _statement = mock_server
            .mock("GET", "/query")
            .match_query(Matcher::UrlEncoded("db".into(), "missing".into()))
            .with_status(200)
            .with_body(r#"{"results":[{"statement_id":0,"error":"database not found: missing"}]}"#)
            .create_async()
            .await;
        let _api = mock_server
            .mock("GET", "/query")
            .match_query(Matcher::UrlEncoded("db".into(), "locked".into()))
            .with_status(401)
            .with_body(r#"{"error":"authorization failed"}"#)
            .create_async()
            .await;

        let client = Client::new(mock_server.url()).expect("create client");

        let err = client.query("select * from cpu", "missing").await.unwrap_err();
        assert!(matches!(err, Error::Statement { statement_id: 0, .. }));
        assert_contains!(err.to_string(), "database not found: missing");

        let err = client.query("select * from cpu", "locked").await.unwrap_err();
        assert!(matches!(
            err,
            Error::ApiError {
                code: StatusCode::UNAUTHORIZED,
                ..
            }
        ));
        assert_contains!(err.to_string(), "authorization failed");
    }

    #[tokio::test]
    async fn management_commands_are_posted() {
        let mut mock_server = Server::new_async().await;
        let mock = mock_server
            .mock("POST", "/query")
            .match_query(Matcher::UrlEncoded("q".into(), "CREATE DATABASE demo".into()))
            .with_status(200)
            .with_body(r#"{"results":[{"statement_id":0}]}"#)
            .create_async()
            .await;

        let client = Client::new(mock_server.url()).expect("create client");
        let series = client.query("CREATE DATABASE demo", "").await.unwrap();

        mock.assert_async().await;
        assert!(series.is_empty());
        assert_eq!(query_method("  show measurements"), Method::GET);
        assert_eq!(query_method("Select 1"), Method::GET);
        assert_eq!(query_method("drop measurement cpu"), Method::POST);
    }

    #[test]
    fn top_level_error_wins() {
        let response: QueryResponse =
            serde_json::from_value(json!({"error": "error parsing query"})).unwrap();
        let err = response.into_first_series().unwrap_err();
        assert_eq!(err.to_string(), "query failed: error parsing query");
    }

    #[tokio::test]
    async fn write_point_as_line_protocol() {
        let mut mock_server = Server::new_async().await;
        let mock = mock_server
            .mock("POST", "/write")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("db".into(), "metrics".into()),
                Matcher::UrlEncoded("precision".into(), "s".into()),
            ]))
            .match_body("cpu,host=a usage=0.5 1528000000")
            .with_status(204)
            .create_async()
            .await;

        let client = Client::new(mock_server.url()).expect("create client");
        let point = Point::new("cpu")
            .tag("host", "a")
            .field("usage", 0.5)
            .time(Utc.timestamp_opt(1_528_000_000, 0).unwrap());

        PointWriter::write(&client, &point, "metrics", Precision::Seconds)
            .await
            .expect("send write request");

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn write_rejected_by_server() {
        let mut mock_server = Server::new_async().await;
        let _mock = mock_server
            .mock("POST", "/write")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"error":"partial write: field type conflict"}"#)
            .create_async()
            .await;

        let client = Client::new(mock_server.url()).expect("create client");
        let err = client
            .write_lp("metrics", Precision::Nanoseconds, "cpu usage=1i")
            .await
            .unwrap_err();
        assert_contains!(err.to_string(), "field type conflict");
    }

    #[tokio::test]
    async fn ping_reports_version() {
        let mut mock_server = Server::new_async().await;
        let _mock = mock_server
            .mock("GET", "/ping")
            .with_status(204)
            .with_header(VERSION_HEADER, "1.8.10")
            .create_async()
            .await;

        let client = Client::new(mock_server.url()).expect("create client");
        assert_eq!(client.ping().await.unwrap(), Some("1.8.10".to_owned()));
    }

    influx_record! {
        #[derive(Debug, Clone, Default, PartialEq)]
        struct Cpu {
            time: DateTime<Utc>,
            #[influx("host,tag")]
            host: String,
            usage: f64,
        }
    }

    #[tokio::test]
    async fn decode_query_with_tag_discovery() {
        let mut mock_server = Server::new_async().await;
        let query = mock_server
            .mock("GET", "/query")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("db".into(), "metrics".into()),
                Matcher::UrlEncoded("q".into(), "select * from cpu".into()),
            ]))
            .with_body(
                json!({"results": [{"statement_id": 0, "series": [{
                    "name": "cpu",
                    "columns": ["time", "host", "usage"],
                    "values": [
                        ["2018-06-14T21:47:11Z", "b", 0.5],
                        ["2018-06-14T21:47:12Z", "a", 0.25],
                        ["2018-06-14T21:47:13Z", "b", 0.75]
                    ]
                }]}]})
                .to_string(),
            )
            .expect(2)
            .create_async()
            .await;
        let discovery = mock_server
            .mock("GET", "/query")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("db".into(), "metrics".into()),
                Matcher::UrlEncoded("q".into(), r#"show tag keys from "cpu""#.into()),
            ]))
            .with_body(
                json!({"results": [{"statement_id": 0, "series": [{
                    "name": "cpu",
                    "columns": ["tagKey"],
                    "values": [["host"], ["region"]]
                }]}]})
                .to_string(),
            )
            .expect(1)
            .create_async()
            .await;

        let http = Client::new(mock_server.url()).expect("create client");
        let time_provider = Arc::new(MockProvider::new(Time::from_timestamp_nanos(0)));
        let cache = Arc::new(influxdb1_mapper::tags::tag_keys_cache(time_provider));
        let mut client =
            influxdb1_mapper::Client::new(http.clone(), http).with_tag_keys_cache(cache);
        client.use_db("metrics");

        for _ in 0..2 {
            let mut option = QueryOption::new().with_tags_return(0);
            let mut cpus: Vec<Cpu> = vec![];
            client
                .decode_query("select * from cpu", &mut cpus, &mut option)
                .await
                .expect("decode query");

            assert_eq!(cpus.len(), 3);
            assert_eq!(
                cpus[1],
                Cpu {
                    time: Utc.with_ymd_and_hms(2018, 6, 14, 21, 47, 12).unwrap(),
                    host: "a".into(),
                    usage: 0.25,
                }
            );
            let tags = option.take_tags().expect("tags requested");
            assert_eq!(tags["host"], ["a", "b"]);
            assert!(tags["region"].is_empty());
        }

        query.assert_async().await;
        discovery.assert_async().await;
    }

    #[tokio::test]
    async fn write_record_end_to_end() {
        let mut mock_server = Server::new_async().await;
        let mock = mock_server
            .mock("POST", "/write")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("db".into(), "metrics".into()),
                Matcher::UrlEncoded("precision".into(), "ms".into()),
            ]))
            .match_body("Cpu,host=a usage=0.5 1528000000000")
            .with_status(204)
            .create_async()
            .await;

        let http = Client::new(mock_server.url()).expect("create client");
        let mut client = influxdb1_mapper::Client::new(http.clone(), http)
            .with_precision(Precision::Milliseconds);
        client.use_db("metrics");

        client
            .write_record(&Cpu {
                time: Utc.timestamp_opt(1_528_000_000, 0).unwrap(),
                host: "a".into(),
                usage: 0.5,
            })
            .await
            .expect("write record");

        mock.assert_async().await;
    }
}
