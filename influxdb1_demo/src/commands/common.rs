use anyhow::Context;
use clap::Parser;
use influxdb1_mapper::Precision;
use secrecy::{ExposeSecret, Secret};
use url::Url;

/// Mapping client over the HTTP transport.
pub(crate) type MappingClient = influxdb1_mapper::Client<influxdb1_client::Client, influxdb1_client::Client>;

#[derive(Debug, Parser)]
pub(crate) struct InfluxDb1Config {
    /// The host URL of the running InfluxDB 1.x server
    #[clap(
        short = 'H',
        long = "host",
        env = "INFLUXDB_HOST_URL",
        default_value = "http://127.0.0.1:8086"
    )]
    pub(crate) host_url: Url,

    /// The name of the database to operate on
    #[clap(
        short = 'd',
        long = "database",
        env = "INFLUXDB_DATABASE",
        default_value = "demo"
    )]
    pub(crate) database_name: String,

    /// User name for HTTP basic authentication
    #[clap(short = 'u', long = "username", env = "INFLUXDB_USERNAME")]
    pub(crate) username: Option<String>,

    /// Password for HTTP basic authentication
    #[clap(long = "password", env = "INFLUXDB_PASSWORD")]
    pub(crate) password: Option<Secret<String>>,

    /// Precision of written timestamps: h, m, s, ms, u or ns
    #[clap(
        short = 'p',
        long = "precision",
        env = "INFLUXDB_PRECISION",
        default_value = "ns"
    )]
    pub(crate) precision: Precision,
}

impl InfluxDb1Config {
    pub(crate) fn http_client(&self) -> anyhow::Result<influxdb1_client::Client> {
        let mut client = influxdb1_client::Client::new(self.host_url.clone())
            .with_context(|| format!("invalid host URL {}", self.host_url))?;
        if let Some(username) = &self.username {
            let password = self
                .password
                .as_ref()
                .map(|p| p.expose_secret().clone())
                .unwrap_or_default();
            client = client.with_credentials(username, password);
        }
        Ok(client)
    }

    /// A mapping client with the configured database selected.
    pub(crate) fn mapping_client(&self) -> anyhow::Result<MappingClient> {
        let http = self.http_client()?;
        let mut client =
            influxdb1_mapper::Client::new(http.clone(), http).with_precision(self.precision);
        client.use_db(&self.database_name);
        Ok(client)
    }
}
