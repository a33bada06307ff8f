//! Entrypoint of the influxdemo binary
#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(
    missing_debug_implementations,
    clippy::explicit_iter_loop,
    clippy::use_self,
    clippy::clone_on_ref_ptr,
    clippy::future_not_send
)]

use dotenvy::dotenv;
use trogging::{
    TroggingGuard,
    cli::LoggingConfigBuilderExt,
    tracing_subscriber::{Registry, prelude::*},
};

mod commands {
    pub(crate) mod common;
    pub(crate) mod demo;
    pub(crate) mod query;
    pub(crate) mod write;
}

enum ReturnCode {
    Failure = 1,
}

#[derive(Debug, clap::Parser)]
#[clap(
    name = "influxdemo",
    about = "Map records to and from an InfluxDB 1.x server",
    long_about = r#"Map records to and from an InfluxDB 1.x server

Examples:
    # Write the sample records and read them back
    influxdemo demo --host http://127.0.0.1:8086 -d demo

    # Write JSON documents as points of the cpu measurement
    influxdemo write -d metrics -m cpu -f points.json

    # Query rows and list the values of each tag key
    influxdemo query -d metrics --tags 'SELECT * FROM cpu LIMIT 10'

    # Run with full debug logging specified with LOG_FILTER
    LOG_FILTER=debug influxdemo demo
"#
)]
struct Config {
    #[clap(flatten)]
    logging_config: trogging::cli::LoggingConfig,

    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, clap::Subcommand)]
enum Command {
    /// Write sample records to a running server and read them back
    Demo(commands::demo::Config),

    /// Run a query and print each row as a JSON object
    Query(commands::query::Config),

    /// Write JSON documents as points
    Write(commands::write::Config),
}

fn main() -> Result<(), std::io::Error> {
    // load all environment variables from .env before doing anything
    load_dotenv();

    let config: Config = clap::Parser::parse();

    let tokio_runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    tokio_runtime.block_on(async move {
        fn handle_init_logs(r: Result<TroggingGuard, trogging::Error>) -> TroggingGuard {
            match r {
                Ok(guard) => guard,
                Err(e) => {
                    eprintln!("Initializing logs failed: {e}");
                    std::process::exit(ReturnCode::Failure as _);
                }
            }
        }

        let _tracing_guard = handle_init_logs(init_logs_and_tracing(&config.logging_config));

        match config.command {
            None => println!("command required, -h/--help for help"),
            Some(Command::Demo(config)) => {
                if let Err(e) = commands::demo::command(config).await {
                    eprintln!("Demo command failed: {e:#}");
                    std::process::exit(ReturnCode::Failure as _)
                }
            }
            Some(Command::Query(config)) => {
                if let Err(e) = commands::query::command(config).await {
                    eprintln!("Query command failed: {e:#}");
                    std::process::exit(ReturnCode::Failure as _)
                }
            }
            Some(Command::Write(config)) => {
                if let Err(e) = commands::write::command(config).await {
                    eprintln!("Write command failed: {e:#}");
                    std::process::exit(ReturnCode::Failure as _)
                }
            }
        }
    });

    Ok(())
}

/// Source the .env file before initialising the Config struct so that its
/// variables reach the `env` fallbacks of each argument.
///
/// Existing environment variables take precedence.
fn load_dotenv() {
    match dotenv() {
        Ok(_) => {}
        Err(dotenvy::Error::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
            // a missing env file is fine, defaults apply
        }
        Err(e) => {
            eprintln!("FATAL Error loading config from: {e}");
            eprintln!("Aborting");
            std::process::exit(ReturnCode::Failure as _);
        }
    };
}

fn init_logs_and_tracing(
    config: &trogging::cli::LoggingConfig,
) -> Result<TroggingGuard, trogging::Error> {
    let log_layer = trogging::Builder::new()
        .with_default_log_filter("info")
        .with_logging_config(config)
        .build()?;

    let subscriber = Registry::default().with(log_layer);
    trogging::install_global(subscriber)
}
