use std::io::Read;

use envconfig::Envconfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use sentry_capture::config::ClientConfig;
use sentry_capture::{Client, Datum, SentryTransport};

#[derive(Envconfig)]
struct Config {
    #[envconfig(from = "SENTRY_DSN", default = "")]
    dsn: String,

    #[envconfig(nested = true)]
    client: ClientConfig,
}

/// Reads one event as JSON from stdin, sends it and prints its id.
fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let config = Config::init_from_env()?;

    let mut input = String::new();
    std::io::stdin().read_to_string(&mut input)?;
    let event: Datum = serde_json::from_str(&input)?;

    let client = Client::init(SentryTransport::new(), &config.dsn, &config.client)?;
    let result = client.send_event(&event);
    client.close()?;

    println!("{}", result?);
    Ok(())
}
