use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, Command};
use delivery_model::InMemoryStore;
use delivery_server::{routes, AppState, ServerConfig, VERSION};
use delivery_sync::GitHubClient;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn init_tracing(format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = Command::new("delivery-server")
        .version(VERSION)
        .about("Project delivery workflow and issue sync server")
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .value_parser(value_parser!(PathBuf))
                .help("Path to a TOML configuration file"),
        )
        .arg(
            Arg::new("bind")
                .long("bind")
                .value_parser(value_parser!(SocketAddr))
                .help("Listen address, overrides the config file and DELIVERY_BIND"),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .default_value("text")
                .value_parser(["text", "json"])
                .help("Log output format"),
        )
        .arg(
            Arg::new("check-config")
                .long("check-config")
                .action(ArgAction::SetTrue)
                .help("Validate the configuration and exit"),
        )
        .get_matches();

    let log_format = matches
        .get_one::<String>("log-format")
        .map_or("text", String::as_str);
    init_tracing(log_format);

    let config_path = matches.get_one::<PathBuf>("config").map(PathBuf::as_path);
    let mut config = ServerConfig::load(config_path)
        .context("failed to load configuration")?
        .with_process_env()
        .context("invalid environment override")?;
    if let Some(bind) = matches.get_one::<SocketAddr>("bind") {
        config = config.with_bind(*bind);
    }
    config.validate().context("refusing to start")?;

    if matches.get_flag("check-config") {
        println!("configuration ok: {config:?}");
        return Ok(());
    }

    let tracker =
        GitHubClient::new(config.github_config()?).context("failed to build tracker client")?;
    let state = AppState::new(
        Arc::new(InMemoryStore::new()),
        Arc::new(tracker),
        config.webhook_secret()?,
    );

    let (addr, server) = warp::serve(routes(state, &config.cors_origins))
        .try_bind_with_graceful_shutdown(config.bind, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
            }
        })
        .with_context(|| format!("failed to bind {}", config.bind))?;

    tracing::info!(%addr, version = VERSION, "delivery server listening");
    server.await;
    tracing::info!("delivery server stopped");
    Ok(())
}
