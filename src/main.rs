//! service-spine
//!
//! Serves the built-in endpoints behind the standard request pipeline and
//! shuts down gracefully on SIGINT or SIGTERM.
//!
//! # Startup Order
//! ```text
//! .env → flags → config file → flag overrides → validation
//!     → logging → signal handlers → metrics exporter
//!     → user store + state → bind listener → serve
//! ```
//!
//! Any failure along the way is fatal: it is logged and the process exits
//! with status 1.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use clap::Parser;

use service_spine::config::{
    load_config, load_env_file, validate_config, ConfigError, Environment, ObservabilityConfig,
    ServiceConfig,
};
use service_spine::http::HttpServer;
use service_spine::lifecycle::{startup, Signals};
use service_spine::observability::{logging, metrics};

#[derive(Parser, Debug)]
#[command(name = "service-spine", version, about = "Request-handling spine with graceful shutdown")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long, env = "SPINE_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on, keeping the configured host.
    #[arg(long, env = "SPINE_PORT")]
    port: Option<u16>,

    /// Deployment environment.
    #[arg(long, value_enum, env = "SPINE_ENV")]
    env: Option<Environment>,

    /// Rate limiter: tokens added per second.
    #[arg(long)]
    limiter_rps: Option<f64>,

    /// Rate limiter: bucket capacity.
    #[arg(long)]
    limiter_burst: Option<u32>,

    /// Rate limiter: enable or disable (true/false).
    #[arg(long)]
    limiter_enabled: Option<bool>,
}

impl Cli {
    fn apply(&self, config: &mut ServiceConfig) {
        if let Some(port) = self.port {
            // an unparsable address is left alone for validation to report
            if let Ok(mut addr) = config.listener.bind_address.parse::<SocketAddr>() {
                addr.set_port(port);
                config.listener.bind_address = addr.to_string();
            }
        }
        if let Some(env) = self.env {
            config.listener.env = env;
        }
        if let Some(rps) = self.limiter_rps {
            config.limiter.requests_per_second = rps;
        }
        if let Some(burst) = self.limiter_burst {
            config.limiter.burst = burst;
        }
        if let Some(enabled) = self.limiter_enabled {
            config.limiter.enabled = enabled;
        }
    }
}

fn configure(cli: &Cli) -> Result<ServiceConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };
    cli.apply(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[tokio::main]
async fn main() {
    if let Err(e) = load_env_file(Path::new(".env")) {
        logging::init(&ObservabilityConfig::default());
        logging::fatal(&e)
    }
    let cli = Cli::parse();

    let config = match configure(&cli) {
        Ok(config) => config,
        Err(e) => {
            logging::init(&ObservabilityConfig::default());
            logging::fatal(&e)
        }
    };
    logging::init(&config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        env = config.listener.env.as_str(),
        bind_address = %config.listener.bind_address,
        limiter_enabled = config.limiter.enabled,
        limiter_rps = config.limiter.requests_per_second,
        limiter_burst = config.limiter.burst,
        "Configuration loaded"
    );

    let signals = match Signals::install() {
        Ok(signals) => signals,
        Err(e) => logging::fatal(&e),
    };

    if config.observability.metrics_enabled {
        let exporter = config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .map_err(|e| e.to_string())
            .and_then(|addr| metrics::init_exporter(addr).map_err(|e| e.to_string()));
        if let Err(e) = exporter {
            logging::fatal(&e);
        }
    }

    let listener = match startup::bind(&config).await {
        Ok(listener) => listener,
        Err(e) => logging::fatal(&e),
    };
    let server = HttpServer::new(startup::build_state(config));

    if let Err(e) = server.run(listener, signals.recv()).await {
        logging::fatal(&e);
    }
    tracing::info!("Shutdown complete");
}
