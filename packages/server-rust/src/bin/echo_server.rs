//! Demo server exposing `echo` and `add` over HTTP.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;
use switchboard_core::{ApiDescription, CallError, CallInfo, Fields, Value};
use switchboard_server::{
    install_standard_plugins, NetworkConfig, NetworkModule, ServerConfig, Service,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "switchboard-echo")]
#[command(about = "Serve a demo echo API", long_about = None)]
struct Cli {
    /// JSON API description; defaults to a built-in one declaring `echo` and `add`
    #[arg(long, env = "SWITCHBOARD_API")]
    api: Option<PathBuf>,
    /// Bind address; defaults to the description's endpoint host
    #[arg(long)]
    host: Option<String>,
    /// Port; defaults to the description's endpoint port
    #[arg(long)]
    port: Option<u16>,
    /// Report undeclared failures with their real message
    #[arg(long)]
    debug: bool,
    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
    #[arg(long, default_value_t = ServerConfig::default().max_concurrent_calls)]
    max_concurrent_calls: u32,
}

const DEFAULT_API: &str = r#"{
    "version": "1",
    "endpoint": {"scheme": "http", "host": "127.0.0.1", "port": 8080},
    "operations": ["echo", "add"],
    "exceptions": ["BadInput"]
}"#;

fn echo(request: &Fields, response: &mut Fields, call: &mut CallInfo) -> Result<(), CallError> {
    let x = request
        .get("x")
        .ok_or_else(|| call.raise("BadInput", "need x"))?;
    response.set("x", x.clone());
    Ok(())
}

fn add(request: &Fields, response: &mut Fields, call: &mut CallInfo) -> Result<(), CallError> {
    let operand = |name: &str| {
        request
            .get(name)
            .and_then(Value::as_f64)
            .ok_or_else(|| call.raise("BadInput", format!("{name} must be a number")))
    };
    let sum = operand("a")? + operand("b")?;
    response.set("sum", sum);
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let api = match &cli.api {
        Some(path) => ApiDescription::from_file(path)?,
        None => ApiDescription::from_json_str(DEFAULT_API)?,
    };
    let api = if cli.debug { api.with_debug(true) } else { api };

    let mut network = NetworkConfig::for_endpoint(&api.endpoint);
    if let Some(host) = cli.host {
        network.host = host;
    }
    if let Some(port) = cli.port {
        network.port = port;
    }

    let config = ServerConfig {
        max_concurrent_calls: cli.max_concurrent_calls,
        ..ServerConfig::default()
    };
    let mut builder = Service::builder(api)?;
    builder.with_config(config.clone());
    install_standard_plugins(&mut builder, &config);
    if builder.api().declares_operation("echo") {
        builder.register_fn("echo", echo)?;
    }
    if builder.api().declares_operation("add") {
        builder.register_fn("add", add)?;
    }
    let service = Arc::new(builder.build()?);

    let mut module = NetworkModule::new(network, service);
    let port = module.start().await.context("failed to bind listener")?;
    info!(port, "switchboard-echo listening");

    module
        .serve(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
        })
        .await
}
