use std::net::SocketAddr;
use std::process::ExitCode;

use axum::Router;
use clap::Parser;
use time::{UtcOffset, macros::format_description};
use tracing::{error, info};
use tracing_subscriber::fmt::time::OffsetTime;
use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt};

use static_gate::config::{Cli, log_settings_from_env};
use static_gate::{StaticGate, log_requests_mw, static_router};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();
    let root = cli.root();
    let gate = match StaticGate::new(&root, cli.options()) {
        Ok(g) => g,
        Err(e) => {
            error!(target: "static_gate", "[static-gate] {e}");
            return ExitCode::FAILURE;
        }
    };
    if !gate.root().is_dir() {
        error!(target: "static_gate", "[static-gate] root {} is not a directory", gate.root().display());
        return ExitCode::FAILURE;
    }
    info!(target: "static_gate", "[static-gate] root = {}", gate.root().display());

    let served = static_router(gate);
    let router = match cli.mount_prefix() {
        Some(prefix) => {
            info!(target: "static_gate", "[static-gate] mounted at {prefix}");
            Router::new().nest_service(&prefix, served)
        }
        None => served,
    };
    let app = router.layer(axum::middleware::from_fn_with_state(
        log_settings_from_env(),
        log_requests_mw,
    ));

    let listener = match tokio::net::TcpListener::bind((cli.host.as_str(), cli.port)).await {
        Ok(l) => l,
        Err(e) => {
            error!(target: "static_gate", "[static-gate] bind {}:{} failed: {e}", cli.host, cli.port);
            return ExitCode::FAILURE;
        }
    };
    match listener.local_addr() {
        Ok(bound) => info!(target: "static_gate", "[static-gate] Listening on http://{bound}"),
        Err(_) => info!(target: "static_gate", "[static-gate] Listening on {}:{}", cli.host, cli.port),
    }

    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    if let Err(e) = axum::serve(listener, make_service).await {
        error!(target: "static_gate", "[static-gate] server error: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // Format timestamp as local time: "YYYY-MM-DD HH:MM:SS"
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    let ts_format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    let timer = OffsetTime::new(offset, ts_format);
    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_timer(timer);
    let subscriber = Registry::default().with(env_filter).with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber).ok();
}
