use std::net::SocketAddr;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use logtee::axum_middleware::{with_request_logging, RequestErrors};
use logtee::config::PipelineConfig;
use logtee::{init_with_config, install_tracing};
use tracing::info;

async fn hello() -> &'static str {
    "hello"
}

async fn flaky() -> Response {
    let mut resp = StatusCode::SERVICE_UNAVAILABLE.into_response();
    resp.extensions_mut().insert(RequestErrors::from("db timeout"));
    resp
}

/// Reads `LOGTEE_*` variables; set `LOGTEE_DSN` to also ship warnings and
/// errors to an error-tracking service.
#[tokio::main]
async fn main() {
    let logger = match init_with_config(PipelineConfig::from_env()) {
        Ok(logger) => logger,
        Err(e) => {
            eprintln!("logger init failed: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = install_tracing(logger.clone()) {
        eprintln!("{}", e);
    }

    let app = with_request_logging(
        Router::new().route("/", get(hello)).route("/flaky", get(flaky)),
        logger.clone(),
    );

    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    info!(%addr, "listening");
    let listener = tokio::net::TcpListener::bind(addr).await.expect("bind listener");

    let server = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        });
    if let Err(e) = server.await {
        eprintln!("server error: {}", e);
    }

    if let Err(e) = logger.sync().await {
        eprintln!("flush on shutdown: {}", e);
    }
}
