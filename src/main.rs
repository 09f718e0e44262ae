#![forbid(unsafe_code)]

mod config;

use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use config::Config;
use futures_util::FutureExt;
use stitchgate_handler::{handler, handler::HandlerConfig, SharedRouteTable};
use stitchgate_planner::{Response, ServerError};
use tokio::signal;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use warp::{body::BodyDeserializeError, hyper::StatusCode, Filter, Rejection, Reply};

fn init_tracing() {
    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

async fn handle_rejection(err: Rejection) -> std::result::Result<impl Reply, Infallible> {
    let (code, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not Found".to_string())
    } else if let Some(e) = err.find::<BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, e.to_string())
    } else {
        tracing::error!("unhandled error: {:?}", err);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
    };

    let res = warp::reply::json(&Response::from_errors(vec![ServerError::new(message)]));

    Ok(warp::reply::with_status(res, code))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = Config::try_parse()?;
    if config.services.is_empty() {
        tracing::info!("Route table is empty.");
        return Ok(());
    }

    let schema = config.compose_schema()?;
    tracing::info!(
        services = ?schema.services(),
        policy = %config.partition_policy,
        "Schema stitched."
    );

    let shared_route_table =
        SharedRouteTable::new(schema, config.create_route_table()).policy(config.partition_policy);
    let handler_config = HandlerConfig {
        shared_route_table,
        forward_headers: Arc::new(config.forward_headers),
    };

    let graphql = warp::path::end().and(
        handler::graphql_request(handler_config.clone()).or(handler::graphql_websocket(handler_config)),
    );
    let routes = graphql.or(handler::health());

    let bind_addr: SocketAddr = config
        .bind
        .parse()
        .context(format!("Failed to parse bind addr '{}'", config.bind))?;
    let (addr, server) = warp::serve(routes.recover(handle_rejection))
        .try_bind_with_graceful_shutdown(bind_addr, signal::ctrl_c().map(|_| ()))
        .context(format!("Failed to bind '{}'", bind_addr))?;
    tracing::info!(addr = %addr, "Listening");
    server.await;
    tracing::info!("Server shutdown");

    Ok(())
}
