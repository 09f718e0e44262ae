use std::{convert::Infallible, net::SocketAddr, str::FromStr, sync::Arc};

use http::{header::HeaderName, HeaderMap};
use stitchgate_planner::Request;
use warp::{ws::Ws, Filter, Rejection, Reply};

use crate::{websocket, SharedRouteTable};

#[derive(Clone)]
pub struct HandlerConfig {
    pub shared_route_table: SharedRouteTable,
    pub forward_headers: Arc<Vec<String>>,
}

fn do_forward_headers<T: AsRef<str>>(
    forward_headers: &[T],
    header_map: &HeaderMap,
    remote_addr: Option<SocketAddr>,
) -> HeaderMap {
    let mut new_header_map = HeaderMap::new();
    for name in forward_headers {
        for value in header_map.get_all(name.as_ref()) {
            if let Ok(name) = HeaderName::from_str(name.as_ref()) {
                new_header_map.append(name, value.clone());
            }
        }
    }
    if let Some(remote_addr) = remote_addr {
        if let Ok(remote_addr) = remote_addr.to_string().try_into() {
            new_header_map.append(http::header::FORWARDED, remote_addr);
        }
    }
    new_header_map
}

pub fn graphql_request(config: HandlerConfig) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::post()
        .and(warp::body::json())
        .and(warp::header::headers_cloned())
        .and(warp::addr::remote())
        .and_then({
            move |request: Request, header_map: HeaderMap, remote_addr: Option<SocketAddr>| {
                let config = config.clone();
                async move {
                    let resp = config
                        .shared_route_table
                        .query(
                            request,
                            do_forward_headers(&config.forward_headers, &header_map, remote_addr),
                        )
                        .await;
                    Ok::<_, Infallible>(warp::reply::json(&resp))
                }
            }
        })
}

pub fn graphql_websocket(config: HandlerConfig) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::ws()
        .and(warp::get())
        .and(warp::header::headers_cloned())
        .and(warp::addr::remote())
        .map({
            move |ws: Ws, header_map: HeaderMap, remote_addr: Option<SocketAddr>| {
                let config = config.clone();
                let header_map = do_forward_headers(&config.forward_headers, &header_map, remote_addr);

                let reply = ws.on_upgrade(move |socket| websocket::server(config.shared_route_table, socket, header_map));

                warp::reply::with_header(reply, "Sec-WebSocket-Protocol", websocket::PROTOCOL)
            }
        })
}

pub fn health() -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path!("health")
        .and(warp::get())
        .map(|| warp::reply::json(&"healthy"))
}
