use std::{
    collections::HashMap,
    ops::{Deref, DerefMut},
};

use anyhow::Context;
use futures_util::stream::BoxStream;
use once_cell::sync::Lazy;
use stitchgate_planner::{Request, Response};
use tracing::instrument;

use crate::{websocket, FetchContext, Fetcher};

static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(Default::default);

/// Service routing information.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct ServiceRoute {
    /// Service address
    ///
    /// For example: 1.2.3.4:8000, example.com:8080
    pub addr: String,

    /// Use TLS
    pub tls: bool,

    /// GraphQL HTTP path, default is `/`.
    pub query_path: Option<String>,

    /// GraphQL WebSocket path, defaults to the query path.
    pub websocket_path: Option<String>,
}

impl ServiceRoute {
    fn query_url(&self) -> String {
        let scheme = match self.tls {
            true => "https",
            false => "http",
        };
        format!("{}://{}{}", scheme, self.addr, self.query_path.as_deref().unwrap_or("/"))
    }

    fn websocket_url(&self) -> String {
        let scheme = match self.tls {
            true => "wss",
            false => "ws",
        };
        let path = self
            .websocket_path
            .as_deref()
            .or(self.query_path.as_deref())
            .unwrap_or("/");
        format!("{}://{}{}", scheme, self.addr, path)
    }
}

/// Service routing table
///
/// The key is the service name.
#[derive(Default, Debug, Clone, Eq, PartialEq)]
pub struct ServiceRouteTable(HashMap<String, ServiceRoute>);

impl Deref for ServiceRouteTable {
    type Target = HashMap<String, ServiceRoute>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for ServiceRouteTable {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl ServiceRouteTable {
    fn route(&self, service: &str) -> anyhow::Result<&ServiceRoute> {
        self.0
            .get(service)
            .ok_or_else(|| anyhow::anyhow!("Service '{}' is not defined in the routing table.", service))
    }
}

#[async_trait::async_trait]
impl Fetcher for ServiceRouteTable {
    /// Call the GraphQL query of the specified service.
    #[instrument(err(Debug), skip(self, ctx), ret, level = "trace")]
    async fn query(&self, service: &str, request: Request, ctx: &FetchContext) -> anyhow::Result<Response> {
        let url = self.route(service)?.query_url();

        let raw_resp = HTTP_CLIENT
            .post(&url)
            .headers(ctx.header_map.clone())
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Failed to send request to service '{}'.", service))?;

        if !raw_resp.status().is_success() {
            let status = raw_resp.status();
            let body = raw_resp.text().await?;
            return Err(anyhow::anyhow!(
                "received non-2xx response from service \"{}\", status: {}, body: \"{}\"",
                service,
                status,
                body
            ));
        }

        raw_resp
            .json::<Response>()
            .await
            .with_context(|| format!("Invalid response from service '{}'.", service))
    }

    #[instrument(err(Debug), skip(self, ctx), level = "trace")]
    async fn subscribe(
        &self,
        service: &str,
        request: Request,
        ctx: &FetchContext,
    ) -> anyhow::Result<BoxStream<'static, Response>> {
        let url = self.route(service)?.websocket_url();
        websocket::connect(&url, &ctx.header_map, request)
            .await
            .with_context(|| format!("Failed to subscribe to service '{}'.", service))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_urls() {
        let route = ServiceRoute {
            addr: "accounts:8000".to_string(),
            tls: false,
            query_path: Some("/graphql".to_string()),
            websocket_path: None,
        };
        assert_eq!(route.query_url(), "http://accounts:8000/graphql");
        assert_eq!(route.websocket_url(), "ws://accounts:8000/graphql");

        let route = ServiceRoute {
            addr: "example.com".to_string(),
            tls: true,
            query_path: None,
            websocket_path: Some("/ws".to_string()),
        };
        assert_eq!(route.query_url(), "https://example.com/");
        assert_eq!(route.websocket_url(), "wss://example.com/ws");
    }

    #[tokio::test]
    async fn unknown_service() {
        let err = ServiceRouteTable::default()
            .query("missing", Request::new("{ a }"), &FetchContext::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Service 'missing' is not defined in the routing table.");
    }
}
