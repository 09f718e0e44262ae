use futures_util::stream::BoxStream;
use http::HeaderMap;
use stitchgate_planner::{Request, Response};
use thiserror::Error;

/// Per-operation data handed to every upstream call.
#[derive(Debug, Default, Clone)]
pub struct FetchContext {
    /// Headers forwarded from the incoming request.
    pub header_map: HeaderMap,
}

impl FetchContext {
    pub fn new(header_map: HeaderMap) -> Self {
        Self { header_map }
    }
}

/// Issues synthesized sub-requests against an upstream service.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    async fn query(&self, service: &str, request: Request, ctx: &FetchContext) -> anyhow::Result<Response>;

    /// Open a subscription on the upstream. Every item is one event.
    async fn subscribe(
        &self,
        service: &str,
        request: Request,
        ctx: &FetchContext,
    ) -> anyhow::Result<BoxStream<'static, Response>> {
        let _ = (request, ctx);
        anyhow::bail!("Service '{}' does not support subscriptions.", service)
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Failed to fetch from service '{service}': {source}")]
    Upstream {
        service: String,
        #[source]
        source: anyhow::Error,
    },
}

impl FetchError {
    pub fn service(&self) -> &str {
        match self {
            FetchError::Upstream { service, .. } => service,
        }
    }
}
