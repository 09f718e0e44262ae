use std::sync::Arc;

use futures_util::{
    future,
    stream::{self, BoxStream},
    StreamExt,
};
use http::HeaderMap;
use stitchgate_planner::{PartitionPolicy, PlanBuilder, Request, Response, RootNode, ServerError};
use stitchgate_schema::ComposedSchema;
use tracing::instrument;

use crate::{Executor, FetchContext, Fetcher};

/// Gateway state shared by every connection.
#[derive(Clone)]
pub struct SharedRouteTable {
    schema: Arc<ComposedSchema>,
    fetcher: Arc<dyn Fetcher>,
    policy: PartitionPolicy,
}

impl SharedRouteTable {
    pub fn new(schema: ComposedSchema, fetcher: impl Fetcher + 'static) -> Self {
        Self {
            schema: Arc::new(schema),
            fetcher: Arc::new(fetcher),
            policy: PartitionPolicy::default(),
        }
    }

    #[must_use]
    pub fn policy(self, policy: PartitionPolicy) -> Self {
        Self { policy, ..self }
    }

    pub fn schema(&self) -> &ComposedSchema {
        &self.schema
    }

    fn plan(&self, request: &Request) -> Result<RootNode, Response> {
        let document = parser::parse_query(&request.query)
            .map_err(|err| Response::from_errors(vec![ServerError::new(err.to_string())]))?;
        let mut builder = PlanBuilder::new(&self.schema, document)
            .variables(request.variables.clone())
            .policy(self.policy);
        if let Some(operation_name) = &request.operation_name {
            builder = builder.operation_name(operation_name);
        }
        builder.plan().map_err(|err| {
            tracing::debug!(error = %err, "Failed to plan the operation.");
            Response::from(err)
        })
    }

    /// Execute a query or mutation.
    #[instrument(skip_all, fields(operation_name = ?request.operation_name), level = "trace")]
    pub async fn query(&self, request: Request, header_map: HeaderMap) -> Response {
        let ctx = FetchContext::new(header_map);
        match self.plan(&request) {
            Ok(RootNode::Query(node)) => Executor::new(&*self.fetcher, &ctx).execute_query(&node).await,
            Ok(RootNode::Subscribe(_)) => Response::from_errors(vec![ServerError::new(
                "Subscriptions are only supported over WebSocket.",
            )]),
            Err(response) => response,
        }
    }

    /// Execute any operation as a stream of responses.
    ///
    /// Queries and mutations yield a single response. An operation that cannot
    /// be planned yields its errors as the only response.
    pub async fn subscribe(&self, request: Request, header_map: HeaderMap) -> BoxStream<'static, Response> {
        match self.try_subscribe(request, header_map).await {
            Ok(stream) => stream,
            Err(errors) => stream::once(future::ready(Response::from_errors(errors))).boxed(),
        }
    }

    /// Like [`SharedRouteTable::subscribe`], but reports an operation that
    /// cannot be planned as an error instead of a response.
    #[instrument(skip_all, fields(operation_name = ?request.operation_name), level = "trace")]
    pub async fn try_subscribe(
        &self,
        request: Request,
        header_map: HeaderMap,
    ) -> Result<BoxStream<'static, Response>, Vec<ServerError>> {
        let ctx = FetchContext::new(header_map);
        match self.plan(&request) {
            Ok(RootNode::Subscribe(node)) => Ok(Executor::new(&*self.fetcher, &ctx).execute_stream(&node).await),
            Ok(RootNode::Query(node)) => {
                let response = Executor::new(&*self.fetcher, &ctx).execute_query(&node).await;
                Ok(stream::once(future::ready(response)).boxed())
            },
            Err(response) => Err(response.errors),
        }
    }
}
