use futures_util::{
    future::{self, BoxFuture},
    stream::{self, BoxStream},
    FutureExt,
    StreamExt,
};
use stitchgate_planner::{FetchNode, PlanNode, QueryNode, Response, ResponseField, ServerError, SubscribeNode};
use tracing::instrument;

use crate::{merge_responses, FetchContext, FetchError, Fetcher};

type FetchResults<'a> = Vec<(&'a FetchNode, Result<Response, FetchError>)>;

/// Runs a forwarding plan against the upstreams.
pub struct Executor<'e> {
    fetcher: &'e dyn Fetcher,
    ctx: &'e FetchContext,
}

impl<'e> Executor<'e> {
    pub fn new(fetcher: &'e dyn Fetcher, ctx: &'e FetchContext) -> Self {
        Self { fetcher, ctx }
    }

    /// Dispatch every fetch of the plan, wait for all of them and merge the results.
    #[instrument(skip_all, fields(fetches = node.node.fetch_nodes().len()), level = "trace")]
    pub async fn execute_query(&self, node: &QueryNode) -> Response {
        let results = self.execute_node(&node.node).await;
        merge(&node.shape, results)
    }

    fn execute_node<'a>(&'a self, node: &'a PlanNode) -> BoxFuture<'a, FetchResults<'a>> {
        async move {
            match node {
                PlanNode::Fetch(fetch) => vec![(fetch, self.fetch(fetch).await)],
                PlanNode::Parallel(parallel) => future::join_all(parallel.nodes.iter().map(|node| self.execute_node(node)))
                    .await
                    .into_iter()
                    .flatten()
                    .collect(),
                PlanNode::Sequence(sequence) => {
                    let mut results = Vec::new();
                    for node in &sequence.nodes {
                        results.extend(self.execute_node(node).await);
                    }
                    results
                },
            }
        }
        .boxed()
    }

    async fn fetch(&self, fetch: &FetchNode) -> Result<Response, FetchError> {
        tracing::debug!(service = %fetch.service, fields = ?fetch.fields, "Forwarding sub-request.");
        self.fetcher
            .query(&fetch.service, fetch.to_request(), self.ctx)
            .await
            .map_err(|source| FetchError::Upstream {
                service: fetch.service.clone(),
                source,
            })
    }

    /// Open one upstream subscription per fetch and merge every event on its own.
    #[instrument(skip_all, fields(fetches = node.subscribe_nodes.len()), level = "trace")]
    pub async fn execute_stream(&self, node: &SubscribeNode) -> BoxStream<'static, Response> {
        let mut streams = Vec::with_capacity(node.subscribe_nodes.len());

        for fetch in &node.subscribe_nodes {
            let shape: Vec<ResponseField> = node
                .shape
                .iter()
                .filter(|field| fetch.fields.contains(&field.key))
                .cloned()
                .collect();
            let fetch = fetch.clone();

            match self.fetcher.subscribe(&fetch.service, fetch.to_request(), self.ctx).await {
                Ok(events) => streams.push(
                    events
                        .map(move |response| merge(&shape, vec![(&fetch, Ok(response))]))
                        .boxed(),
                ),
                Err(source) => {
                    let err = FetchError::Upstream {
                        service: fetch.service.clone(),
                        source,
                    };
                    streams.push(stream::once(future::ready(merge(&shape, vec![(&fetch, Err(err))]))).boxed());
                },
            }
        }

        stream::select_all(streams).boxed()
    }
}

fn merge<'a>(shape: &[ResponseField], results: FetchResults<'a>) -> Response {
    merge_responses(shape, results).unwrap_or_else(|err| {
        tracing::error!(error = %err, "Failed to merge upstream responses.");
        Response::from_errors(vec![ServerError::new("Internal server error.")])
    })
}
