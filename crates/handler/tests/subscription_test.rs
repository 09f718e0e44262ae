use std::time::Duration;

use async_graphql::{Context, EmptyMutation, Object, Schema, SimpleObject, Subscription};
use futures_util::{stream::BoxStream, Stream, StreamExt};
use http::HeaderMap;
use pretty_assertions::assert_eq;
use serde_json::json;
use stitchgate_handler::{FetchContext, Fetcher, SharedRouteTable, TriggerRegistry};
use stitchgate_planner::{PartitionPolicy, Request, Response, ServerError};
use stitchgate_schema::ComposedSchema;

const TRIGGER: &str = "notifications";

struct QueryRoot;

#[Object]
impl QueryRoot {
    async fn field_a(&self) -> i32 {
        1
    }

    async fn field_b(&self) -> i32 {
        2
    }

    async fn field3(&self) -> i32 {
        3
    }
}

#[derive(Clone, SimpleObject)]
struct Notification {
    text: String,
}

impl Notification {
    fn new(text: &str) -> Self {
        Self { text: text.to_string() }
    }
}

struct SubscriptionRoot;

#[Subscription]
impl SubscriptionRoot {
    async fn notifications(&self, ctx: &Context<'_>) -> impl Stream<Item = Notification> {
        ctx.data_unchecked::<TriggerRegistry<Notification>>().subscribe(TRIGGER)
    }
}

type UpstreamSchema = Schema<QueryRoot, EmptyMutation, SubscriptionRoot>;

/// Runs sub-requests against an in-process async-graphql schema.
struct LocalFetcher {
    schema: UpstreamSchema,
}

fn to_upstream(request: Request) -> anyhow::Result<async_graphql::Request> {
    Ok(serde_json::from_value(serde_json::to_value(request)?)?)
}

fn from_upstream(response: async_graphql::Response) -> Response {
    serde_json::to_value(response)
        .and_then(serde_json::from_value)
        .unwrap_or_else(|err| Response::from_errors(vec![ServerError::new(err.to_string())]))
}

#[async_trait::async_trait]
impl Fetcher for LocalFetcher {
    async fn query(&self, _service: &str, request: Request, _ctx: &FetchContext) -> anyhow::Result<Response> {
        Ok(from_upstream(self.schema.execute(to_upstream(request)?).await))
    }

    async fn subscribe(
        &self,
        _service: &str,
        request: Request,
        _ctx: &FetchContext,
    ) -> anyhow::Result<BoxStream<'static, Response>> {
        Ok(self.schema.execute_stream(to_upstream(request)?).map(from_upstream).boxed())
    }
}

fn gateway(registry: &TriggerRegistry<Notification>, policy: PartitionPolicy) -> SharedRouteTable {
    let upstream = Schema::build(QueryRoot, EmptyMutation, SubscriptionRoot)
        .data(registry.clone())
        .finish();
    let schema = ComposedSchema::remote(
        "upstream",
        parser::parse_schema(
            r#"
            type Query { fieldA: Int! fieldB: Int! field3: Int! }
            type Subscription { notifications: Notification! }
            type Notification { text: String! }
            "#,
        )
        .unwrap(),
    )
    .unwrap();
    SharedRouteTable::new(schema, LocalFetcher { schema: upstream }).policy(policy)
}

async fn wait_for_subscribers(registry: &TriggerRegistry<Notification>, count: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while registry.subscriber_count(TRIGGER) != count {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("subscriber count not reached");
}

#[tokio::test]
async fn queries_reach_the_upstream() {
    let registry = TriggerRegistry::new();
    for policy in [PartitionPolicy::Coalesce, PartitionPolicy::Split] {
        let response = gateway(&registry, policy)
            .query(Request::new("query {\n  fieldA\n  fieldB\n  field3\n}\n"), HeaderMap::new())
            .await;
        assert_eq!(
            serde_json::to_value(response).unwrap(),
            json!({"data": {"fieldA": 1, "fieldB": 2, "field3": 3}})
        );
    }
}

#[tokio::test]
async fn every_subscriber_receives_every_event() {
    let registry = TriggerRegistry::new();
    let gateway = gateway(&registry, PartitionPolicy::Coalesce);

    let mut listeners = Vec::new();
    for _ in 0..2 {
        let stream = gateway
            .subscribe(Request::new("subscription { notifications { text } }"), HeaderMap::new())
            .await;
        listeners.push(tokio::spawn(stream.take(2).collect::<Vec<_>>()));
    }

    wait_for_subscribers(&registry, 2).await;
    assert_eq!(registry.publish(TRIGGER, Notification::new("Hello world")), 2);
    assert_eq!(registry.publish(TRIGGER, Notification::new("Goodbye")), 2);

    for listener in listeners {
        let events = tokio::time::timeout(Duration::from_secs(5), listener)
            .await
            .unwrap()
            .unwrap();
        let events: Vec<_> = events
            .into_iter()
            .map(|event| serde_json::to_value(event).unwrap())
            .collect();
        assert_eq!(events, vec![
            json!({"data": {"notifications": {"text": "Hello world"}}}),
            json!({"data": {"notifications": {"text": "Goodbye"}}}),
        ]);
    }

    wait_for_subscribers(&registry, 0).await;
    assert_eq!(registry.publish(TRIGGER, Notification::new("Nobody")), 0);
}

#[tokio::test]
async fn dropped_subscriber_stops_receiving() {
    let registry = TriggerRegistry::new();
    let gateway = gateway(&registry, PartitionPolicy::Split);

    let kept = gateway
        .subscribe(Request::new("subscription { notifications { text } }"), HeaderMap::new())
        .await;
    let dropped = gateway
        .subscribe(Request::new("subscription { notifications { text } }"), HeaderMap::new())
        .await;
    let kept = tokio::spawn(kept.take(1).collect::<Vec<_>>());
    let dropped = tokio::spawn(dropped.take(1).collect::<Vec<_>>());

    wait_for_subscribers(&registry, 2).await;
    dropped.abort();
    wait_for_subscribers(&registry, 1).await;

    assert_eq!(registry.publish(TRIGGER, Notification::new("Hello world")), 1);
    let events = tokio::time::timeout(Duration::from_secs(5), kept)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        serde_json::to_value(&events[0]).unwrap(),
        json!({"data": {"notifications": {"text": "Hello world"}}})
    );
}

#[tokio::test]
async fn queries_over_the_stream_yield_one_response() {
    let registry = TriggerRegistry::new();
    let responses = gateway(&registry, PartitionPolicy::Coalesce)
        .subscribe(Request::new("{ fieldA }"), HeaderMap::new())
        .await
        .collect::<Vec<_>>()
        .await;

    assert_eq!(responses.len(), 1);
    assert_eq!(serde_json::to_value(&responses[0]).unwrap(), json!({"data": {"fieldA": 1}}));
}
