//! The `graphql-transport-ws` protocol, spoken towards upstreams and towards clients.

use std::{collections::HashMap, time::Duration};

use anyhow::Context;
use futures_util::{stream::BoxStream, SinkExt, StreamExt};
use http::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use stitchgate_planner::{Request, Response, ServerError};
use tokio::{net::TcpStream, sync::mpsc, task::JoinHandle};
use tokio_tungstenite::{
    tungstenite::{client::IntoClientRequest, Message},
    MaybeTlsStream,
    WebSocketStream,
};

use crate::SharedRouteTable;

pub(crate) const PROTOCOL: &str = "graphql-transport-ws";

const CONNECTION_ACK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum ClientMessage {
    ConnectionInit {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<serde_json::Value>,
    },
    Subscribe {
        id: String,
        payload: Request,
    },
    Complete {
        id: String,
    },
    Ping {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<serde_json::Value>,
    },
    Pong {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<serde_json::Value>,
    },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum ServerMessage {
    ConnectionAck {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<serde_json::Value>,
    },
    Next {
        id: String,
        payload: Response,
    },
    Error {
        id: String,
        payload: Vec<ServerError>,
    },
    Complete {
        id: String,
    },
    Ping {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<serde_json::Value>,
    },
    Pong {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<serde_json::Value>,
    },
}

fn text<T: Serialize>(message: &T) -> anyhow::Result<Message> {
    Ok(Message::Text(serde_json::to_string(message)?))
}

/// Subscribe to an upstream and yield each `next` payload.
///
/// The stream ends when the upstream completes, reports an error or closes the
/// connection. Dropping the stream closes the connection.
pub(crate) async fn connect(
    url: &str,
    header_map: &HeaderMap,
    request: Request,
) -> anyhow::Result<BoxStream<'static, Response>> {
    let mut http_request = url.into_client_request()?;
    for (name, value) in header_map {
        http_request.headers_mut().append(name, value.clone());
    }
    http_request
        .headers_mut()
        .insert("Sec-WebSocket-Protocol", HeaderValue::from_static(PROTOCOL));

    let (mut stream, _) = tokio_tungstenite::connect_async(http_request).await?;

    stream
        .send(text(&ClientMessage::ConnectionInit { payload: None })?)
        .await?;
    tokio::time::timeout(CONNECTION_ACK_TIMEOUT, wait_for_ack(&mut stream))
        .await
        .context("Timed out waiting for the connection to be acknowledged.")??;

    let id = "1".to_string();
    stream
        .send(text(&ClientMessage::Subscribe {
            id: id.clone(),
            payload: request,
        })?)
        .await?;

    Ok(async_stream::stream! {
        while let Some(message) = stream.next().await {
            let text = match message {
                Ok(Message::Text(text)) => text,
                Ok(Message::Close(_)) => break,
                Ok(_) => continue,
                Err(err) => {
                    yield Response::from_errors(vec![ServerError::new(err.to_string())]);
                    break;
                },
            };

            match serde_json::from_str::<ServerMessage>(&text) {
                Ok(ServerMessage::Next { id: message_id, payload }) if message_id == id => yield payload,
                Ok(ServerMessage::Error { id: message_id, payload }) if message_id == id => {
                    yield Response::from_errors(payload);
                    break;
                },
                Ok(ServerMessage::Complete { id: message_id }) if message_id == id => break,
                Ok(ServerMessage::Ping { .. }) => {
                    let pong = match self::text(&ClientMessage::Pong { payload: None }) {
                        Ok(pong) => pong,
                        Err(err) => {
                            tracing::error!(error = %err, "Failed to encode message.");
                            break;
                        },
                    };
                    if stream.send(pong).await.is_err() {
                        break;
                    }
                },
                Ok(_) => {},
                Err(err) => tracing::warn!(error = %err, "Invalid message from upstream."),
            }
        }
    }
    .boxed())
}

async fn wait_for_ack(stream: &mut WebSocketStream<MaybeTlsStream<TcpStream>>) -> anyhow::Result<()> {
    while let Some(message) = stream.next().await {
        if let Message::Text(text) = message? {
            match serde_json::from_str::<ServerMessage>(&text)? {
                ServerMessage::ConnectionAck { .. } => return Ok(()),
                ServerMessage::Ping { .. } => stream.send(self::text(&ClientMessage::Pong { payload: None })?).await?,
                _ => {},
            }
        }
    }
    anyhow::bail!("Connection closed before it was acknowledged.")
}

/// Serve `graphql-transport-ws` to a client, forwarding each subscription.
pub(crate) async fn server(
    shared_route_table: SharedRouteTable,
    websocket: warp::ws::WebSocket,
    header_map: HeaderMap,
) {
    let (mut sink, mut stream) = websocket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    let mut subscriptions: HashMap<String, JoinHandle<()>> = HashMap::new();

    loop {
        tokio::select! {
            message = stream.next() => {
                let message = match message {
                    Some(Ok(message)) => message,
                    _ => break,
                };
                if message.is_close() {
                    break;
                }
                let text = match message.to_str() {
                    Ok(text) => text,
                    Err(_) => continue,
                };

                match serde_json::from_str::<ClientMessage>(text) {
                    Ok(ClientMessage::ConnectionInit { .. }) => {
                        let _ = tx.send(ServerMessage::ConnectionAck { payload: None });
                    },
                    Ok(ClientMessage::Subscribe { id, payload }) => {
                        let shared_route_table = shared_route_table.clone();
                        let header_map = header_map.clone();
                        let tx = tx.clone();
                        let subscription_id = id.clone();
                        let handle = tokio::spawn(async move {
                            let mut responses = match shared_route_table.try_subscribe(payload, header_map).await {
                                Ok(responses) => responses,
                                Err(errors) => {
                                    let _ = tx.send(ServerMessage::Error {
                                        id: subscription_id,
                                        payload: errors,
                                    });
                                    return;
                                },
                            };
                            while let Some(response) = responses.next().await {
                                let next = ServerMessage::Next {
                                    id: subscription_id.clone(),
                                    payload: response,
                                };
                                if tx.send(next).is_err() {
                                    return;
                                }
                            }
                            let _ = tx.send(ServerMessage::Complete { id: subscription_id });
                        });
                        if let Some(previous) = subscriptions.insert(id, handle) {
                            previous.abort();
                        }
                    },
                    Ok(ClientMessage::Complete { id }) => {
                        if let Some(handle) = subscriptions.remove(&id) {
                            handle.abort();
                        }
                    },
                    Ok(ClientMessage::Ping { .. }) => {
                        let _ = tx.send(ServerMessage::Pong { payload: None });
                    },
                    Ok(ClientMessage::Pong { .. }) => {},
                    Err(err) => {
                        tracing::debug!(error = %err, "Invalid message from client.");
                        break;
                    },
                }
            },
            Some(message) = rx.recv() => {
                if let ServerMessage::Complete { id } | ServerMessage::Error { id, .. } = &message {
                    subscriptions.remove(id);
                }
                let text = match serde_json::to_string(&message) {
                    Ok(text) => text,
                    Err(err) => {
                        tracing::error!(error = %err, "Failed to encode message.");
                        continue;
                    },
                };
                if sink.send(warp::ws::Message::text(text)).await.is_err() {
                    break;
                }
            },
        }
    }

    for (_, handle) in subscriptions {
        handle.abort();
    }
}
