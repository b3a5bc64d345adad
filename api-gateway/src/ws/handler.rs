//! WebSocket fill-stream handler

use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::ws::message::{Subscription, WsError, WsNotification, WsRequest, WsResponse};
use crate::AppState;

/// Handle WebSocket connection
pub async fn ws_handler(
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: axum::extract::ws::WebSocket, state: Arc<AppState>) {
    let client_id = Uuid::new_v4();
    let subscriptions: Arc<Mutex<HashSet<Subscription>>> = Arc::new(Mutex::new(HashSet::new()));

    info!("New WebSocket connection: {}", client_id);

    // Channel for sending messages to the client
    let (tx, mut rx) = mpsc::channel::<String>(100);

    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Forward queued messages to the WebSocket
    let send_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if let Err(e) = ws_sender
                .send(axum::extract::ws::Message::Text(message))
                .await
            {
                error!("Error sending message: {}", e);
                break;
            }
        }

        let _ = ws_sender.close().await;
    });

    let tx_clone = tx.clone();

    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(axum::extract::ws::Message::Text(text)) => {
                debug!("Received text message: {}", text);

                let request: WsRequest = match serde_json::from_str(&text) {
                    Ok(req) => req,
                    Err(e) => {
                        let response = WsResponse {
                            id: "0".to_string(),
                            result: None,
                            error: Some(WsError {
                                code: 400,
                                message: format!("Invalid request: {}", e),
                            }),
                        };

                        if let Err(e) = tx.send(serde_json::to_string(&response).unwrap()).await {
                            error!("Error sending error response: {}", e);
                            break;
                        }

                        continue;
                    }
                };

                match request.method.as_str() {
                    "subscribe" => {
                        // Optional pair filter; absent means all fills
                        let pair = request.params.get("pair").and_then(|p| {
                            if let serde_json::Value::String(pair) = p {
                                Some(pair.clone())
                            } else {
                                None
                            }
                        });

                        let subscription_id = Uuid::new_v4();
                        let subscription = Subscription {
                            pair: pair.clone(),
                            id: subscription_id,
                        };

                        // Stream fills from the engine, filtered by pair
                        let mut fills = state.engine.subscribe_fills();
                        let sub_tx = tx_clone.clone();
                        let pair_filter = pair.clone();

                        tokio::spawn(async move {
                            while let Ok(fill) = fills.recv().await {
                                if let Some(filter) = &pair_filter {
                                    if &fill.pair.symbol() != filter {
                                        continue;
                                    }
                                }

                                let notification = WsNotification {
                                    method: "fill".to_string(),
                                    params: json!({
                                        "pair": fill.pair.symbol(),
                                        "data": fill,
                                        "subscription_id": subscription_id.to_string(),
                                    }),
                                };

                                if let Err(e) = sub_tx
                                    .send(serde_json::to_string(&notification).unwrap())
                                    .await
                                {
                                    error!("Error sending notification: {}", e);
                                    break;
                                }
                            }

                            debug!("Subscription handler for {} exited", subscription_id);
                        });

                        {
                            let mut subs = subscriptions.lock().await;
                            subs.insert(subscription.clone());
                        }

                        let response = WsResponse {
                            id: request.id,
                            result: Some(json!({
                                "subscriptionId": subscription_id,
                                "pair": pair,
                            })),
                            error: None,
                        };

                        if let Err(e) = tx.send(serde_json::to_string(&response).unwrap()).await {
                            error!("Error sending success response: {}", e);
                            break;
                        }
                    }
                    "unsubscribe" => {
                        let subscription_id = match request.params.get("subscriptionId") {
                            Some(serde_json::Value::String(id)) => match Uuid::parse_str(id) {
                                Ok(uuid) => uuid,
                                Err(_) => {
                                    let response = WsResponse {
                                        id: request.id,
                                        result: None,
                                        error: Some(WsError {
                                            code: 400,
                                            message: "Invalid subscription ID".to_string(),
                                        }),
                                    };

                                    if let Err(e) =
                                        tx.send(serde_json::to_string(&response).unwrap()).await
                                    {
                                        error!("Error sending error response: {}", e);
                                        break;
                                    }

                                    continue;
                                }
                            },
                            _ => {
                                let response = WsResponse {
                                    id: request.id,
                                    result: None,
                                    error: Some(WsError {
                                        code: 400,
                                        message: "Missing or invalid subscriptionId parameter"
                                            .to_string(),
                                    }),
                                };

                                if let Err(e) =
                                    tx.send(serde_json::to_string(&response).unwrap()).await
                                {
                                    error!("Error sending error response: {}", e);
                                    break;
                                }

                                continue;
                            }
                        };

                        let found_subscription = {
                            let subs = subscriptions.lock().await;
                            subs.iter().find(|s| s.id == subscription_id).cloned()
                        };

                        match found_subscription {
                            Some(subscription) => {
                                {
                                    let mut subs = subscriptions.lock().await;
                                    subs.remove(&subscription);
                                }

                                let response = WsResponse {
                                    id: request.id,
                                    result: Some(json!({
                                        "unsubscribed": true,
                                    })),
                                    error: None,
                                };

                                if let Err(e) =
                                    tx.send(serde_json::to_string(&response).unwrap()).await
                                {
                                    error!("Error sending success response: {}", e);
                                    break;
                                }
                            }
                            None => {
                                let response = WsResponse {
                                    id: request.id,
                                    result: None,
                                    error: Some(WsError {
                                        code: 404,
                                        message: "Subscription not found".to_string(),
                                    }),
                                };

                                if let Err(e) =
                                    tx.send(serde_json::to_string(&response).unwrap()).await
                                {
                                    error!("Error sending error response: {}", e);
                                    break;
                                }
                            }
                        }
                    }
                    "ping" => {
                        let response = WsResponse {
                            id: request.id,
                            result: Some(json!({
                                "pong": chrono::Utc::now().to_rfc3339(),
                            })),
                            error: None,
                        };

                        if let Err(e) = tx.send(serde_json::to_string(&response).unwrap()).await {
                            error!("Error sending pong response: {}", e);
                            break;
                        }
                    }
                    _ => {
                        let response = WsResponse {
                            id: request.id,
                            result: None,
                            error: Some(WsError {
                                code: 400,
                                message: format!("Unknown method: {}", request.method),
                            }),
                        };

                        if let Err(e) = tx.send(serde_json::to_string(&response).unwrap()).await {
                            error!("Error sending error response: {}", e);
                            break;
                        }
                    }
                }
            }
            Ok(axum::extract::ws::Message::Ping(_bytes)) => {
                if let Err(e) = tx.send(serde_json::to_string(&"PONG").unwrap()).await {
                    error!("Error sending pong: {}", e);
                    break;
                }
            }
            Ok(axum::extract::ws::Message::Close(_)) => {
                debug!("Received close message");
                break;
            }
            Err(e) => {
                error!("Error receiving message: {}", e);
                break;
            }
            _ => {}
        }
    }

    info!("WebSocket connection closed: {}", client_id);

    send_task.abort();

    {
        let mut subs = subscriptions.lock().await;
        subs.clear();
    }
}
