// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Push-channel subscription with automatic reconnection.
//!
//! Maintains a websocket connection to the update channel, subscribes to
//! a single topic, and delivers every inbound message as an event. On any
//! failure the subscription drops to `Disconnected` and retries after a
//! fixed delay, indefinitely, until shut down.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use serde_json::json;
use tokio::sync::{mpsc, watch};
use tokio::time::sleep;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

/// Configuration for the update subscription.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Websocket URL of the update channel.
    pub url: String,
    /// Topic to subscribe to after connecting.
    pub topic: String,
    /// Delay before reconnecting after a disconnect.
    pub reconnect_delay: Duration,
    /// Channel buffer size for delivered events.
    pub buffer_size: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8080/ws-flights".to_string(),
            topic: "flight-updates".to_string(),
            reconnect_delay: Duration::from_secs(5),
            buffer_size: 64,
        }
    }
}

/// Subscription state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelState {
    /// Attempting to connect and subscribe.
    Connecting,
    /// Subscribed to the update topic.
    Connected,
    /// Disconnected (will attempt reconnect).
    Disconnected,
    /// Connection error occurred.
    Error(String),
}

/// Events emitted by the subscription.
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    /// Subscription state changed.
    StateChanged(ChannelState),
    /// An update message arrived on the topic (raw payload).
    UpdateReceived(String),
}

/// Handle to a managed update subscription.
///
/// The subscription runs in a background task and automatically
/// reconnects on disconnect. Use `recv()` to receive events and
/// `set_url()` to change the channel address at runtime. Dropping the
/// handle cancels the task, so no events fire after teardown.
pub struct Subscription {
    event_rx: mpsc::Receiver<ChannelEvent>,
    url_tx: watch::Sender<String>,
    cancel_token: CancellationToken,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("cancel_token", &self.cancel_token)
            .finish_non_exhaustive()
    }
}

impl Subscription {
    /// Spawn a new subscription task with the given configuration.
    #[must_use]
    pub fn spawn(config: ChannelConfig) -> Self {
        let (event_tx, event_rx) = mpsc::channel(config.buffer_size);
        let (url_tx, url_rx) = watch::channel(config.url.clone());
        let cancel_token = CancellationToken::new();

        let task_cancel = cancel_token.clone();
        let reconnect_delay = config.reconnect_delay;
        let topic = config.topic;

        tokio::spawn(async move {
            subscription_loop(event_tx, url_rx, task_cancel, reconnect_delay, topic).await;
        });

        Self {
            event_rx,
            url_tx,
            cancel_token,
        }
    }

    /// Receive the next event from the subscription.
    ///
    /// Returns `None` once the subscription has been shut down.
    pub async fn recv(&mut self) -> Option<ChannelEvent> {
        self.event_rx.recv().await
    }

    /// Change the channel URL.
    ///
    /// The subscription will disconnect and reconnect to the new address.
    pub fn set_url(&self, url: String) {
        let _ = self.url_tx.send(url);
    }

    /// Get the current channel URL.
    #[must_use]
    pub fn current_url(&self) -> String {
        self.url_tx.borrow().clone()
    }

    /// Shut down the subscription.
    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

async fn subscription_loop(
    event_tx: mpsc::Sender<ChannelEvent>,
    mut url_rx: watch::Receiver<String>,
    cancel_token: CancellationToken,
    reconnect_delay: Duration,
    topic: String,
) {
    loop {
        if cancel_token.is_cancelled() {
            info!("Subscription cancelled");
            return;
        }

        let current_url = url_rx.borrow_and_update().clone();

        if event_tx
            .send(ChannelEvent::StateChanged(ChannelState::Connecting))
            .await
            .is_err()
        {
            return; // Receiver dropped
        }

        info!("Connecting to update channel at {}...", current_url);

        match subscribe_and_listen(&current_url, &topic, &event_tx, &mut url_rx, &cancel_token)
            .await
        {
            Ok(reason) => match reason {
                ReconnectReason::UrlChanged => {
                    info!("Channel URL changed, reconnecting immediately...");
                    continue;
                }
                ReconnectReason::ConnectionClosed => {
                    info!("Update channel closed");
                    let _ = event_tx
                        .send(ChannelEvent::StateChanged(ChannelState::Disconnected))
                        .await;
                }
                ReconnectReason::Cancelled => {
                    info!("Subscription cancelled");
                    return;
                }
            },
            Err(e) => {
                error!("Update channel error: {}", e);
                let _ = event_tx
                    .send(ChannelEvent::StateChanged(ChannelState::Error(
                        e.to_string(),
                    )))
                    .await;
            }
        }

        warn!("Reconnecting in {} seconds...", reconnect_delay.as_secs());

        tokio::select! {
            () = sleep(reconnect_delay) => {}
            () = cancel_token.cancelled() => {
                info!("Subscription cancelled during reconnect delay");
                return;
            }
        }
    }
}

enum ReconnectReason {
    UrlChanged,
    ConnectionClosed,
    Cancelled,
}

async fn subscribe_and_listen(
    url: &str,
    topic: &str,
    event_tx: &mpsc::Sender<ChannelEvent>,
    url_rx: &mut watch::Receiver<String>,
    cancel_token: &CancellationToken,
) -> Result<ReconnectReason, Box<dyn std::error::Error + Send + Sync>> {
    let (mut ws, _) = connect_async(url).await?;
    info!("Connected to {}, subscribing to '{}'", url, topic);

    let subscribe_frame = json!({ "action": "subscribe", "topic": topic }).to_string();
    ws.send(Message::text(subscribe_frame)).await?;

    if event_tx
        .send(ChannelEvent::StateChanged(ChannelState::Connected))
        .await
        .is_err()
    {
        return Ok(ReconnectReason::Cancelled);
    }

    loop {
        tokio::select! {
            frame = ws.next() => {
                match frame {
                    Some(Ok(Message::Text(payload))) => {
                        if event_tx
                            .send(ChannelEvent::UpdateReceived(payload.to_string()))
                            .await
                            .is_err()
                        {
                            return Ok(ReconnectReason::Cancelled);
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        ws.send(Message::Pong(data)).await?;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Channel closed by server");
                        return Ok(ReconnectReason::ConnectionClosed);
                    }
                    Some(Ok(other)) => {
                        debug!("Ignoring non-text frame: {:?}", other);
                    }
                    Some(Err(e)) => {
                        return Err(Box::new(e));
                    }
                }
            }

            _ = url_rx.changed() => {
                let new_url = url_rx.borrow_and_update().clone();
                if new_url != url {
                    info!("Channel URL changed from {} to {}", url, new_url);
                    return Ok(ReconnectReason::UrlChanged);
                }
            }

            () = cancel_token.cancelled() => {
                let _ = ws.close(None).await;
                return Ok(ReconnectReason::Cancelled);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    async fn next_state(sub: &mut Subscription) -> ChannelState {
        loop {
            match sub.recv().await {
                Some(ChannelEvent::StateChanged(state)) => return state,
                Some(ChannelEvent::UpdateReceived(_)) => {}
                None => panic!("subscription ended while waiting for state"),
            }
        }
    }

    async fn next_update(sub: &mut Subscription) -> String {
        loop {
            match sub.recv().await {
                Some(ChannelEvent::UpdateReceived(payload)) => return payload,
                Some(ChannelEvent::StateChanged(_)) => {}
                None => panic!("subscription ended while waiting for update"),
            }
        }
    }

    #[tokio::test]
    async fn test_subscribes_receives_and_reconnects() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            // First session: expect the subscribe frame, push one update,
            // then close to force a reconnect.
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();

            let frame = ws.next().await.unwrap().unwrap();
            let text = frame.into_text().unwrap();
            assert!(text.contains("subscribe"));
            assert!(text.contains("flight-updates"));

            ws.send(Message::text(r#"{"type":"FLIGHT_UPDATE","flightCount":42}"#))
                .await
                .unwrap();
            ws.close(None).await.unwrap();

            // Second session: the subscriber comes back on its own.
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            let frame = ws.next().await.unwrap().unwrap();
            assert!(frame.into_text().unwrap().contains("subscribe"));
        });

        let mut sub = Subscription::spawn(ChannelConfig {
            url: format!("ws://{addr}"),
            reconnect_delay: Duration::from_millis(50),
            ..Default::default()
        });

        assert_eq!(next_state(&mut sub).await, ChannelState::Connecting);
        assert_eq!(next_state(&mut sub).await, ChannelState::Connected);

        let payload = next_update(&mut sub).await;
        assert!(payload.contains("FLIGHT_UPDATE"));

        // Server closed: Disconnected, then an automatic reconnect attempt.
        assert_eq!(next_state(&mut sub).await, ChannelState::Disconnected);
        assert_eq!(next_state(&mut sub).await, ChannelState::Connecting);
        assert_eq!(next_state(&mut sub).await, ChannelState::Connected);

        server.await.unwrap();
        sub.shutdown();
    }

    #[tokio::test]
    async fn test_one_event_per_message() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            let _subscribe = ws.next().await.unwrap().unwrap();

            for n in 0..3 {
                ws.send(Message::text(format!("{{\"type\":\"FLIGHT_UPDATE\",\"flightCount\":{n}}}")))
                    .await
                    .unwrap();
            }
            // keep the connection open until the client is done
            let _ = ws.next().await;
        });

        let mut sub = Subscription::spawn(ChannelConfig {
            url: format!("ws://{addr}"),
            reconnect_delay: Duration::from_millis(50),
            ..Default::default()
        });

        for n in 0..3 {
            let payload = next_update(&mut sub).await;
            assert!(payload.contains(&format!("\"flightCount\":{n}")));
        }

        sub.shutdown();
    }

    #[tokio::test]
    async fn test_shutdown_stops_event_delivery() {
        // Nothing listening on the target port: the subscription cycles
        // between Connecting and Error until torn down.
        let mut sub = Subscription::spawn(ChannelConfig {
            url: "ws://127.0.0.1:1".to_string(),
            reconnect_delay: Duration::from_millis(10),
            ..Default::default()
        });

        assert_eq!(next_state(&mut sub).await, ChannelState::Connecting);
        sub.shutdown();

        // Drain whatever was in flight; the channel must end.
        while sub.recv().await.is_some() {}
    }
}
