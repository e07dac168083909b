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

//! Flight tracking client library: snapshot fetch, push updates, and a
//! reconciled in-memory flight set.
//!
//! This library merges an initial bulk snapshot, periodic full refreshes,
//! and streamed push notifications into one consistent flight set, and
//! derives filtered, map-displayable views from it. It is organized as
//! layers that can be used independently or composed together:
//!
//! - **API layer**: REST client for snapshots, stats, trails, and search
//! - **Channel layer**: websocket topic subscription with automatic
//!   reconnection
//! - **Store layer**: the tracked flight set, replaced wholesale per
//!   refresh or merged by ICAO address per delta batch
//! - **Filter layer**: pure region/search filtering
//! - **Geo layer**: GeoJSON projection behind a narrow map-widget trait
//!
//! # Quick Start
//!
//! Use the [`Client`] type for full-stack operation:
//!
//! ```no_run
//! use flight_client::{Client, ClientConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), flight_client::ApiError> {
//!     let mut client = Client::spawn(ClientConfig {
//!         base_url: "http://localhost:8080".to_string(),
//!         ..Default::default()
//!     })?;
//!
//!     // Event pump: applies the refresh strategy per push message
//!     while client.process_next().await {
//!         println!("{} flights tracked", client.flight_count());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Using Individual Layers
//!
//! ## Filter Layer Only
//!
//! ```
//! use flight_client::filter::{self, FilterParams, Region};
//!
//! let flights = vec![];
//! let params = FilterParams {
//!     region: Region::Europe,
//!     query: "BAW".to_string(),
//! };
//! let view = filter::apply(&flights, &params);
//! assert!(view.is_empty());
//! ```

pub mod api;
pub mod filter;
pub mod geo;
pub mod model;
pub mod store;
pub mod ws;

use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, warn};
use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;

pub use api::{ApiClient, ApiError};
pub use filter::{FilterParams, Region};
pub use geo::{Bounds, MapProjector, MapView, TrailError};
pub use model::{Flight, FlightStats, TrailPoint, UpdateNotice, VerticalTrend};
pub use store::{FlightStore, StoreConfig, StoreEvent};
pub use ws::{ChannelConfig, ChannelEvent, ChannelState, Subscription};

/// How the client reconciles a push message into the flight store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RefreshStrategy {
    /// Treat the payload as an opaque trigger and refetch the snapshot.
    ///
    /// The default, matching the backend's notify-only channel.
    #[default]
    Refetch,

    /// Decode the payload as a batch of flight records and merge them by
    /// ICAO address. Payloads without records fall back to a refetch.
    MergeDelta,
}

/// Configuration for the full-stack client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend base address (scheme + host + port).
    pub base_url: String,
    /// Update channel configuration.
    pub channel: ChannelConfig,
    /// Interval between periodic full refreshes.
    pub refresh_interval: Duration,
    /// Push message reconciliation strategy.
    pub strategy: RefreshStrategy,
    /// Flight store configuration.
    pub store: StoreConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            channel: ChannelConfig::default(),
            // the backend refreshes its own data every 3 minutes
            refresh_interval: Duration::from_secs(180),
            strategy: RefreshStrategy::default(),
            store: StoreConfig::default(),
        }
    }
}

/// Full-stack flight client that wires all layers together.
///
/// The client owns the flight store, fetches the snapshot at startup and
/// on a periodic interval, and subscribes to the update channel. Inbound
/// push messages are reconciled through [`process_next`](Self::process_next).
/// Overlapping snapshot applications are serialized, so a slow older
/// fetch can never overwrite a newer snapshot.
pub struct Client {
    store: Arc<RwLock<FlightStore>>,
    api: ApiClient,
    subscription: Subscription,
    channel_state: Arc<RwLock<ChannelState>>,
    last_update: Arc<RwLock<Option<DateTime<Utc>>>>,
    refresh_gate: Arc<Mutex<()>>,
    strategy: RefreshStrategy,
    cancel_token: CancellationToken,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("api", &self.api)
            .field("subscription", &self.subscription)
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Spawn a new client with the given configuration.
    ///
    /// Starts the update subscription and the periodic refresh task; the
    /// first refresh runs immediately.
    pub fn spawn(config: ClientConfig) -> Result<Self, ApiError> {
        let api = ApiClient::new(&config.base_url)?;
        let store = Arc::new(RwLock::new(FlightStore::new(config.store)));
        let subscription = Subscription::spawn(config.channel);
        let channel_state = Arc::new(RwLock::new(ChannelState::Disconnected));
        let refresh_gate = Arc::new(Mutex::new(()));
        let cancel_token = CancellationToken::new();

        let task_api = api.clone();
        let task_store = Arc::clone(&store);
        let task_gate = Arc::clone(&refresh_gate);
        let task_cancel = cancel_token.clone();
        let refresh_interval = config.refresh_interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(refresh_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        match run_refresh(&task_api, &task_store, &task_gate).await {
                            Ok(count) => debug!("Periodic refresh applied {} flights", count),
                            Err(e) => warn!("Periodic refresh failed: {}", e),
                        }
                    }
                    () = task_cancel.cancelled() => {
                        debug!("Refresh task cancelled");
                        return;
                    }
                }
            }
        });

        Ok(Self {
            store,
            api,
            subscription,
            channel_state,
            last_update: Arc::new(RwLock::new(None)),
            refresh_gate,
            strategy: config.strategy,
            cancel_token,
        })
    }

    /// Process the next event from the update channel.
    ///
    /// Returns `false` once the subscription has been shut down. Each
    /// update message records the last-update timestamp and triggers the
    /// configured refresh strategy exactly once.
    pub async fn process_next(&mut self) -> bool {
        let Some(event) = self.subscription.recv().await else {
            return false;
        };

        match event {
            ChannelEvent::StateChanged(state) => {
                if let Ok(mut s) = self.channel_state.write() {
                    *s = state;
                }
            }
            ChannelEvent::UpdateReceived(payload) => {
                if let Ok(mut ts) = self.last_update.write() {
                    *ts = Some(Utc::now());
                }
                self.apply_update(&payload).await;
            }
        }

        true
    }

    /// Reconcile one push payload into the store.
    async fn apply_update(&self, payload: &str) {
        match self.strategy {
            RefreshStrategy::Refetch => {
                if let Err(e) = self.refresh().await {
                    warn!("Snapshot refresh after update failed: {}", e);
                }
            }
            RefreshStrategy::MergeDelta => {
                match serde_json::from_str::<Vec<Flight>>(payload) {
                    Ok(batch) if !batch.is_empty() => {
                        if let Ok(mut store) = self.store.write() {
                            store.merge(batch);
                        }
                    }
                    _ => {
                        // notify-only payload, no records to merge
                        if let Ok(notice) = serde_json::from_str::<UpdateNotice>(payload) {
                            debug!("Update notice: {:?}", notice);
                        }
                        if let Err(e) = self.refresh().await {
                            warn!("Snapshot refresh after update failed: {}", e);
                        }
                    }
                }
            }
        }
    }

    /// Fetch a fresh snapshot and replace the store contents.
    ///
    /// Serialized against concurrent refreshes; on failure the store's
    /// last-good state is left untouched.
    pub async fn refresh(&self) -> Result<usize, ApiError> {
        run_refresh(&self.api, &self.store, &self.refresh_gate).await
    }

    /// Get the current flight set.
    #[must_use]
    pub fn flights(&self) -> Vec<Flight> {
        self.store
            .read()
            .map(|s| s.flights().into_iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Look up a flight by ICAO address (case-insensitive).
    #[must_use]
    pub fn get_by_icao(&self, icao24: &str) -> Option<Flight> {
        self.store.read().ok().and_then(|s| s.get(icao24).cloned())
    }

    /// Number of tracked flights.
    #[must_use]
    pub fn flight_count(&self) -> usize {
        self.store.read().map(|s| s.len()).unwrap_or(0)
    }

    /// Store generation counter (bumped by every mutation).
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.store.read().map(|s| s.generation()).unwrap_or(0)
    }

    /// Subscribe to store change events.
    #[must_use]
    pub fn subscribe_store(&self) -> broadcast::Receiver<StoreEvent> {
        self.store
            .read()
            .map(|s| s.subscribe())
            .unwrap_or_else(|_| {
                let (tx, rx) = broadcast::channel(1);
                drop(tx);
                rx
            })
    }

    /// The current update channel state.
    #[must_use]
    pub fn channel_state(&self) -> ChannelState {
        self.channel_state
            .read()
            .map(|s| s.clone())
            .unwrap_or(ChannelState::Disconnected)
    }

    /// When the last push update arrived, if any.
    #[must_use]
    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.last_update.read().map(|ts| *ts).unwrap_or(None)
    }

    /// The backend API client, for side-channel requests (stats, trails).
    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Shared handle to the underlying store, for readers on other tasks.
    #[must_use]
    pub fn store_handle(&self) -> Arc<RwLock<FlightStore>> {
        Arc::clone(&self.store)
    }

    /// Change the update channel URL.
    ///
    /// The subscription will disconnect and reconnect to the new address.
    pub fn set_channel_url(&self, url: String) {
        self.subscription.set_url(url);
    }

    /// Shut down the client: cancels the refresh task and the
    /// subscription, after which no further events are delivered.
    pub fn shutdown(&self) {
        self.cancel_token.cancel();
        self.subscription.shutdown();
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

async fn run_refresh(
    api: &ApiClient,
    store: &Arc<RwLock<FlightStore>>,
    gate: &Mutex<()>,
) -> Result<usize, ApiError> {
    let _serialized = gate.lock().await;
    let flights = api.fetch_current().await?;
    let count = flights.len();
    if let Ok(mut store) = store.write() {
        store.replace_all(flights);
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_config() -> ClientConfig {
        ClientConfig {
            // nothing listens on either port; fetches fail, the channel
            // stays in its reconnect cycle
            base_url: "http://127.0.0.1:1".to_string(),
            channel: ChannelConfig {
                url: "ws://127.0.0.1:1".to_string(),
                reconnect_delay: Duration::from_millis(20),
                ..Default::default()
            },
            refresh_interval: Duration::from_secs(3600),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_spawn_starts_empty_and_shuts_down() {
        let client = Client::spawn(offline_config()).unwrap();

        assert_eq!(client.flight_count(), 0);
        assert!(client.last_update().is_none());
        client.shutdown();
    }

    #[tokio::test]
    async fn test_failed_refresh_leaves_store_untouched() {
        let client = Client::spawn(offline_config()).unwrap();

        if let Ok(mut store) = client.store.write() {
            store.replace_all(vec![serde_json::from_str(r#"{"icao24": "abc123"}"#).unwrap()]);
        }
        let generation = client.generation();

        assert!(client.refresh().await.is_err());
        assert_eq!(client.flight_count(), 1);
        assert_eq!(client.generation(), generation);

        client.shutdown();
    }

    #[tokio::test]
    async fn test_merge_delta_applies_record_batches() {
        let mut config = offline_config();
        config.strategy = RefreshStrategy::MergeDelta;
        let client = Client::spawn(config).unwrap();

        let payload = r#"[
            {"icao24": "ABC123", "originCountry": "France", "latitude": 48.8, "longitude": 2.3},
            {"icao24": "XYZ789", "originCountry": "United States"}
        ]"#;
        client.apply_update(payload).await;

        assert_eq!(client.flight_count(), 2);
        let merged = client.get_by_icao("abc123").unwrap();
        assert_eq!(merged.latitude, Some(48.8));

        client.shutdown();
    }
}
