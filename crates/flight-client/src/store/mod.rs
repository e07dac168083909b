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

//! Flight store: the single source of truth for the tracked flight set.
//!
//! The store maps lowercase ICAO addresses to whole [`Flight`] records.
//! Refreshes replace the set wholesale; the delta path upserts whole
//! records by key. Either way a record is never patched field-by-field,
//! so readers see complete records at all times.

use std::collections::HashMap;

use tokio::sync::broadcast;

use crate::model::Flight;

/// Events emitted when the stored flight set changes.
///
/// Derived views (filtering, map projection) listen for these to know
/// their inputs are invalid and must be recomputed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreEvent {
    /// The full set was replaced by a snapshot refresh.
    SnapshotReplaced {
        /// Number of flights in the new set.
        count: usize,
    },
    /// A batch of records was merged by ICAO address.
    DeltaMerged {
        /// Number of records in the merged batch.
        count: usize,
    },
}

/// Configuration for the flight store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Broadcast channel capacity for change events.
    pub event_channel_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            event_channel_capacity: 64,
        }
    }
}

/// In-memory flight set keyed by lowercase ICAO address.
pub struct FlightStore {
    flights: HashMap<String, Flight>,
    generation: u64,
    event_tx: broadcast::Sender<StoreEvent>,
}

impl std::fmt::Debug for FlightStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlightStore")
            .field("flight_count", &self.flights.len())
            .field("generation", &self.generation)
            .finish()
    }
}

impl Default for FlightStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl FlightStore {
    /// Create an empty store with the given configuration.
    #[must_use]
    pub fn new(config: StoreConfig) -> Self {
        let (event_tx, _) = broadcast::channel(config.event_channel_capacity);

        Self {
            flights: HashMap::new(),
            generation: 0,
            event_tx,
        }
    }

    /// Replace the entire tracked set with a fresh snapshot.
    ///
    /// The swap is atomic with respect to any single read: a reader never
    /// observes a mix of old and new records.
    pub fn replace_all(&mut self, flights: Vec<Flight>) {
        let count = flights.len();
        self.flights = flights.into_iter().map(|f| (f.key(), f)).collect();
        self.generation += 1;
        let _ = self.event_tx.send(StoreEvent::SnapshotReplaced { count });
    }

    /// Merge a batch of records, replacing whole records by ICAO address.
    ///
    /// Used by the delta refresh strategy; flights absent from the batch
    /// are left untouched.
    pub fn merge(&mut self, flights: Vec<Flight>) {
        let count = flights.len();
        for flight in flights {
            self.flights.insert(flight.key(), flight);
        }
        self.generation += 1;
        let _ = self.event_tx.send(StoreEvent::DeltaMerged { count });
    }

    /// Get the present flight set.
    #[must_use]
    pub fn flights(&self) -> Vec<&Flight> {
        self.flights.values().collect()
    }

    /// Look up a flight by ICAO address (case-insensitive).
    #[must_use]
    pub fn get(&self, icao24: &str) -> Option<&Flight> {
        self.flights.get(&icao24.to_lowercase())
    }

    /// Number of tracked flights.
    #[must_use]
    pub fn len(&self) -> usize {
        self.flights.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.flights.is_empty()
    }

    /// Monotonic counter bumped by every mutation.
    ///
    /// Two reads under the same generation are guaranteed to have observed
    /// the same set.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Subscribe to change events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.event_tx.subscribe()
    }
}
