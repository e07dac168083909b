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

//! REST client for the flight backend.
//!
//! Covers the consumed surface: current snapshot, aggregate stats,
//! per-aircraft trail, and callsign search. Failures are returned to the
//! caller, which owns retry policy; nothing here retries on its own.

use std::time::Duration;

use log::debug;
use thiserror::Error;

use crate::model::{Flight, FlightStats, TrailPoint};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors from backend requests.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Network-level failure: unreachable host, timeout, decode error.
    #[error("backend request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Backend answered with a non-success status.
    #[error("backend returned {status} for {url}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },
}

/// Client for the backend's flight endpoints.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Create a client for the given base address (scheme + host + port).
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// The configured base address.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/flights{path}", self.base_url)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: String) -> Result<T, ApiError> {
        debug!("GET {url}");
        let response = self.http.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status { status, url });
        }

        Ok(response.json().await?)
    }

    /// Fetch the current snapshot of all tracked flights.
    pub async fn fetch_current(&self) -> Result<Vec<Flight>, ApiError> {
        self.get_json(self.endpoint("/current")).await
    }

    /// Fetch aggregate flight statistics.
    pub async fn fetch_stats(&self) -> Result<FlightStats, ApiError> {
        self.get_json(self.endpoint("/stats")).await
    }

    /// Fetch the historical trail for one aircraft, oldest first.
    pub async fn fetch_trail(&self, icao24: &str) -> Result<Vec<TrailPoint>, ApiError> {
        self.get_json(self.endpoint(&format!("/{}/trail", icao24.to_lowercase())))
            .await
    }

    /// Search flights by callsign substring.
    pub async fn search(&self, callsign: &str) -> Result<Vec<Flight>, ApiError> {
        let url = format!("{}?callsign={callsign}", self.endpoint("/search"));
        self.get_json(url).await
    }
}
