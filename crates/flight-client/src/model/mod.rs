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

//! Wire types shared across the pipeline.
//!
//! Field names mirror the backend's JSON contract (camelCase). The backend
//! serializes local date-times without a UTC offset, so timestamps decode
//! as [`NaiveDateTime`].

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Compass octant labels, clockwise from north.
const CARDINAL_DIRECTIONS: [&str; 8] = ["N", "NE", "E", "SE", "S", "SW", "W", "NW"];

/// One tracked aircraft at a point in time.
///
/// `icao24` is the stable identity; everything else is the latest observed
/// value and may be absent when the aircraft is not transmitting it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flight {
    /// ICAO 24-bit address (hex string). Compared case-insensitively.
    pub icao24: String,
    /// Flight designator (e.g., "UAL123"). May be absent or blank.
    #[serde(default)]
    pub callsign: Option<String>,
    /// Country of registry, used for region filtering.
    #[serde(default)]
    pub origin_country: Option<String>,
    /// Latitude in degrees.
    #[serde(default)]
    pub latitude: Option<f64>,
    /// Longitude in degrees.
    #[serde(default)]
    pub longitude: Option<f64>,
    /// Barometric altitude in meters.
    #[serde(default)]
    pub altitude: Option<f64>,
    /// Ground speed in meters per second.
    #[serde(default)]
    pub velocity: Option<f64>,
    /// True track in degrees [0, 360), north = 0.
    #[serde(default)]
    pub heading: Option<f64>,
    /// Vertical rate in meters per second; positive = climb.
    #[serde(default)]
    pub vertical_rate: Option<f64>,
    /// Whether the aircraft is on the ground.
    #[serde(default)]
    pub on_ground: bool,
    /// Last-observed time for this record.
    #[serde(default)]
    pub timestamp: Option<NaiveDateTime>,
}

impl Flight {
    /// Store key: the ICAO address normalized to lowercase.
    #[must_use]
    pub fn key(&self) -> String {
        self.icao24.to_lowercase()
    }

    /// Whether both coordinates are present.
    #[must_use]
    pub fn has_position(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }

    /// 8-point cardinal direction derived from the heading, if known.
    #[must_use]
    pub fn cardinal_direction(&self) -> Option<&'static str> {
        self.heading.map(cardinal_direction)
    }

    /// Climb/descent/level from the sign of the vertical rate, if known.
    #[must_use]
    pub fn vertical_trend(&self) -> Option<VerticalTrend> {
        self.vertical_rate.map(|rate| {
            if rate > 0.0 {
                VerticalTrend::Climbing
            } else if rate < 0.0 {
                VerticalTrend::Descending
            } else {
                VerticalTrend::Level
            }
        })
    }
}

/// Round a heading to the nearest 45-degree compass octant.
#[must_use]
pub fn cardinal_direction(heading: f64) -> &'static str {
    // round() sends 337.5..360 to index 8, which wraps back to north
    let index = ((heading / 45.0).round() as usize) % 8;
    CARDINAL_DIRECTIONS[index]
}

/// Sign of an aircraft's vertical rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerticalTrend {
    Climbing,
    Descending,
    Level,
}

/// One historical position sample of a trail.
///
/// The trail endpoint returns full flight records; only the coordinates
/// are consumed here, unknown fields are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrailPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// Aggregate counters from the stats endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightStats {
    pub total_records: u64,
    pub currently_flying: u64,
}

/// Payload broadcast on the update topic.
///
/// The reconciliation path treats the message as an opaque trigger; this
/// type exists for logging and status display.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNotice {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub flight_count: Option<u64>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flight_decodes_backend_json() {
        let json = r#"{
            "icao24": "AB1644",
            "callsign": "UAL123",
            "originCountry": "United States",
            "latitude": 37.62,
            "longitude": -122.38,
            "altitude": 10972.8,
            "velocity": 245.3,
            "heading": 271.5,
            "verticalRate": -2.6,
            "onGround": false,
            "timestamp": "2025-11-04T18:22:31"
        }"#;

        let flight: Flight = serde_json::from_str(json).unwrap();
        assert_eq!(flight.icao24, "AB1644");
        assert_eq!(flight.callsign.as_deref(), Some("UAL123"));
        assert_eq!(flight.origin_country.as_deref(), Some("United States"));
        assert_eq!(flight.heading, Some(271.5));
        assert!(!flight.on_ground);
        assert!(flight.timestamp.is_some());
        assert!(flight.has_position());
    }

    #[test]
    fn test_flight_decodes_with_missing_position() {
        let json = r#"{"icao24": "3C6444", "originCountry": "Germany", "onGround": true}"#;

        let flight: Flight = serde_json::from_str(json).unwrap();
        assert!(flight.latitude.is_none());
        assert!(flight.longitude.is_none());
        assert!(flight.on_ground);
        assert!(!flight.has_position());
    }

    #[test]
    fn test_key_is_lowercase() {
        let flight: Flight = serde_json::from_str(r#"{"icao24": "AB1644"}"#).unwrap();
        assert_eq!(flight.key(), "ab1644");
    }

    #[test]
    fn test_cardinal_direction_octants() {
        assert_eq!(cardinal_direction(0.0), "N");
        assert_eq!(cardinal_direction(45.0), "NE");
        assert_eq!(cardinal_direction(90.0), "E");
        assert_eq!(cardinal_direction(135.0), "SE");
        assert_eq!(cardinal_direction(180.0), "S");
        assert_eq!(cardinal_direction(225.0), "SW");
        assert_eq!(cardinal_direction(270.0), "W");
        assert_eq!(cardinal_direction(315.0), "NW");
    }

    #[test]
    fn test_cardinal_direction_rounds_and_wraps() {
        // 23 rounds up to the NE octant, 22 rounds down to N
        assert_eq!(cardinal_direction(23.0), "NE");
        assert_eq!(cardinal_direction(22.0), "N");
        // 350 rounds to the 360 octant, which wraps back to N
        assert_eq!(cardinal_direction(350.0), "N");
    }

    #[test]
    fn test_vertical_trend_from_sign() {
        let mut flight: Flight = serde_json::from_str(r#"{"icao24": "a"}"#).unwrap();
        assert_eq!(flight.vertical_trend(), None);

        flight.vertical_rate = Some(4.2);
        assert_eq!(flight.vertical_trend(), Some(VerticalTrend::Climbing));
        flight.vertical_rate = Some(-1.0);
        assert_eq!(flight.vertical_trend(), Some(VerticalTrend::Descending));
        flight.vertical_rate = Some(0.0);
        assert_eq!(flight.vertical_trend(), Some(VerticalTrend::Level));
    }

    #[test]
    fn test_stats_and_notice_decode() {
        let stats: FlightStats =
            serde_json::from_str(r#"{"totalRecords": 80021, "currentlyFlying": 6113}"#).unwrap();
        assert_eq!(stats.currently_flying, 6113);

        let notice: UpdateNotice = serde_json::from_str(
            r#"{"type": "FLIGHT_UPDATE", "flightCount": 512, "timestamp": "2025-11-04T18:25:00", "message": "New flight data available"}"#,
        )
        .unwrap();
        assert_eq!(notice.kind, "FLIGHT_UPDATE");
        assert_eq!(notice.flight_count, Some(512));
    }

    #[test]
    fn test_trail_point_ignores_extra_fields() {
        let json = r#"{"icao24": "AB1644", "latitude": 37.6, "longitude": -122.4, "altitude": 9000.0}"#;
        let point: TrailPoint = serde_json::from_str(json).unwrap();
        assert_eq!(point.latitude, 37.6);
        assert_eq!(point.longitude, -122.4);
    }
}
