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

//! Map projection: flight set to GeoJSON features, trails to line features.
//!
//! The map widget itself is an external collaborator behind the narrow
//! [`MapView`] trait; clustering and styling are widget configuration.
//! Each update replaces the widget's data source wholesale, no feature
//! diffing.

use geojson::feature::Id;
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, JsonValue, Value};
use log::info;
use thiserror::Error;

use crate::api::{ApiClient, ApiError};
use crate::model::{Flight, TrailPoint};

/// Errors from trail display.
#[derive(Debug, Error)]
pub enum TrailError {
    /// Fewer than two historical points; nothing to draw.
    #[error("not enough position data to show trail ({count} points)")]
    TooFewPoints { count: usize },

    /// The trail fetch failed.
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Geographic bounding region in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl Bounds {
    fn from_point(longitude: f64, latitude: f64) -> Self {
        Self {
            west: longitude,
            south: latitude,
            east: longitude,
            north: latitude,
        }
    }

    fn extend(&mut self, longitude: f64, latitude: f64) {
        self.west = self.west.min(longitude);
        self.south = self.south.min(latitude);
        self.east = self.east.max(longitude);
        self.north = self.north.max(latitude);
    }

    /// Smallest bounds containing all points; `None` for an empty slice.
    #[must_use]
    pub fn from_points(points: &[TrailPoint]) -> Option<Self> {
        let mut iter = points.iter();
        let first = iter.next()?;
        let mut bounds = Self::from_point(first.longitude, first.latitude);
        for point in iter {
            bounds.extend(point.longitude, point.latitude);
        }
        Some(bounds)
    }
}

/// Narrow interface to the external map widget.
///
/// The pipeline never reaches into widget internals; it pushes data in
/// and lets the widget own clustering, styling, and interaction.
pub trait MapView {
    /// Replace the widget's point-feature source.
    fn set_features(&mut self, features: FeatureCollection);
    /// Replace the current trail line feature.
    fn set_trail(&mut self, trail: Feature);
    /// Remove the trail line feature, if any.
    fn clear_trail(&mut self);
    /// Adjust the view to fit a bounding region.
    fn fit_bounds(&mut self, bounds: Bounds);
}

/// Convert a flight set into a point-feature collection.
///
/// Flights missing either coordinate are excluded from projection (they
/// stay in the store). Property keys match the map widget's contract.
#[must_use]
pub fn flights_to_features(flights: &[Flight]) -> FeatureCollection {
    let features = flights
        .iter()
        .filter(|f| f.has_position())
        .map(flight_to_feature)
        .collect();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

fn flight_to_feature(flight: &Flight) -> Feature {
    // has_position() was checked by the caller
    let longitude = flight.longitude.unwrap_or_default();
    let latitude = flight.latitude.unwrap_or_default();

    let mut properties = JsonObject::new();
    properties.insert("icao24".to_string(), JsonValue::from(flight.icao24.clone()));
    properties.insert("callsign".to_string(), JsonValue::from(flight.callsign.clone()));
    properties.insert(
        "originCountry".to_string(),
        JsonValue::from(flight.origin_country.clone()),
    );
    properties.insert("altitude".to_string(), JsonValue::from(flight.altitude));
    properties.insert("velocity".to_string(), JsonValue::from(flight.velocity));
    properties.insert("heading".to_string(), JsonValue::from(flight.heading));
    properties.insert("onGround".to_string(), JsonValue::from(flight.on_ground));

    Feature {
        bbox: None,
        geometry: Some(Geometry::new(Value::Point(vec![longitude, latitude]))),
        id: Some(Id::String(flight.icao24.clone())),
        properties: Some(properties),
        foreign_members: None,
    }
}

/// Build a trail line feature from an ordered position sequence.
#[must_use]
pub fn trail_to_feature(points: &[TrailPoint]) -> Feature {
    let coordinates = points
        .iter()
        .map(|p| vec![p.longitude, p.latitude])
        .collect();

    Feature {
        bbox: None,
        geometry: Some(Geometry::new(Value::LineString(coordinates))),
        id: None,
        properties: None,
        foreign_members: None,
    }
}

/// Pushes derived views into a [`MapView`].
///
/// Owns the data-merge half of rendering: wholesale feature replacement
/// on every update, and on-demand trail display.
#[derive(Debug)]
pub struct MapProjector<V: MapView> {
    view: V,
}

impl<V: MapView> MapProjector<V> {
    pub fn new(view: V) -> Self {
        Self { view }
    }

    /// Access the underlying view.
    pub fn view(&self) -> &V {
        &self.view
    }

    /// Replace the widget's data source from the (filtered) flight set.
    pub fn update(&mut self, flights: &[Flight]) {
        self.view.set_features(flights_to_features(flights));
    }

    /// Fetch and display the historical trail for one aircraft.
    ///
    /// Fails with [`TrailError::TooFewPoints`] when fewer than two samples
    /// exist; the current trail layer is left untouched in that case.
    pub async fn show_trail(&mut self, api: &ApiClient, icao24: &str) -> Result<usize, TrailError> {
        let points = api.fetch_trail(icao24).await?;
        let count = self.apply_trail(&points)?;
        info!("Showing trail for {} ({} positions)", icao24, count);
        Ok(count)
    }

    /// Apply an already-fetched trail to the view.
    pub fn apply_trail(&mut self, points: &[TrailPoint]) -> Result<usize, TrailError> {
        if points.len() < 2 {
            return Err(TrailError::TooFewPoints {
                count: points.len(),
            });
        }

        self.view.set_trail(trail_to_feature(points));
        if let Some(bounds) = Bounds::from_points(points) {
            self.view.fit_bounds(bounds);
        }
        Ok(points.len())
    }

    /// Remove the trail layer.
    pub fn clear_trail(&mut self) {
        self.view.clear_trail();
    }
}
