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

//! Region and free-text filtering over the flight set.
//!
//! Filtering is a pure function of `(flights, params)`: region membership
//! first, then the search query. Inputs are never mutated; recompute
//! whenever the store or either parameter changes.

use std::str::FromStr;

use crate::model::Flight;

// Country names follow the upstream data source's origin_country spellings.
const EUROPE: &[&str] = &[
    "Austria",
    "Belgium",
    "Czech Republic",
    "Denmark",
    "Finland",
    "France",
    "Germany",
    "Greece",
    "Hungary",
    "Iceland",
    "Ireland",
    "Italy",
    "Kingdom of the Netherlands",
    "Luxembourg",
    "Norway",
    "Poland",
    "Portugal",
    "Romania",
    "Spain",
    "Sweden",
    "Switzerland",
    "United Kingdom",
];

const AMERICAS: &[&str] = &[
    "Argentina",
    "Bolivia",
    "Brazil",
    "Canada",
    "Chile",
    "Colombia",
    "Ecuador",
    "Mexico",
    "Panama",
    "Peru",
    "United States",
    "Uruguay",
    "Venezuela",
];

const ASIA_PACIFIC: &[&str] = &[
    "Australia",
    "China",
    "Hong Kong",
    "India",
    "Indonesia",
    "Japan",
    "Malaysia",
    "New Zealand",
    "Philippines",
    "Republic of Korea",
    "Singapore",
    "Taiwan",
    "Thailand",
    "Vietnam",
];

/// Continental region buckets with closed country-name membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Region {
    /// No region restriction.
    #[default]
    All,
    Europe,
    Americas,
    /// Asia/Pacific bucket.
    Asia,
}

impl Region {
    /// The country set for this region, or `None` for [`Region::All`].
    #[must_use]
    pub fn countries(self) -> Option<&'static [&'static str]> {
        match self {
            Self::All => None,
            Self::Europe => Some(EUROPE),
            Self::Americas => Some(AMERICAS),
            Self::Asia => Some(ASIA_PACIFIC),
        }
    }

    /// Whether a flight's origin country belongs to this region.
    ///
    /// A missing origin country never matches a non-`All` region.
    #[must_use]
    pub fn matches(self, origin_country: Option<&str>) -> bool {
        match self.countries() {
            None => true,
            Some(countries) => {
                origin_country.is_some_and(|country| countries.contains(&country))
            }
        }
    }
}

impl FromStr for Region {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" => Ok(Self::All),
            "europe" => Ok(Self::Europe),
            "americas" => Ok(Self::Americas),
            "asia" => Ok(Self::Asia),
            other => Err(format!("unknown region: {other}")),
        }
    }
}

/// Ephemeral view parameters: active region plus free-text query.
#[derive(Debug, Clone, Default)]
pub struct FilterParams {
    pub region: Region,
    /// Matched case-insensitively as a substring of callsign or ICAO
    /// address; an empty query matches everything.
    pub query: String,
}

impl FilterParams {
    fn matches_query(&self, flight: &Flight) -> bool {
        if self.query.is_empty() {
            return true;
        }
        let needle = self.query.to_lowercase();
        let callsign_hit = flight
            .callsign
            .as_deref()
            .is_some_and(|c| c.to_lowercase().contains(&needle));
        callsign_hit || flight.icao24.to_lowercase().contains(&needle)
    }

    /// Whether a single flight passes both filters.
    #[must_use]
    pub fn matches(&self, flight: &Flight) -> bool {
        self.region.matches(flight.origin_country.as_deref()) && self.matches_query(flight)
    }
}

/// Derive the filtered view of a flight set.
#[must_use]
pub fn apply(flights: &[Flight], params: &FilterParams) -> Vec<Flight> {
    flights
        .iter()
        .filter(|f| params.matches(f))
        .cloned()
        .collect()
}
