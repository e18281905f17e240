//! Location collaborators: Google Maps and an offline stand-in.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;

use crate::config::Config;
use crate::error::LocationError;
use crate::services::{LocationService, Place, RouteInfo};

const PLACES_URL: &str = "https://maps.googleapis.com/maps/api/place/textsearch/json";
const DIRECTIONS_URL: &str = "https://maps.googleapis.com/maps/api/directions/json";

/// Search radius around home, in meters. Couriers are in the neighborhood;
/// a match across the city is a bad geocode, not a candidate.
const SEARCH_RADIUS_M: u32 = 5_000;

pub struct GoogleLocationService {
    client: reqwest::Client,
    api_key: SecretString,
    home_lat: f64,
    home_lng: f64,
}

impl GoogleLocationService {
    pub fn from_config(config: &Config) -> Result<Self, LocationError> {
        let api_key = config
            .maps_api_key
            .clone()
            .ok_or_else(|| LocationError::RequestFailed("GOOGLE_MAPS_API_KEY not set".into()))?;
        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            home_lat: config.home_lat,
            home_lng: config.home_lng,
        })
    }
}

#[derive(Deserialize)]
struct PlacesResponse {
    results: Vec<PlaceResult>,
}

#[derive(Deserialize)]
struct PlaceResult {
    name: String,
    formatted_address: String,
    geometry: Geometry,
}

#[derive(Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

#[derive(Deserialize)]
struct DirectionsResponse {
    routes: Vec<DirectionsRoute>,
}

#[derive(Deserialize)]
struct DirectionsRoute {
    legs: Vec<Leg>,
}

#[derive(Deserialize)]
struct Leg {
    distance: TextValue,
    duration: TextValue,
}

#[derive(Deserialize)]
struct TextValue {
    text: String,
}

#[async_trait]
impl LocationService for GoogleLocationService {
    async fn geocode(&self, query: &str) -> Result<Vec<Place>, LocationError> {
        let response = self
            .client
            .get(PLACES_URL)
            .query(&[
                ("query", query),
                ("location", &format!("{},{}", self.home_lat, self.home_lng)),
                ("radius", &SEARCH_RADIUS_M.to_string()),
                ("key", self.api_key.expose_secret()),
            ])
            .send()
            .await
            .map_err(|e| LocationError::RequestFailed(e.to_string()))?;
        let body: PlacesResponse = response
            .json()
            .await
            .map_err(|e| LocationError::RequestFailed(e.to_string()))?;
        debug!(query, results = body.results.len(), "places search");
        if body.results.is_empty() {
            return Err(LocationError::NotFound(query.to_string()));
        }
        Ok(body
            .results
            .into_iter()
            .map(|r| Place {
                name: r.name,
                address: r.formatted_address,
                lat: r.geometry.location.lat,
                lng: r.geometry.location.lng,
            })
            .collect())
    }

    async fn route(&self, place: &Place) -> Result<RouteInfo, LocationError> {
        let response = self
            .client
            .get(DIRECTIONS_URL)
            .query(&[
                ("origin", format!("{},{}", place.lat, place.lng)),
                (
                    "destination",
                    format!("{},{}", self.home_lat, self.home_lng),
                ),
                ("mode", "driving".to_string()),
                ("key", self.api_key.expose_secret().to_string()),
            ])
            .send()
            .await
            .map_err(|e| LocationError::RequestFailed(e.to_string()))?;
        let body: DirectionsResponse = response
            .json()
            .await
            .map_err(|e| LocationError::RequestFailed(e.to_string()))?;
        let leg = body
            .routes
            .into_iter()
            .next()
            .and_then(|r| r.legs.into_iter().next())
            .ok_or(LocationError::NoRoute)?;
        Ok(RouteInfo {
            distance_text: leg.distance.text,
            duration_text: leg.duration.text,
        })
    }
}

/// Offline location collaborator with a few Bengaluru landmarks.
#[derive(Default)]
pub struct StaticLocationService;

const KNOWN_PLACES: &[(&str, &str, f64, f64)] = &[
    (
        "koramangala",
        "Koramangala, Bengaluru, Karnataka",
        12.9352,
        77.6245,
    ),
    (
        "metro station",
        "Jayanagar Metro Station, Bengaluru, Karnataka",
        12.9250,
        77.5938,
    ),
    (
        "forum mall",
        "Forum Mall, Hosur Road, Bengaluru, Karnataka",
        12.9344,
        77.6110,
    ),
    (
        "main gate",
        "Society Main Gate, HSR Layout, Bengaluru, Karnataka",
        12.9121,
        77.6387,
    ),
];

#[async_trait]
impl LocationService for StaticLocationService {
    async fn geocode(&self, query: &str) -> Result<Vec<Place>, LocationError> {
        let lower = query.to_lowercase();
        let matches: Vec<Place> = KNOWN_PLACES
            .iter()
            .filter(|(key, ..)| lower.contains(key))
            .map(|(_, address, lat, lng)| Place {
                name: address.split(',').next().unwrap_or(address).to_string(),
                address: address.to_string(),
                lat: *lat,
                lng: *lng,
            })
            .collect();
        if matches.is_empty() {
            return Err(LocationError::NotFound(query.to_string()));
        }
        Ok(matches)
    }

    async fn route(&self, _place: &Place) -> Result<RouteInfo, LocationError> {
        Ok(RouteInfo {
            distance_text: "1.2 km".into(),
            duration_text: "6 mins".into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_service_matches_known_place() {
        let service = StaticLocationService;
        let places = service.geocode("I am near Koramangala").await.unwrap();
        assert_eq!(places[0].name, "Koramangala");
    }

    #[tokio::test]
    async fn static_service_rejects_unknown_place() {
        let service = StaticLocationService;
        let err = service.geocode("the moon").await.unwrap_err();
        assert!(matches!(err, LocationError::NotFound(_)));
    }
}
