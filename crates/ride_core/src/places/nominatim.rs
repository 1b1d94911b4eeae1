//! Nominatim (OpenStreetMap) search and reverse-geocoding client.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::{blocking::Client, Url};
use serde::Deserialize;

use super::{AddressComponents, PlaceCandidate, PlaceSearchProvider, SearchRegion};
use crate::error::SearchError;
use crate::geo::Coordinate;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(3);
const RESULT_LIMIT: usize = 15;
/// Nominatim's usage policy requires an identifying user agent.
const USER_AGENT: &str = concat!("ride_core/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct NominatimPlaceSearch {
    client: Client,
    endpoint: String,
}

impl NominatimPlaceSearch {
    /// Create a client for the given Nominatim endpoint
    /// (e.g. `https://nominatim.openstreetmap.org`).
    pub fn new(endpoint: &str) -> Result<Self, SearchError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|err| SearchError::Http(format!("failed to build Nominatim client: {err}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    fn search_url(&self, query: &str, region: &SearchRegion) -> Result<Url, SearchError> {
        let mut url = Url::parse(&format!("{}/search", self.endpoint))
            .map_err(|err| SearchError::Http(format!("failed to build Nominatim URL: {err}")))?;
        let bounds = region.bounds();
        // viewbox is x1,y1,x2,y2 = left,top,right,bottom
        let viewbox = format!(
            "{:.6},{:.6},{:.6},{:.6}",
            bounds.lng_min, bounds.lat_max, bounds.lng_max, bounds.lat_min
        );
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("format", "jsonv2")
            .append_pair("addressdetails", "1")
            .append_pair("limit", &RESULT_LIMIT.to_string())
            .append_pair("viewbox", &viewbox)
            .append_pair("bounded", "0");
        Ok(url)
    }

    fn reverse_url(&self, coordinate: Coordinate) -> Result<Url, SearchError> {
        let mut url = Url::parse(&format!("{}/reverse", self.endpoint))
            .map_err(|err| SearchError::Http(format!("failed to build Nominatim URL: {err}")))?;
        url.query_pairs_mut()
            .append_pair("lat", &format!("{:.6}", coordinate.lat))
            .append_pair("lon", &format!("{:.6}", coordinate.lng))
            .append_pair("format", "jsonv2")
            .append_pair("addressdetails", "1");
        Ok(url)
    }

    fn get_json<T: for<'de> Deserialize<'de>>(&self, url: Url) -> Result<T, SearchError> {
        let response = self
            .client
            .get(url)
            .send()
            .and_then(|response| response.error_for_status())
            .map_err(|err| SearchError::Http(err.to_string()))?;
        response
            .json()
            .map_err(|err| SearchError::InvalidResponse(err.to_string()))
    }
}

impl PlaceSearchProvider for NominatimPlaceSearch {
    fn search(
        &self,
        query: &str,
        region: &SearchRegion,
    ) -> Result<Vec<PlaceCandidate>, SearchError> {
        let url = self.search_url(query, region)?;
        let places: Vec<NominatimPlace> = self.get_json(url)?;
        Ok(parse_search_response(places))
    }

    fn reverse_geocode(
        &self,
        coordinate: Coordinate,
    ) -> Result<Option<AddressComponents>, SearchError> {
        let url = self.reverse_url(coordinate)?;
        let reply: NominatimReverse = self.get_json(url)?;
        Ok(parse_reverse_response(reply))
    }
}

#[derive(Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    address: HashMap<String, String>,
}

/// Reverse lookups answer `{"error": ...}` when nothing is found.
#[derive(Deserialize)]
#[serde(untagged)]
enum NominatimReverse {
    Found(NominatimPlace),
    NotFound {
        #[allow(dead_code)]
        error: String,
    },
}

fn first_of(address: &HashMap<String, String>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| address.get(*key).cloned())
}

fn address_components(place: &NominatimPlace) -> AddressComponents {
    let address = &place.address;
    AddressComponents {
        locality: first_of(address, &["city", "town", "village", "municipality"]),
        administrative_area: first_of(address, &["province", "state"]),
        sub_locality: first_of(address, &["suburb", "neighbourhood", "quarter"]),
        thoroughfare: first_of(address, &["road", "pedestrian"]),
        sub_thoroughfare: first_of(address, &["house_number"]),
        title: place.display_name.clone(),
    }
}

fn parse_coordinate(place: &NominatimPlace) -> Result<Coordinate, SearchError> {
    let lat: f64 = place
        .lat
        .parse()
        .map_err(|_| SearchError::InvalidResponse(format!("bad latitude '{}'", place.lat)))?;
    let lng: f64 = place
        .lon
        .parse()
        .map_err(|_| SearchError::InvalidResponse(format!("bad longitude '{}'", place.lon)))?;
    Coordinate::validated(lat, lng).map_err(|err| SearchError::InvalidResponse(err.to_string()))
}

/// Entries with unusable coordinates are logged and left out.
fn parse_search_response(places: Vec<NominatimPlace>) -> Vec<PlaceCandidate> {
    places
        .into_iter()
        .filter_map(|place| {
            let coordinate = match parse_coordinate(&place) {
                Ok(coordinate) => coordinate,
                Err(err) => {
                    log::warn!(
                        "skipping Nominatim result {:?}: {err}",
                        place.display_name.as_deref().unwrap_or("<unnamed>")
                    );
                    return None;
                }
            };
            Some(PlaceCandidate {
                coordinate,
                address: address_components(&place),
                name: place.name.filter(|name| !name.is_empty()),
            })
        })
        .collect()
}

fn parse_reverse_response(reply: NominatimReverse) -> Option<AddressComponents> {
    match reply {
        NominatimReverse::Found(place) => Some(address_components(&place)),
        NominatimReverse::NotFound { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEARCH_BODY: &str = r#"[
        {
            "lat": "41.0256",
            "lon": "28.9742",
            "name": "Galata Kulesi",
            "display_name": "Galata Kulesi, Beyoglu, Istanbul, Turkiye",
            "address": {
                "road": "Galata Kulesi Sokagi",
                "house_number": "8",
                "suburb": "Bereketzade",
                "town": "Beyoglu",
                "province": "Istanbul"
            }
        },
        {
            "lat": "41.0370",
            "lon": "28.9850",
            "name": "",
            "display_name": "Taksim, Beyoglu, Istanbul"
        }
    ]"#;

    #[test]
    fn parse_search_response_maps_addresses() {
        let places: Vec<NominatimPlace> = serde_json::from_str(SEARCH_BODY).expect("json");
        let candidates = parse_search_response(places);

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].name.as_deref(), Some("Galata Kulesi"));
        assert_eq!(candidates[0].coordinate, Coordinate::new(41.0256, 28.9742));
        assert_eq!(candidates[0].address.locality.as_deref(), Some("Beyoglu"));
        assert_eq!(candidates[0].address.administrative_area.as_deref(), Some("Istanbul"));
        assert_eq!(
            candidates[0].address.street_address().as_deref(),
            Some("Bereketzade, Galata Kulesi Sokagi, No. 8")
        );

        assert_eq!(candidates[1].name, None);
        assert_eq!(candidates[1].address.subtitle(), "Taksim, Beyoglu, Istanbul");
    }

    #[test]
    fn parse_search_response_skips_bad_coordinates() {
        let places: Vec<NominatimPlace> = serde_json::from_str(
            r#"[
                { "lat": "north", "lon": "28.9", "display_name": "Nowhere" },
                { "lat": "95.0", "lon": "29.0", "display_name": "Off the map" },
                { "lat": "41.0082", "lon": "28.9784", "name": "Sultanahmet" }
            ]"#,
        )
        .expect("json");
        let candidates = parse_search_response(places);

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].name.as_deref(), Some("Sultanahmet"));
        assert_eq!(candidates[0].coordinate, Coordinate::new(41.0082, 28.9784));
    }

    #[test]
    fn parse_search_response_keeps_empty_list() {
        assert!(parse_search_response(Vec::new()).is_empty());
    }

    #[test]
    fn reverse_not_found_is_none() {
        let reply: NominatimReverse =
            serde_json::from_str(r#"{ "error": "Unable to geocode" }"#).expect("json");
        assert_eq!(parse_reverse_response(reply), None);
    }

    #[test]
    fn reverse_found_yields_components() {
        let reply: NominatimReverse = serde_json::from_str(
            r#"{
                "lat": "41.0",
                "lon": "29.0",
                "address": { "road": "Istiklal Caddesi", "suburb": "Beyoglu" }
            }"#,
        )
        .expect("json");
        let address = parse_reverse_response(reply).expect("address");
        assert_eq!(
            address.street_address().as_deref(),
            Some("Beyoglu, Istiklal Caddesi")
        );
    }

    #[test]
    fn search_url_carries_viewbox_and_limit() {
        let client = NominatimPlaceSearch::new("http://127.0.0.1:9/").expect("client");
        let url = client
            .search_url("Istanbul", &SearchRegion::default())
            .expect("url");
        let rendered = url.as_str();
        assert!(rendered.starts_with("http://127.0.0.1:9/search?q=Istanbul"));
        assert!(rendered.contains("limit=15"));
        assert!(rendered.contains("viewbox=25.000000%2C44.000000%2C45.000000%2C34.000000"));
    }
}
