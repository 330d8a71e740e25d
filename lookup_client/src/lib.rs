//! Photo record model and the geocoding/weather lookup clients.

mod weather_codes;

use chrono::{DateTime, Utc};
use reqwest::header::USER_AGENT;
use serde::{Deserialize, Serialize};
use std::future::Future;
use thiserror::Error;

pub use weather_codes::describe_weather_code;

pub const DEFAULT_GEOCODER_URL: &str = "https://nominatim.openstreetmap.org";
pub const DEFAULT_WEATHER_URL: &str = "https://api.open-meteo.com";
const CLIENT_USER_AGENT: &str = concat!("photojournal/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Coordinates { latitude, longitude }
    }

    /// Finite and inside the WGS84 latitude/longitude ranges.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// One captured photo plus the metadata attached at enrichment time.
///
/// Records are immutable once created; the store only ever adds or removes
/// whole records.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PhotoRecord {
    pub id: String,
    pub uri: String,
    /// Capture instant in milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub coordinates: Option<Coordinates>,
    pub address: Option<String>,
    pub weather: Option<String>,
}

impl PhotoRecord {
    /// A record without location, and therefore without enrichment.
    pub fn unlocated(id: impl Into<String>, uri: impl Into<String>, timestamp: i64) -> Self {
        PhotoRecord {
            id: id.into(),
            uri: uri.into(),
            timestamp,
            coordinates: None,
            address: None,
            weather: None,
        }
    }

    /// Address and weather can only exist when the record has coordinates.
    pub fn has_consistent_enrichment(&self) -> bool {
        self.coordinates.is_some() || (self.address.is_none() && self.weather.is_none())
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp_millis(self.timestamp)
            .unwrap_or_else(|| DateTime::<Utc>::from(std::time::UNIX_EPOCH))
    }

    pub fn is_geotagged(&self) -> bool {
        self.coordinates.map(|c| c.is_valid()).unwrap_or(false)
    }
}

/// Raw capture as delivered by the camera layer.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CaptureEvent {
    pub image_ref: String,
    pub captured_at: DateTime<Utc>,
    pub raw_coordinates: Option<Coordinates>,
}

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("Request Error: {0}")]
    RequestError(String),
    #[error("Lookup API Error: {0}")]
    ApiError(String),
    #[error("Parse Error: {0}")]
    ParseError(String),
    #[error("No data for {0}")]
    NoData(String),
}

/// Resolves coordinates into a human readable place.
pub trait Geocoder {
    fn reverse_geocode(
        &self,
        coordinates: Coordinates,
    ) -> impl Future<Output = Result<String, LookupError>> + Send;
}

/// Summarizes the weather at a place and instant.
pub trait WeatherProvider {
    fn weather_at(
        &self,
        coordinates: Coordinates,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<String, LookupError>> + Send;
}

fn mock_enabled() -> bool {
    std::env::var("MOCK_LOOKUP").is_ok()
}

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    display_name: Option<String>,
    address: Option<ReverseAddress>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReverseAddress {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    hamlet: Option<String>,
    suburb: Option<String>,
    country: Option<String>,
}

impl ReverseResponse {
    fn into_place(self) -> Option<String> {
        if let Some(address) = self.address {
            let locality = address
                .city
                .or(address.town)
                .or(address.village)
                .or(address.hamlet)
                .or(address.suburb);
            match (locality, address.country) {
                (Some(l), Some(c)) => return Some(format!("{}, {}", l, c)),
                (Some(l), None) => return Some(l),
                (None, Some(c)) if self.display_name.is_none() => return Some(c),
                _ => {}
            }
        }
        self.display_name.filter(|n| !n.trim().is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    hourly: Option<HourlySeries>,
}

#[derive(Debug, Deserialize)]
struct HourlySeries {
    time: Vec<String>,
    temperature_2m: Vec<Option<f64>>,
    weather_code: Vec<Option<u8>>,
}

impl HourlySeries {
    fn summary_at(&self, at: DateTime<Utc>) -> Option<String> {
        let hour = at.format("%Y-%m-%dT%H:00").to_string();
        let idx = self.time.iter().position(|t| *t == hour)?;
        let code = self.weather_code.get(idx).copied().flatten();
        let temp = self.temperature_2m.get(idx).copied().flatten();
        match (code, temp) {
            (Some(code), Some(temp)) => {
                Some(format!("{}, {:.0}°C", describe_weather_code(code), temp))
            }
            (Some(code), None) => Some(describe_weather_code(code).to_string()),
            (None, Some(temp)) => Some(format!("{:.0}°C", temp)),
            (None, None) => None,
        }
    }
}

/// HTTP client for the reverse geocoding (Nominatim) and weather
/// (Open-Meteo) services.
///
/// With `MOCK_LOOKUP` set, no request leaves the process and canned values
/// are returned instead.
#[derive(Clone)]
pub struct LookupClient {
    client: reqwest::Client,
    geocoder_url: String,
    weather_url: String,
}

impl Default for LookupClient {
    fn default() -> Self {
        Self::new()
    }
}

impl LookupClient {
    pub fn new() -> Self {
        Self::with_base_urls(DEFAULT_GEOCODER_URL.to_string(), DEFAULT_WEATHER_URL.to_string())
    }

    /// Create a client talking to custom service endpoints. Mainly used for testing.
    pub fn with_base_urls(geocoder_url: String, weather_url: String) -> Self {
        LookupClient {
            client: reqwest::Client::new(),
            geocoder_url: geocoder_url.trim_end_matches('/').to_string(),
            weather_url: weather_url.trim_end_matches('/').to_string(),
        }
    }

    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self)))]
    pub async fn reverse(&self, coordinates: Coordinates) -> Result<String, LookupError> {
        if mock_enabled() {
            return Ok(format!(
                "Mock Place ({:.2}, {:.2})",
                coordinates.latitude, coordinates.longitude
            ));
        }

        let url = format!(
            "{}/reverse?format=jsonv2&lat={}&lon={}",
            self.geocoder_url, coordinates.latitude, coordinates.longitude
        );
        let response = self
            .client
            .get(&url)
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .send()
            .await
            .map_err(|e| LookupError::RequestError(e.to_string()))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(LookupError::ApiError(error_text));
        }

        let body = response
            .json::<ReverseResponse>()
            .await
            .map_err(|e| LookupError::ParseError(e.to_string()))?;
        if let Some(err) = body.error {
            return Err(LookupError::ApiError(err));
        }
        body.into_place().ok_or_else(|| {
            LookupError::NoData(format!("{},{}", coordinates.latitude, coordinates.longitude))
        })
    }

    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self)))]
    pub async fn hourly_weather(
        &self,
        coordinates: Coordinates,
        at: DateTime<Utc>,
    ) -> Result<String, LookupError> {
        if mock_enabled() {
            return Ok("Clear sky, 20°C".to_string());
        }

        let day = at.format("%Y-%m-%d").to_string();
        let url = format!(
            "{}/v1/forecast?latitude={}&longitude={}&hourly=temperature_2m,weather_code&start_date={}&end_date={}&timezone=GMT",
            self.weather_url, coordinates.latitude, coordinates.longitude, day, day
        );
        let response = self
            .client
            .get(&url)
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .send()
            .await
            .map_err(|e| LookupError::RequestError(e.to_string()))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(LookupError::ApiError(error_text));
        }

        let body = response
            .json::<ForecastResponse>()
            .await
            .map_err(|e| LookupError::ParseError(e.to_string()))?;
        body.hourly
            .and_then(|h| h.summary_at(at))
            .ok_or_else(|| LookupError::NoData(at.to_rfc3339()))
    }
}

impl Geocoder for LookupClient {
    async fn reverse_geocode(&self, coordinates: Coordinates) -> Result<String, LookupError> {
        self.reverse(coordinates).await
    }
}

impl WeatherProvider for LookupClient {
    async fn weather_at(
        &self,
        coordinates: Coordinates,
        at: DateTime<Utc>,
    ) -> Result<String, LookupError> {
        self.hourly_weather(coordinates, at).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_coordinates_validity() {
        assert!(Coordinates::new(48.85, 2.35).is_valid());
        assert!(Coordinates::new(-90.0, 180.0).is_valid());
        assert!(!Coordinates::new(91.0, 0.0).is_valid());
        assert!(!Coordinates::new(0.0, -180.5).is_valid());
        assert!(!Coordinates::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_enrichment_requires_coordinates() {
        let mut record = PhotoRecord::unlocated("1", "file:///a.jpg", 0);
        assert!(record.has_consistent_enrichment());
        record.weather = Some("Rain".into());
        assert!(!record.has_consistent_enrichment());
        record.coordinates = Some(Coordinates::new(1.0, 1.0));
        assert!(record.has_consistent_enrichment());
    }

    #[test]
    fn test_record_json_keeps_absent_fields_null() {
        let record = PhotoRecord::unlocated("1", "file:///a.jpg", 1_700_000_000_000);
        let json = serde_json::to_value(&record).unwrap();
        assert!(json["address"].is_null());
        let back: PhotoRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_parse_reverse_response() {
        let json = r#"{
            "display_name": "12, Rue de Rivoli, Paris, France",
            "address": { "road": "Rue de Rivoli", "city": "Paris", "country": "France" }
        }"#;
        let parsed: ReverseResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.into_place().as_deref(), Some("Paris, France"));

        let json = r#"{ "display_name": "Somewhere at sea" }"#;
        let parsed: ReverseResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.into_place().as_deref(), Some("Somewhere at sea"));
    }

    #[test]
    fn test_hourly_summary_picks_capture_hour() {
        let json = r#"{
            "hourly": {
                "time": ["2024-05-01T13:00", "2024-05-01T14:00"],
                "temperature_2m": [18.4, 19.6],
                "weather_code": [3, 61]
            }
        }"#;
        let parsed: ForecastResponse = serde_json::from_str(json).unwrap();
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 14, 25, 0).unwrap();
        assert_eq!(
            parsed.hourly.unwrap().summary_at(at).as_deref(),
            Some("Slight rain, 20°C")
        );
    }

    #[test]
    fn test_hourly_summary_missing_hour() {
        let series = HourlySeries {
            time: vec!["2024-05-01T13:00".into()],
            temperature_2m: vec![Some(10.0)],
            weather_code: vec![None],
        };
        let at = Utc.with_ymd_and_hms(2024, 5, 2, 13, 0, 0).unwrap();
        assert!(series.summary_at(at).is_none());
    }
}
