//! Enrichment pipeline: turns a raw capture into a stored photo record.

use chrono::{DateTime, Utc};
use lookup_client::{CaptureEvent, Coordinates, Geocoder, LookupError, PhotoRecord, WeatherProvider};
use photo_store::{PhotoStore, StoreError};
use thiserror::Error;
use tokio::time::{timeout, Duration};
use uuid::Uuid;

pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum EnrichmentError {
    #[error("Store Error: {0}")]
    StoreError(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataField {
    Address,
    Weather,
}

/// Result of one collaborator call, addressed to the record it was made for.
#[derive(Debug)]
pub struct LookupResult {
    pub target_id: String,
    pub field: MetadataField,
    pub value: Result<String, LookupError>,
}

/// Applies a lookup result to the record under construction.
///
/// Returns `false` and leaves the record untouched when the result names a
/// different record, the record has no coordinates, the field is already
/// set, or the lookup failed.
pub fn apply_lookup(record: &mut PhotoRecord, result: LookupResult) -> bool {
    if result.target_id != record.id {
        tracing::warn!(
            target_id = %result.target_id,
            record_id = %record.id,
            "discarding lookup result for another record"
        );
        return false;
    }
    if record.coordinates.is_none() {
        return false;
    }
    let slot = match result.field {
        MetadataField::Address => &mut record.address,
        MetadataField::Weather => &mut record.weather,
    };
    if slot.is_some() {
        return false;
    }
    match result.value {
        Ok(value) => {
            *slot = Some(value);
            true
        }
        Err(e) => {
            tracing::warn!(id = %record.id, field = ?result.field, "lookup failed: {}", e);
            false
        }
    }
}

pub struct Enricher<G, W> {
    geocoder: G,
    weather: W,
    lookup_timeout: Duration,
}

impl<G: Geocoder, W: WeatherProvider> Enricher<G, W> {
    pub fn new(geocoder: G, weather: W) -> Self {
        Enricher {
            geocoder,
            weather,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, lookup_timeout: Duration) -> Self {
        self.lookup_timeout = lookup_timeout;
        self
    }

    async fn lookup_address(&self, target_id: &str, coordinates: Coordinates) -> LookupResult {
        let value = match timeout(self.lookup_timeout, self.geocoder.reverse_geocode(coordinates)).await {
            Ok(res) => res,
            Err(_) => Err(LookupError::RequestError(format!(
                "geocoding timed out after {}s",
                self.lookup_timeout.as_secs()
            ))),
        };
        LookupResult {
            target_id: target_id.to_string(),
            field: MetadataField::Address,
            value,
        }
    }

    async fn lookup_weather(
        &self,
        target_id: &str,
        coordinates: Coordinates,
        at: DateTime<Utc>,
    ) -> LookupResult {
        let value = match timeout(self.lookup_timeout, self.weather.weather_at(coordinates, at)).await {
            Ok(res) => res,
            Err(_) => Err(LookupError::RequestError(format!(
                "weather lookup timed out after {}s",
                self.lookup_timeout.as_secs()
            ))),
        };
        LookupResult {
            target_id: target_id.to_string(),
            field: MetadataField::Weather,
            value,
        }
    }

    /// Builds a record with a freshly generated id.
    pub async fn enrich(&self, event: CaptureEvent) -> PhotoRecord {
        self.enrich_with_id(Uuid::new_v4().to_string(), event).await
    }

    /// Builds a record for `id`. Lookups run once, concurrently; a failed
    /// lookup leaves only its own field unset.
    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self)))]
    pub async fn enrich_with_id(&self, id: String, event: CaptureEvent) -> PhotoRecord {
        let coordinates = match event.raw_coordinates {
            Some(c) if c.is_valid() => Some(c),
            Some(c) => {
                tracing::warn!(id = %id, ?c, "ignoring invalid capture coordinates");
                None
            }
            None => None,
        };
        let mut record = PhotoRecord {
            id,
            uri: event.image_ref,
            timestamp: event.captured_at.timestamp_millis(),
            coordinates,
            address: None,
            weather: None,
        };

        let Some(coordinates) = coordinates else {
            tracing::debug!(id = %record.id, "no location, skipping enrichment");
            return record;
        };

        let (address, weather) = tokio::join!(
            self.lookup_address(&record.id, coordinates),
            self.lookup_weather(&record.id, coordinates, event.captured_at),
        );
        let got_address = apply_lookup(&mut record, address);
        let got_weather = apply_lookup(&mut record, weather);
        tracing::info!(
            id = %record.id,
            address = got_address,
            weather = got_weather,
            "photo enriched"
        );
        record
    }

    /// Enriches the capture and adds the result to `store`.
    pub async fn capture(
        &self,
        event: CaptureEvent,
        store: &mut PhotoStore,
    ) -> Result<PhotoRecord, EnrichmentError> {
        let record = self.enrich(event).await;
        store.create(record.clone())?;
        Ok(record)
    }
}
