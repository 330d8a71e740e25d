use chrono::{DateTime, TimeZone, Utc};
use enrichment::{EnrichmentError, Enricher};
use lookup_client::{CaptureEvent, Coordinates, Geocoder, LookupClient, LookupError, WeatherProvider};
use photo_store::{PhotoStore, StoreError};
use serial_test::serial;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, Duration};

#[derive(Clone, Default)]
struct FixedGeocoder {
    calls: Arc<AtomicUsize>,
    fail: bool,
}

impl Geocoder for FixedGeocoder {
    async fn reverse_geocode(&self, _coordinates: Coordinates) -> Result<String, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(LookupError::ApiError("geocoder down".into()))
        } else {
            Ok("Paris Cafe".into())
        }
    }
}

#[derive(Clone, Default)]
struct FixedWeather {
    calls: Arc<AtomicUsize>,
    delay: Option<Duration>,
}

impl WeatherProvider for FixedWeather {
    async fn weather_at(
        &self,
        _coordinates: Coordinates,
        _at: DateTime<Utc>,
    ) -> Result<String, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            sleep(delay).await;
        }
        Ok("Overcast, 12°C".into())
    }
}

fn capture(coords: Option<Coordinates>) -> CaptureEvent {
    CaptureEvent {
        image_ref: "file:///camera/IMG_0001.jpg".into(),
        captured_at: Utc.with_ymd_and_hms(2024, 3, 9, 8, 15, 0).unwrap(),
        raw_coordinates: coords,
    }
}

#[tokio::test]
async fn test_full_enrichment() {
    let enricher = Enricher::new(FixedGeocoder::default(), FixedWeather::default());
    let record = enricher
        .enrich(capture(Some(Coordinates::new(48.85, 2.35))))
        .await;
    assert!(!record.id.is_empty());
    assert_eq!(record.uri, "file:///camera/IMG_0001.jpg");
    assert_eq!(record.timestamp, 1_709_972_100_000);
    assert_eq!(record.address.as_deref(), Some("Paris Cafe"));
    assert_eq!(record.weather.as_deref(), Some("Overcast, 12°C"));
}

#[tokio::test]
async fn test_no_coordinates_skips_lookups() {
    let geocoder = FixedGeocoder::default();
    let weather = FixedWeather::default();
    let enricher = Enricher::new(geocoder.clone(), weather.clone());
    let record = enricher.enrich(capture(None)).await;
    assert_eq!(record.coordinates, None);
    assert_eq!(record.address, None);
    assert_eq!(record.weather, None);
    assert_eq!(geocoder.calls.load(Ordering::SeqCst), 0);
    assert_eq!(weather.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_invalid_coordinates_are_dropped() {
    let geocoder = FixedGeocoder::default();
    let enricher = Enricher::new(geocoder.clone(), FixedWeather::default());
    let record = enricher
        .enrich(capture(Some(Coordinates::new(f64::NAN, 2.0))))
        .await;
    assert_eq!(record.coordinates, None);
    assert!(record.has_consistent_enrichment());
    assert_eq!(geocoder.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_partial_enrichment_when_geocoder_fails() {
    let geocoder = FixedGeocoder {
        fail: true,
        ..Default::default()
    };
    let enricher = Enricher::new(geocoder, FixedWeather::default());
    let record = enricher
        .enrich(capture(Some(Coordinates::new(10.0, 10.0))))
        .await;
    assert_eq!(record.address, None);
    assert_eq!(record.weather.as_deref(), Some("Overcast, 12°C"));
}

#[tokio::test(start_paused = true)]
async fn test_slow_weather_times_out() {
    let weather = FixedWeather {
        delay: Some(Duration::from_secs(60)),
        ..Default::default()
    };
    let enricher = Enricher::new(FixedGeocoder::default(), weather)
        .with_timeout(Duration::from_secs(5));
    let record = enricher
        .enrich(capture(Some(Coordinates::new(10.0, 10.0))))
        .await;
    assert_eq!(record.address.as_deref(), Some("Paris Cafe"));
    assert_eq!(record.weather, None);
}

#[tokio::test]
async fn test_generated_ids_are_unique() {
    let enricher = Enricher::new(FixedGeocoder::default(), FixedWeather::default());
    let a = enricher.enrich(capture(None)).await;
    let b = enricher.enrich(capture(None)).await;
    assert_ne!(a.id, b.id);
}

#[tokio::test]
async fn test_capture_adds_to_store() {
    let enricher = Enricher::new(FixedGeocoder::default(), FixedWeather::default());
    let mut store = PhotoStore::in_memory();
    let record = enricher
        .capture(capture(Some(Coordinates::new(1.0, 1.0))), &mut store)
        .await
        .unwrap();
    assert_eq!(store.by_id(&record.id).unwrap(), &record);
}

#[tokio::test]
async fn test_capture_with_reused_id_is_rejected() {
    let enricher = Enricher::new(FixedGeocoder::default(), FixedWeather::default());
    let mut store = PhotoStore::in_memory();
    let record = enricher.enrich_with_id("fixed".into(), capture(None)).await;
    store.create(record.clone()).unwrap();
    store.delete_one("fixed");
    let err = store.create(record).unwrap_err();
    let err = EnrichmentError::from(err);
    assert!(matches!(err, EnrichmentError::StoreError(StoreError::DuplicateId(_))));
}

#[tokio::test]
#[serial]
async fn test_capture_with_mock_lookup_client() {
    std::env::set_var("MOCK_LOOKUP", "1");
    let client = LookupClient::new();
    let enricher = Enricher::new(client.clone(), client);
    let record = enricher
        .enrich(capture(Some(Coordinates::new(35.6762, 139.6503))))
        .await;
    assert_eq!(record.address.as_deref(), Some("Mock Place (35.68, 139.65)"));
    assert_eq!(record.weather.as_deref(), Some("Clear sky, 20°C"));
    std::env::remove_var("MOCK_LOOKUP");
}
