use criterion::{criterion_group, criterion_main, Criterion};
use gallery::{evaluate_at, layout, HeightCache, LayoutConfig, QuerySpec, SortKey};
use chrono::{TimeZone, Utc};
use lookup_client::{Coordinates, PhotoRecord};

fn sample_record(i: u32) -> PhotoRecord {
    PhotoRecord {
        id: i.to_string(),
        uri: format!("file:///photos/{}.jpg", i),
        timestamp: 1_700_000_000_000 + i as i64 * 60_000,
        coordinates: Some(Coordinates::new(45.0, 7.0)),
        address: Some(format!("Street {}, Turin", i % 97)),
        weather: Some(if i % 3 == 0 { "Clear sky, 18°C" } else { "Overcast, 9°C" }.into()),
    }
}

fn records(n: u32) -> Vec<PhotoRecord> {
    (0..n).map(sample_record).collect()
}

fn bench_search_10k(c: &mut Criterion) {
    let recs = records(10_000);
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    let query = QuerySpec {
        search_term: "clear".into(),
        ..Default::default()
    };
    c.bench_function("search_10k", |b| {
        b.iter(|| {
            let _ = evaluate_at(&recs, &query, &now);
        })
    });
}

fn bench_sort_by_location_10k(c: &mut Criterion) {
    let recs = records(10_000);
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    let query = QuerySpec {
        sort_key: SortKey::Location,
        ..Default::default()
    };
    c.bench_function("sort_by_location_10k", |b| {
        b.iter(|| {
            let _ = evaluate_at(&recs, &query, &now);
        })
    });
}

fn bench_layout_10k(c: &mut Criterion) {
    let recs = records(10_000);
    let config = LayoutConfig {
        columns: 3,
        ..Default::default()
    };
    let mut heights = HeightCache::new();
    for r in recs.iter().step_by(2) {
        heights.record_measurement(&r.id, 4000, 3000);
    }
    c.bench_function("layout_10k", |b| {
        b.iter(|| {
            let _ = layout(&recs, &config, &heights).unwrap();
        })
    });
}

criterion_group!(benches, bench_search_10k, bench_sort_by_location_10k, bench_layout_10k);
criterion_main!(benches);
