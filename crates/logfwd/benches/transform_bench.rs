// 🏎️ Transform + decompress benchmarks.
//
// Measures the per-line cost of the compact projection on realistic records, and the
// full read path (gzip → lines → compact) over an in-memory object.

use std::hint::black_box;
use std::io::Write;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use flate2::Compression;
use flate2::write::GzEncoder;
use logfwd::readers::GzipLineReader;
use logfwd::transforms::{CompactLineTransformer, LineTransform};

fn access_log_record(i: usize) -> String {
    serde_json::json!({
        "ClientIP": format!("203.0.113.{}", i % 255),
        "ClientRequestHost": "example.com",
        "ClientRequestMethod": "GET",
        "ClientRequestURI": format!("/assets/app.{i}.js?v=\"quoted\""),
        "ClientCountry": "de",
        "EdgeEndTimestamp": 1_700_000_000_200u64 + i as u64,
        "EdgeResponseBytes": 5120 + i,
        "EdgeResponseStatus": 200,
        "EdgeStartTimestamp": 1_700_000_000_100u64 + i as u64,
        "CacheCacheStatus": "hit",
        "RayID": format!("{i:016x}"),
        "ClientRequestUserAgent": "Mozilla/5.0 (X11; Linux x86_64)",
        "OriginIP": "10.0.0.1",
        "WAFFlags": "0",
        "FirewallMatchesActions": [],
        "RequestHeaders": { "x-forwarded-for": "198.51.100.7" }
    })
    .to_string()
}

fn bench_compact_transform(c: &mut Criterion) {
    let transformer = CompactLineTransformer::default();
    let records: Vec<String> = (0..1000).map(access_log_record).collect();

    let mut group = c.benchmark_group("compact_transform");
    group.throughput(Throughput::Elements(records.len() as u64));
    group.bench_function("1000_records", |b| {
        b.iter(|| {
            for record in &records {
                black_box(transformer.transform(record).unwrap());
            }
        });
    });
    group.finish();
}

fn bench_read_and_transform(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let transformer = CompactLineTransformer::default();

    let mut group = c.benchmark_group("gzip_read_and_transform");
    for line_count in [1_000usize, 10_000] {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        for i in 0..line_count {
            writeln!(encoder, "{}", access_log_record(i)).unwrap();
        }
        let compressed = encoder.finish().unwrap();

        group.throughput(Throughput::Elements(line_count as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(line_count),
            &compressed,
            |b, compressed| {
                b.to_async(&runtime).iter(|| async {
                    let mut reader = GzipLineReader::new(std::io::Cursor::new(compressed.as_slice()));
                    let mut total = 0usize;
                    while let Some(line) = reader.next_line().await.unwrap() {
                        total += transformer.transform(&line).unwrap().len();
                    }
                    black_box(total)
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_compact_transform, bench_read_and_transform);
criterion_main!(benches);
