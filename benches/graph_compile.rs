//! Benchmarks for graph compilation and output parsing
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use filterflow_rs::bridge::{encoded_size, parse_tracks};
use filterflow_rs::catalog::FilterCatalog;
use filterflow_rs::graph::{FilterGraph, Handle};
use filterflow_rs::types::{StreamType, Track};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Catalog of `n` filters where `f{i}` may feed `f{i+1}`
fn chain_catalog(n: usize) -> FilterCatalog {
    let entries: Vec<Value> = (0..n)
        .map(|i| {
            let sources: Vec<String> = (i > 0).then(|| format!("f{}", i - 1)).into_iter().collect();
            json!({
                "name": format!("f{}", i),
                "sources": sources,
                "sinks": [format!("f{}", i + 1)],
                "capabilities": { "input": { "stream_type": ["Visual"] } },
            })
        })
        .collect();
    FilterCatalog::from_json(&Value::Array(entries).to_string()).unwrap()
}

/// Chain of `n` filters created in reverse order, so the sort has work to do
fn chain_graph(n: usize) -> FilterGraph {
    let catalog = chain_catalog(n);
    let mut graph = FilterGraph::new();
    let src = graph.add_source("/root/video.mp4");
    graph
        .set_tracks(
            src,
            vec![Track {
                pid: 1,
                stream_type: StreamType::Visual,
                name: "video".into(),
                attributes: BTreeMap::new(),
            }],
        )
        .unwrap();

    let mut ids: Vec<_> = (0..n)
        .rev()
        .map(|i| graph.add_filter(catalog.get(&format!("f{}", i)).unwrap().clone()))
        .collect();
    ids.reverse();
    let visual = Handle::stream(StreamType::Visual);
    graph
        .connect(src, ids[0], Handle::track("video", StreamType::Visual), visual.clone())
        .unwrap();
    for pair in ids.windows(2) {
        graph
            .connect(pair[0], pair[1], visual.clone(), visual.clone())
            .unwrap();
    }
    graph
}

fn bench_compile_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile_chain");

    for size in [10, 100, 1000].iter() {
        let graph = chain_graph(*size);
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(graph.compile("/root/output.mp4").unwrap()))
        });
    }

    group.finish();
}

fn bench_encoded_size(c: &mut Criterion) {
    let args: Vec<String> = (0..256).map(|i| format!("f{}:opt={}", i, i * 7)).collect();

    c.bench_function("encoded_size_256_args", |b| {
        b.iter(|| black_box(encoded_size(black_box(&args))))
    });
}

fn bench_parse_tracks(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_tracks");

    for count in [2, 32, 256].iter() {
        let mut xml = String::from("<GPACInspect>\n");
        for pid in 1..=*count {
            xml.push_str(&format!(
                "  <PIDConfigure PID=\"{}\" StreamType=\"Visual\" CodecID=\"avc\" Width=\"1920\" Height=\"1080\"/>\n",
                pid
            ));
        }
        xml.push_str("</GPACInspect>");

        group.throughput(Throughput::Bytes(xml.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &xml, |b, xml| {
            b.iter(|| black_box(parse_tracks(black_box(xml)).unwrap()))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_compile_chain,
    bench_encoded_size,
    bench_parse_tracks,
);

criterion_main!(benches);
