//! Benchmarks for full pipeline runs.

#![allow(clippy::format_push_string)] // Benchmark setup code, performance not critical

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use lmd_core::{Pipeline, ProcessingOptions};

/// Generate a contract with the given number of articles and sections.
fn generate_contract(articles: usize, sections: usize) -> String {
    let mut md = String::with_capacity(articles * sections * 160);
    md.push_str("---\nparty:\n  legal_name: Acme Corp\nfee: 1500\nitems:\n  - name: Support\n  - name: Hosting\n---\n");

    for i in 0..articles {
        md.push_str(&format!("l. Article heading {i} |art{i}|\n\n"));
        for j in 0..sections {
            md.push_str(&format!(
                "ll. Section {i}.{j}\n\n{{{{party.legal_name}}}} pays {{{{formatDollar(fee)}}}} as set out in |art{i}|.\n\n"
            ));
        }
        md.push_str("{{#items}}- {{name}}\n{{/items}}\n\n");
    }
    md
}

fn bench_process_simple(c: &mut Criterion) {
    let pipeline = Pipeline::new(ProcessingOptions::new()).unwrap();

    c.bench_function("process_simple_document", |b| {
        b.iter(|| pipeline.process("l. Scope\n\nThis agreement applies.\n"));
    });
}

fn bench_process_varying_sizes(c: &mut Criterion) {
    let pipeline = Pipeline::new(ProcessingOptions::new()).unwrap();
    let mut group = c.benchmark_group("process_by_size");

    for (articles, sections) in [(5, 2), (20, 3), (50, 5)] {
        let source = generate_contract(articles, sections);
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("contract", format!("{articles}a_{sections}s")),
            &source,
            |b, source| b.iter(|| pipeline.process(source)),
        );
    }

    group.finish();
}

fn bench_process_with_tracking(c: &mut Criterion) {
    let pipeline = Pipeline::new(ProcessingOptions::new().with_field_tracking(true)).unwrap();
    let source = generate_contract(20, 3);

    c.bench_function("process_with_field_tracking", |b| {
        b.iter(|| pipeline.process(&source));
    });
}

criterion_group!(
    benches,
    bench_process_simple,
    bench_process_varying_sizes,
    bench_process_with_tracking
);
criterion_main!(benches);
