use criterion::{black_box, criterion_group, criterion_main, Criterion};

use protopdf::exporter::export_plans;
use protopdf::headers::{merge_headers, HeaderInjectionPolicy};
use protopdf::optimizer::build_optimize_script;
use protopdf::{attachment_filename, fallback_order, Quality, QualityPreset};

// These are the hot per-request and per-intercepted-request paths; the
// browser itself dominates wall time, but the interception callback runs on
// every outbound request of every page and must stay trivial.

fn bench_fallback_order(c: &mut Criterion) {
    c.bench_function("fallback_order", |b| {
        b.iter(|| {
            for quality in [Quality::High, Quality::Normal, Quality::Economy] {
                black_box(fallback_order(black_box(quality)));
            }
        })
    });
}

fn bench_header_policy(c: &mut Criterion) {
    let policy = HeaderInjectionPolicy::bearer(
        "https://fleet.example",
        &["/api/".to_string()],
        "tok-123456",
    )
    .expect("policy");
    let original = vec![
        ("Accept".to_string(), "application/json".to_string()),
        ("Referer".to_string(), "https://fleet.example/protocol-pdf".to_string()),
    ];

    c.bench_function("header_policy_match_and_merge", |b| {
        b.iter(|| {
            if let Some(injected) =
                policy.headers_for(black_box("https://fleet.example/api/checklists/42"))
            {
                black_box(merge_headers(&original, injected));
            }
            black_box(policy.headers_for(black_box("https://cdn.example/logo.png")));
        })
    });
}

fn bench_optimize_script_build(c: &mut Criterion) {
    let preset = QualityPreset::for_quality(Quality::High);
    c.bench_function("build_optimize_script", |b| {
        b.iter(|| {
            black_box(build_optimize_script(
                black_box("img.protocol-photo"),
                preset.image_max_edge_px,
                preset.image_quality,
            ))
        })
    });
}

fn bench_export_plans(c: &mut Criterion) {
    let preset = QualityPreset::for_quality(Quality::Normal);
    c.bench_function("export_plans", |b| {
        b.iter(|| black_box(export_plans(black_box(&preset))))
    });
}

fn bench_attachment_filename(c: &mut Criterion) {
    c.bench_function("attachment_filename", |b| {
        b.iter(|| black_box(attachment_filename(black_box("B 2024/117 weiß"))))
    });
}

criterion_group!(
    benches,
    bench_fallback_order,
    bench_header_policy,
    bench_optimize_script_build,
    bench_export_plans,
    bench_attachment_filename
);
criterion_main!(benches);
