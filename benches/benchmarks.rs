// benches/benchmarks.rs — Performance benchmarks (criterion)
//
// Knowledge text goes through normalization on every start and every
// extraction, and extracted documents can be large:
//   1. Whitespace normalization of document-sized text
//   2. Extraction response parsing
//   3. Avatar catalog de-duplication and paging

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::json;

use avatar_studio::avatars::{AvatarCatalog, AvatarSummary};
use avatar_studio::knowledge::normalize::{normalize_extraction_response, normalize_knowledge_text};
use avatar_studio::session::SessionConfig;

// ─── Helpers ────────────────────────────────────────────────────────────────

/// Roughly `pages` pages of extracted PDF text with ragged whitespace.
fn document_text(pages: usize) -> String {
    let mut text = String::new();
    for page in 0..pages {
        for line in 0..40 {
            text.push_str(&format!(
                "  Page {page}   line {line}:\tQuarterly results were  strong\r\n"
            ));
        }
        text.push_str("\n\n\x0c");
    }
    text
}

fn avatars(n: usize) -> Vec<AvatarSummary> {
    (0..n)
        .map(|i| AvatarSummary {
            // Every fourth entry repeats an earlier id.
            avatar_id: format!("avatar-{}", if i % 4 == 3 { i - 1 } else { i }),
            avatar_name: format!("Avatar {i}"),
            preview_image_url: Some(format!("https://cdn.example/{i}.png")),
            preview_video_url: None,
            gender: None,
        })
        .collect()
}

// ─── Benchmarks ─────────────────────────────────────────────────────────────

fn bench_normalize(c: &mut Criterion) {
    let small = document_text(1);
    let large = document_text(100);

    let mut group = c.benchmark_group("normalize");
    group.bench_function("one_page", |b| {
        b.iter(|| normalize_knowledge_text(black_box(&small)))
    });
    group.bench_function("hundred_pages", |b| {
        b.iter(|| normalize_knowledge_text(black_box(&large)))
    });
    group.bench_function("session_config", |b| {
        b.iter(|| SessionConfig::new(black_box(&large)))
    });
    group.finish();
}

fn bench_extraction_response(c: &mut Criterion) {
    let text = document_text(20);
    let by_field = json!({ "status": "ok", "data": text.clone() });
    let bare = json!(text);
    let unexpected = json!({ "pages": [1, 2, 3] });

    let mut group = c.benchmark_group("extraction_response");
    group.bench_function("field", |b| {
        b.iter(|| normalize_extraction_response(black_box(&by_field)))
    });
    group.bench_function("bare_string", |b| {
        b.iter(|| normalize_extraction_response(black_box(&bare)))
    });
    group.bench_function("unexpected", |b| {
        b.iter(|| normalize_extraction_response(black_box(&unexpected)))
    });
    group.finish();
}

fn bench_catalog(c: &mut Criterion) {
    let list = avatars(1_000);

    c.bench_function("catalog_build_1000", |b| {
        b.iter(|| AvatarCatalog::new(black_box(list.clone())))
    });

    let catalog = AvatarCatalog::new(list);
    c.bench_function("catalog_reveal_pages", |b| {
        b.iter(|| {
            let mut shown = 0;
            let mut pages = 1;
            while catalog.has_more(pages) {
                shown += catalog.page(pages).len();
                pages += 1;
            }
            black_box(shown)
        })
    });
}

criterion_group!(benches, bench_normalize, bench_extraction_response, bench_catalog);
criterion_main!(benches);
