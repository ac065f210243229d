use std::hint::black_box;
use std::sync::Arc;

use confloc::config::{Configuration, MemorySource};
use confloc::{ConfigLocalizer, FormatArg};
use criterion::{criterion_group, criterion_main, Criterion};

const LOCALES: [&str; 6] = ["en", "en-AU", "de", "pt-BR", "zh-Hans", "hi"];

fn localizer(keys: usize) -> (Arc<Configuration>, ConfigLocalizer) {
    let source = MemorySource::new();
    for i in 0..keys {
        for locale in LOCALES {
            source.set(format!("Key{i}:{locale}"), format!("value {i} for {locale} {{0}}"));
        }
    }
    let config = Arc::new(Configuration::builder().add_memory(source).build().unwrap());
    let localizer = ConfigLocalizer::new(config.clone());
    (config, localizer)
}

fn bench_get(c: &mut Criterion) {
    let (_config, loc) = localizer(1_000);
    let exact = loc.with_locale("pt-BR");
    let fallback = loc.with_locale("zh-SG");
    let miss = loc.with_locale("fr-CA");

    c.bench_function("get_exact", |b| b.iter(|| exact.get(black_box("Key500")).unwrap()));
    c.bench_function("get_fallback", |b| b.iter(|| fallback.get(black_box("Key500")).unwrap()));
    c.bench_function("get_missing", |b| b.iter(|| miss.get(black_box("Key500")).unwrap()));
    c.bench_function("format_int", |b| {
        b.iter(|| exact.format(black_box("Key500"), &[FormatArg::Int(42)]).unwrap())
    });
}

fn bench_reload(c: &mut Criterion) {
    let (config, loc) = localizer(1_000);
    c.bench_function("reload_1000_keys", |b| {
        b.iter(|| {
            config.reload().unwrap();
            black_box(loc.snapshot().len())
        })
    });
}

criterion_group!(lookup_benches, bench_get, bench_reload);
criterion_main!(lookup_benches);
