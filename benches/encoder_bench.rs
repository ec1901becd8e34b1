//! Criterion benchmark untuk staging dan decode tree
//!
//! Run dengan: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use shmui::core::{LocalRegion, SharedBuffer};
use shmui::protocol::decoder;
use shmui::protocol::{px, Color, Div, Element, Node, Prop, StateKind, Writer};
use shmui::{callback, CallbackRegistry};

/// Grid `n` div dengan background kondisional
fn grid(n: usize) -> Element {
    let cell = || {
        Div::new()
            .width(px(32.0))
            .height(px(32.0))
            .radius(px(4.0))
            .background_when(
                StateKind::Hover,
                Color::Rgb([0xff, 0, 0]),
                Some(Color::Rgb([0xcc, 0xcc, 0xcc])),
            )
    };
    Element::new()
        .with(Prop::Gap(px(2.0)))
        .children((0..n).map(|_| cell()))
}

fn bench_staging(c: &mut Criterion) {
    let mut group = c.benchmark_group("staging");

    for n in [1usize, 16, 256] {
        let tree = grid(n);
        group.throughput(Throughput::Bytes(tree.encoded_len() as u64));

        group.bench_function(format!("measure_{n}"), |b| {
            b.iter(|| black_box(&tree).word_count());
        });

        group.bench_function(format!("stage_{n}"), |b| {
            let mut registry = CallbackRegistry::default();
            b.iter(|| {
                let mut w = Writer::with_capacity(0, tree.word_count(), &mut registry);
                tree.write(&mut w, 0).unwrap();
                black_box(w.as_bytes().len())
            });
        });
    }

    group.finish();
}

fn bench_flush(c: &mut Criterion) {
    let mut group = c.benchmark_group("flush");
    let tree = grid(64);
    let region = LocalRegion::new(tree.encoded_len() + 64).unwrap();
    group.throughput(Throughput::Bytes(tree.encoded_len() as u64));

    group.bench_function("stage_and_flush_64", |b| {
        let mut registry = CallbackRegistry::default();
        b.iter(|| {
            let mut w = Writer::with_capacity(0, tree.word_count(), &mut registry);
            tree.write(&mut w, 0).unwrap();
            w.flush(&region).unwrap().commit()
        });
    });

    group.bench_function("event_binding", |b| {
        let mut registry = CallbackRegistry::default();
        let clickable = Div::new().on_click(callback(|_| Ok(())));
        b.iter(|| {
            let mut w = Writer::new(0, &mut registry);
            clickable.write(&mut w, 0).unwrap()
        });
    });

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    let tree = grid(64);
    let region = LocalRegion::new(tree.encoded_len() + 64).unwrap();
    let mut registry = CallbackRegistry::default();
    let mut w = Writer::new(0, &mut registry);
    tree.write(&mut w, 0).unwrap();
    w.flush(&region).unwrap().commit();

    let raw = region.guarded_read(0, tree.encoded_len()).unwrap();
    group.throughput(Throughput::Bytes(raw.len() as u64));

    group.bench_function("decode_words", |b| {
        b.iter(|| decoder::decode_words(black_box(&raw)).unwrap());
    });

    let words = decoder::decode_words(&raw).unwrap();
    group.bench_function("instructions", |b| {
        b.iter(|| decoder::instructions(black_box(&words)).unwrap());
    });

    group.bench_function("check_balance", |b| {
        b.iter(|| decoder::check_balance(black_box(&words)).unwrap());
    });

    group.finish();
}

criterion_group!(benches, bench_staging, bench_flush, bench_decode);
criterion_main!(benches);
