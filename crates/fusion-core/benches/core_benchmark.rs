//! Benchmark tests for fusion-core operations
//!
//! Run with: cargo bench -p fusion-core

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::time::Duration;
use url::Url;

use fusion_core::headless::{HeadlessBridge, HeadlessMedia};
use fusion_core::scheduler::{Scheduler, TimerChannel, ToastKind};
use fusion_core::streaming::{EngineLevel, QualityLadder};
use fusion_core::thumbnails::{format_time, ThumbnailTrack};
use fusion_core::{FusionPlayer, KeyEvent, ManualClock, MediaEvent, PlayerConfig};

// ============================================================================
// Helpers
// ============================================================================

/// A sprite-sheet timeline: one cue every `interval` seconds, 10x10 tiles per sheet
fn generate_timeline(cue_count: usize, interval: u32) -> String {
    let mut out = String::from("WEBVTT\n\n");
    for i in 0..cue_count {
        let start = i as u32 * interval;
        let end = start + interval;
        let tile = i % 100;
        out.push_str(&format!(
            "{:02}:{:02}:{:02}.000 --> {:02}:{:02}:{:02}.000\nsprites/sheet{}.jpg#xywh={},{},160,90\n\n",
            start / 3600,
            (start / 60) % 60,
            start % 60,
            end / 3600,
            (end / 60) % 60,
            end % 60,
            i / 100,
            (tile % 10) * 160,
            (tile / 10) * 90,
        ));
    }
    out
}

// ============================================================================
// Thumbnail Timeline Benchmarks
// ============================================================================

fn bench_timeline_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("Timeline Parsing");
    let base = Url::parse("https://cdn.example.com/vod/thumbs.vtt").unwrap();

    for &count in &[10, 100, 1000, 5000] {
        let timeline = generate_timeline(count, 5);

        group.bench_with_input(BenchmarkId::new("parse", count), &timeline, |b, timeline| {
            b.iter(|| black_box(ThumbnailTrack::parse(black_box(timeline))));
        });

        group.bench_with_input(BenchmarkId::new("parse_with_base", count), &timeline, |b, timeline| {
            b.iter(|| black_box(ThumbnailTrack::parse_with_base(black_box(timeline), Some(&base))));
        });
    }

    group.finish();
}

fn bench_preview_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("Seek Preview");
    let track = ThumbnailTrack::parse(&generate_timeline(1000, 5));
    let duration = 5000.0;

    group.bench_function("cue_at_mid", |b| {
        b.iter(|| black_box(track.cue_at(black_box(2500.0))));
    });

    group.bench_function("preview_right_edge", |b| {
        b.iter(|| black_box(track.preview(black_box(1195.0), 1200.0, duration)));
    });

    group.bench_function("format_time", |b| {
        b.iter(|| black_box(format_time(black_box(3725.4))));
    });

    group.finish();
}

// ============================================================================
// Player Benchmarks
// ============================================================================

fn bench_quality_ladder(c: &mut Criterion) {
    let levels: Vec<EngineLevel> = [240, 360, 480, 720, 1080, 1440, 2160]
        .iter()
        .map(|&height| EngineLevel { width: height * 16 / 9, height, bitrate: u64::from(height) * 4_000 })
        .collect();

    c.bench_function("QualityLadder::from_engine", |b| {
        b.iter(|| black_box(QualityLadder::from_engine(black_box(&levels))));
    });
}

fn bench_scheduler(c: &mut Criterion) {
    c.bench_function("Scheduler reschedule and drain", |b| {
        b.iter(|| {
            let mut scheduler = Scheduler::new();
            for i in 0..100u64 {
                let now = Duration::from_millis(i * 10);
                scheduler.schedule(TimerChannel::IdleHide, now, Duration::from_secs(5));
                scheduler.schedule(TimerChannel::Toast(ToastKind::SeekForward), now, Duration::from_millis(700));
            }
            black_box(scheduler.take_due(Duration::from_secs(10)))
        });
    });
}

fn bench_key_dispatch(c: &mut Criterion) {
    let mut player = FusionPlayer::new(PlayerConfig::default(), ManualClock::new()).unwrap();
    player.mount(Box::new(HeadlessMedia::new(3600.0)), Box::new(HeadlessBridge::new()));
    player.handle_media_event(MediaEvent::LoadedMetadata);

    let keys = [
        KeyEvent::new("KeyL"),
        KeyEvent::new("KeyJ"),
        KeyEvent::new("ArrowUp"),
        KeyEvent::shifted("Period"),
        KeyEvent::new("Digit5"),
    ];

    c.bench_function("FusionPlayer::handle_key", |b| {
        b.iter(|| {
            for key in &keys {
                black_box(player.handle_key(black_box(key)));
            }
        });
    });

    c.bench_function("FusionPlayer::snapshot", |b| {
        b.iter(|| black_box(player.snapshot()));
    });
}

criterion_group!(
    timeline_benches,
    bench_timeline_parsing,
    bench_preview_lookup,
);

criterion_group!(
    player_benches,
    bench_quality_ladder,
    bench_scheduler,
    bench_key_dispatch,
);

criterion_main!(timeline_benches, player_benches);
