//! CLI command implementations

use crate::output::{self, OutputFormat};
use crate::script::{self, Step};
use anyhow::Context;
use console::style;
use fusion_core::headless::{EngineProbe, HeadlessBridge, HeadlessEngineFactory, HeadlessMedia};
use fusion_core::input::shortcut_sections;
use fusion_core::thumbnails::{format_time, HttpTimelineSource, TimelineSource};
use fusion_core::{
    Clock, EngineLevel, FusionPlayer, ManualClock, MediaElement, MediaEvent, Overlay, PlayerConfig, PlayerOptions,
    PlayerSnapshot, StreamingEvent, StreamingMode, ThumbnailTrack, TransportState,
};
use std::path::Path;
use std::time::Duration;
use tabled::Tabled;
use tracing::{info, warn};
use url::Url;

/// Scrubber width assumed by `hover:` steps
const SCRUBBER_WIDTH: f64 = 800.0;

/// Granularity of `wait:` steps
const TICK: Duration = Duration::from_millis(250);

#[derive(Tabled)]
struct CueRow {
    #[tabled(rename = "Start")]
    start: String,
    #[tabled(rename = "End")]
    end: String,
    #[tabled(rename = "Image")]
    image: String,
    #[tabled(rename = "Region")]
    region: String,
}

#[derive(Tabled)]
struct ShortcutRow {
    #[tabled(rename = "Section")]
    section: &'static str,
    #[tabled(rename = "Action")]
    action: &'static str,
    #[tabled(rename = "Keys")]
    keys: String,
}

#[derive(Tabled)]
struct FieldRow {
    #[tabled(rename = "Field")]
    field: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

async fn read_timeline(source: &str) -> anyhow::Result<(String, Option<Url>)> {
    match Url::parse(source) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {
            let text = HttpTimelineSource::default()
                .fetch(&url)
                .await
                .with_context(|| format!("fetching timeline {}", url))?;
            Ok((text, Some(url)))
        }
        _ => {
            let path = Path::new(source);
            let text = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading timeline {}", path.display()))?;
            let base = std::fs::canonicalize(path)
                .ok()
                .and_then(|p| Url::from_file_path(p).ok());
            Ok((text, base))
        }
    }
}

/// Parse a thumbnail timeline and print its cues, or the preview at one time
pub async fn timeline(source: &str, at: Option<f64>, width: f64, format: &str) -> anyhow::Result<()> {
    let (text, base) = read_timeline(source).await?;
    let track = ThumbnailTrack::parse_with_base(&text, base.as_ref());
    info!(source, cues = track.len(), "Timeline parsed");

    match at {
        Some(time) => print_preview(&track, time, width, format),
        None => print_cues(&track, format),
    }
    Ok(())
}

fn region(cue: &fusion_core::Cue) -> String {
    cue.rect
        .map(|r| format!("{},{} {}x{}", r.x, r.y, r.w, r.h))
        .unwrap_or_else(|| "full image".to_string())
}

fn print_cues(track: &ThumbnailTrack, format: &str) {
    match OutputFormat::from(format) {
        OutputFormat::Json => println!("{}", output::json(&track.cues())),
        OutputFormat::Table => {
            let rows = track.cues().iter().map(|cue| CueRow {
                start: format_time(cue.start),
                end: format_time(cue.end),
                image: cue.image_url.clone(),
                region: region(cue),
            });
            println!("{}", output::table(rows));
        }
        OutputFormat::Text => {
            println!("{} {}", style("Cues:").bold(), track.len());
            for cue in track.cues() {
                println!(
                    "  {} - {}  {}  {}",
                    format_time(cue.start),
                    format_time(cue.end),
                    cue.image_url,
                    style(region(cue)).dim()
                );
            }
        }
    }
}

fn print_preview(track: &ThumbnailTrack, time: f64, width: f64, format: &str) {
    let duration = track.cues().iter().map(|c| c.end).fold(0.0, f64::max);
    let pointer_x = if duration > 0.0 { time / duration * width } else { 0.0 };
    let preview = track.preview(pointer_x, width, duration);

    match OutputFormat::from(format) {
        OutputFormat::Json => println!("{}", output::json(&preview)),
        OutputFormat::Table | OutputFormat::Text => match track.cue_at(time) {
            Some(cue) => {
                println!("{} {}", style("Time:").bold(), preview.label);
                println!("{} {}", style("Image:").bold(), cue.image_url);
                println!("{} {}", style("Region:").bold(), region(cue));
                println!(
                    "{} left {:.1}%, translateX {}%",
                    style("Anchor:").bold(),
                    preview.left * 100.0,
                    preview.translate_x
                );
            }
            None => println!("{}", style(format!("No cue at {}", format_time(time))).yellow()),
        },
    }
}

/// Print the keyboard shortcut reference
pub fn shortcuts(format: &str) -> anyhow::Result<()> {
    let rows: Vec<ShortcutRow> = shortcut_sections()
        .iter()
        .flat_map(|section| {
            section.shortcuts.iter().map(move |s| ShortcutRow {
                section: section.title,
                action: s.label,
                keys: s.keys.join(" "),
            })
        })
        .collect();

    match OutputFormat::from(format) {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(shortcut_sections())?),
        OutputFormat::Table => println!("{}", output::table(rows)),
        OutputFormat::Text => {
            for section in shortcut_sections() {
                println!("{}", style(section.title).bold().underlined());
                for shortcut in section.shortcuts {
                    println!("  {:<28} {}", shortcut.label, style(shortcut.keys.join(" ")).cyan());
                }
                println!();
            }
        }
    }
    Ok(())
}

fn engine_levels(heights: &[u32]) -> Vec<EngineLevel> {
    heights
        .iter()
        .map(|&height| {
            let width = height * 16 / 9;
            EngineLevel {
                width,
                height,
                bitrate: u64::from(width) * u64::from(height) * 3,
            }
        })
        .collect()
}

/// Let `by` pass on the player clock, feeding time updates as a browser would
fn advance(player: &mut FusionPlayer, media: &HeadlessMedia, clock: &ManualClock, by: Duration) {
    let mut remaining = by;
    while !remaining.is_zero() {
        let tick = remaining.min(TICK);
        remaining -= tick;
        clock.advance(tick);
        media.advance(tick.as_secs_f64());
        player.handle_media_event(MediaEvent::TimeUpdate);
        if media.paused() && player.transport() == TransportState::Playing {
            player.handle_media_event(MediaEvent::Ended);
        }
        player.poll_timers();
    }
}

fn apply(player: &mut FusionPlayer, media: &HeadlessMedia, clock: &ManualClock, step: &Step) {
    let outcome = match step {
        Step::Key(event) => {
            if player.handle_key(event).is_none() {
                warn!(code = %event.code, "Key not handled");
            }
            Ok(())
        }
        Step::Wait(by) => {
            advance(player, media, clock, *by);
            Ok(())
        }
        Step::Sleep(minutes) => {
            player.select_sleep_timer(*minutes);
            Ok(())
        }
        Step::Quality(index) => player.select_quality(*index).map(|_| ()),
        Step::Speed(rate) => player.select_speed(*rate).map(|_| ()),
        Step::Volume(volume) => player.set_volume(*volume).map(|_| ()),
        Step::Seek(seconds) => player.seek(*seconds).map(|_| ()),
        Step::Hover(fraction) => {
            player.hover_scrubber(fraction * SCRUBBER_WIDTH, SCRUBBER_WIDTH);
            Ok(())
        }
        Step::PointerEnter => {
            player.pointer_enter();
            Ok(())
        }
        Step::PointerMove => {
            player.pointer_move();
            Ok(())
        }
        Step::PointerLeave => {
            player.pointer_leave();
            Ok(())
        }
        Step::Click => {
            player.click_surface();
            Ok(())
        }
        Step::Settings => {
            player.toggle_settings();
            Ok(())
        }
        Step::Back => {
            player.overlay_back();
            Ok(())
        }
        Step::TimeDisplay => {
            player.toggle_time_display();
            Ok(())
        }
    };
    if let Err(e) = outcome {
        warn!(?step, error = %e, "Step rejected");
    }
}

fn summary(snapshot: &PlayerSnapshot) -> String {
    let state = match snapshot.transport {
        TransportState::Playing => style("playing").green(),
        TransportState::Paused => style("paused").yellow(),
        TransportState::Idle => style("idle").dim(),
    };
    let overlay = match snapshot.overlay {
        Overlay::None => String::new(),
        panel => format!(" [{:?}]", panel),
    };
    format!(
        "{} {}/{} vol {:.0}% {}x q:{} controls:{}{}",
        state,
        snapshot.time_label,
        format_time(snapshot.playback.duration),
        snapshot.playback.volume * 100.0,
        snapshot.playback.speed,
        snapshot.quality.label,
        if snapshot.controls_visible { "on" } else { "off" },
        overlay
    )
}

fn print_snapshot(snapshot: &PlayerSnapshot, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{}", output::json(snapshot)),
        OutputFormat::Table => {
            let sleep = match snapshot.sleep.minutes {
                0 => "off".to_string(),
                m => format!("{} min", m),
            };
            let rows = vec![
                FieldRow { field: "Transport", value: snapshot.transport.to_string() },
                FieldRow {
                    field: "Position",
                    value: format!(
                        "{} / {} ({:.1}%)",
                        format_time(snapshot.playback.current_time),
                        format_time(snapshot.playback.duration),
                        snapshot.progress_percent
                    ),
                },
                FieldRow { field: "Volume", value: format!("{:.0}%", snapshot.playback.volume * 100.0) },
                FieldRow { field: "Speed", value: format!("{}x", snapshot.playback.speed) },
                FieldRow { field: "Quality", value: snapshot.quality.label.clone() },
                FieldRow { field: "Streaming", value: format!("{:?}", snapshot.streaming) },
                FieldRow { field: "Overlay", value: format!("{:?}", snapshot.overlay) },
                FieldRow { field: "Controls", value: snapshot.controls_visible.to_string() },
                FieldRow { field: "Sleep timer", value: sleep },
                FieldRow { field: "Diagnostics", value: snapshot.diagnostics.len().to_string() },
            ];
            println!("{}", output::table(rows));
        }
        OutputFormat::Text => {
            println!("{} {}", style("Final:").bold(), summary(snapshot));
            for diagnostic in &snapshot.diagnostics {
                println!(
                    "  {} {} {}",
                    style(format!("{}ms", diagnostic.at_ms)).dim(),
                    style(&diagnostic.code).red(),
                    diagnostic.message
                );
            }
        }
    }
}

/// Run a scripted session against headless host implementations
pub fn simulate(
    config: PlayerConfig,
    steps: &[String],
    duration: f64,
    levels: &[u32],
    native: bool,
    format: &str,
) -> anyhow::Result<()> {
    let steps = script::parse_steps(steps)?;
    let format = OutputFormat::from(format);

    let clock = ManualClock::new();
    let media = HeadlessMedia::new(duration);
    let probe = EngineProbe::default();
    let factory = HeadlessEngineFactory::new(probe.clone())
        .with_levels(engine_levels(levels))
        .with_native_hls(native);

    let mut player = FusionPlayer::new(config, clock.clone())?;
    player.mount(Box::new(media.clone()), Box::new(HeadlessBridge::new()));
    let options = PlayerOptions::parse("https://headless.invalid/master.m3u8")?;
    let mode = player.load(options, &factory);
    if mode == StreamingMode::Engine {
        player.handle_engine_event(StreamingEvent::MediaAttached);
        player.handle_engine_event(StreamingEvent::ManifestParsed);
    }
    player.handle_media_event(MediaEvent::LoadedMetadata);
    info!(?mode, steps = steps.len(), "Simulation started");

    for step in &steps {
        apply(&mut player, &media, &clock, step);
        if format == OutputFormat::Text {
            println!(
                "{:>8}  {:<22} {}",
                style(format_time(clock.now().as_secs_f64())).dim(),
                format!("{:?}", step),
                summary(&player.snapshot())
            );
        }
    }

    print_snapshot(&player.snapshot(), format);
    player.teardown();
    info!(
        engines_created = probe.created(),
        engines_destroyed = probe.destroy_calls(),
        position = media.current_time(),
        "Simulation finished"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_levels() {
        let levels = engine_levels(&[1080, 360]);
        assert_eq!(levels[0].width, 1920);
        assert_eq!(levels[1].width, 640);
        assert!(levels[0].bitrate > levels[1].bitrate);
    }

    #[test]
    fn test_advance_fires_idle_timer() {
        let clock = ManualClock::new();
        let media = HeadlessMedia::new(60.0);
        let mut player = FusionPlayer::new(PlayerConfig::default(), clock.clone()).unwrap();
        player.mount(Box::new(media.clone()), Box::new(HeadlessBridge::new()));
        player.handle_media_event(MediaEvent::LoadedMetadata);
        player.play().unwrap();

        advance(&mut player, &media, &clock, Duration::from_secs(6));
        assert!(!player.controls_visible());
        assert_eq!(player.playback().current_time, 6.0);
    }

    #[test]
    fn test_advance_to_end_pauses() {
        let clock = ManualClock::new();
        let media = HeadlessMedia::new(2.0);
        let mut player = FusionPlayer::new(PlayerConfig::default(), clock.clone()).unwrap();
        player.mount(Box::new(media.clone()), Box::new(HeadlessBridge::new()));
        player.handle_media_event(MediaEvent::LoadedMetadata);
        player.play().unwrap();

        advance(&mut player, &media, &clock, Duration::from_secs(3));
        assert_eq!(player.transport(), TransportState::Paused);
        assert_eq!(player.playback().current_time, 2.0);
    }
}
