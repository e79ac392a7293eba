//! Thumbnail timeline example
//!
//! Parses a sprite-sheet timeline and prints the hover preview at a few
//! pointer positions along an 800px scrubber.
//!
//! Run with: cargo run -p fusion-core --example thumbnails

use fusion_core::thumbnails::{format_time, ThumbnailTrack};
use url::Url;

fn main() {
    println!("Fusion Core - Thumbnail Timeline Example");
    println!("========================================\n");

    let timeline = r#"WEBVTT

00:00.000 --> 00:05.000
sprites/sheet0.jpg#xywh=0,0,160,90

00:05.000 --> 00:10.000
sprites/sheet0.jpg#xywh=160,0,160,90

00:10.000 --> 00:15.000
sprites/sheet0.jpg#xywh=pixel:320,0,160,90

00:15.000 --> 00:20.000
https://images.example.com/poster.jpg
"#;

    let base = Url::parse("https://cdn.example.com/vod/episode-1/thumbs.vtt").unwrap();
    let track = ThumbnailTrack::parse_with_base(timeline, Some(&base));

    println!("Parsed {} cues:", track.len());
    for cue in track.cues() {
        println!(
            "  {} - {}  {}  {:?}",
            format_time(cue.start),
            format_time(cue.end),
            cue.image_url,
            cue.rect
        );
    }

    println!("\nHover previews (20s duration, 800px track):");
    for pointer_x in [10.0, 200.0, 400.0, 790.0] {
        let preview = track.preview(pointer_x, 800.0, 20.0);
        println!(
            "  x={:>5}  {}  left={:.3}  translateX={}%  image={}",
            pointer_x,
            preview.label,
            preview.left,
            preview.translate_x,
            preview.image_url.as_deref().unwrap_or("-")
        );
    }
}
