//! Thumbnail timeline parsing and seek previews
//!
//! A thumbnail timeline is a WebVTT-like cue sheet mapping playback ranges to
//! preview images, usually regions of a sprite sheet:
//!
//! ```text
//! WEBVTT
//!
//! 00:00.000 --> 00:05.000
//! https://cdn.example.com/sprite.jpg#xywh=0,0,160,90
//! ```
//!
//! Parsing never fails as a whole: malformed cues are dropped and a missing or
//! malformed `#xywh=` fragment means the whole image is the thumbnail.
//!
//! # Example
//!
//! ```rust
//! use fusion_core::thumbnails::ThumbnailTrack;
//!
//! let track = ThumbnailTrack::parse("00:10.000 --> 00:12.000\nhttp://x/img.jpg#xywh=0,0,100,60");
//! let cue = track.cue_at(11.0).unwrap();
//! assert_eq!(cue.image_url, "http://x/img.jpg");
//! assert_eq!(cue.rect.unwrap().w, 100);
//! ```

use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

/// Region of a sprite sheet, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpriteRect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

/// A time range associated with a preview image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cue {
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    /// Image URL, without the media fragment
    pub image_url: String,
    /// Sprite region; `None` shows the whole image
    pub rect: Option<SpriteRect>,
}

impl Cue {
    /// Check if the cue covers the given time (both ends inclusive)
    pub fn contains(&self, time: f64) -> bool {
        time >= self.start && time <= self.end
    }
}

/// Ordered thumbnail cues for one timeline resource
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThumbnailTrack {
    cues: Vec<Cue>,
}

impl ThumbnailTrack {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a timeline, keeping image URLs as written
    pub fn parse(input: &str) -> Self {
        Self::parse_with_base(input, None)
    }

    /// Parse a timeline, resolving relative image URLs against `base`
    pub fn parse_with_base(input: &str, base: Option<&Url>) -> Self {
        let mut cues = Vec::new();
        let mut pending: Option<(f64, f64)> = None;

        for raw in input.lines() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }

            if line.contains("-->") {
                pending = match parse_timing_line(line) {
                    Ok(range) => Some(range),
                    Err(e) => {
                        debug!(line, error = %e, "Skipping malformed cue timing");
                        None
                    }
                };
                continue;
            }

            // Only the first line after a timing line carries the image
            if let Some((start, end)) = pending.take() {
                match parse_image_line(line, base) {
                    Some((image_url, rect)) => cues.push(Cue { start, end, image_url, rect }),
                    None => debug!(line, "Skipping cue with unusable image line"),
                }
            }
        }

        cues.sort_by(|a, b| a.start.total_cmp(&b.start));
        Self { cues }
    }

    pub fn cues(&self) -> &[Cue] {
        &self.cues
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    /// First cue covering `time`
    pub fn cue_at(&self, time: f64) -> Option<&Cue> {
        self.cues.iter().find(|c| c.contains(time))
    }

    /// Hover preview for a pointer `pointer_x` pixels into a scrubber
    /// `track_width` pixels wide.
    ///
    /// The anchor keeps the sprite inside the track: flush left until the
    /// pointer is half a sprite in, centred after that, flush right within half
    /// a sprite of the right edge.
    pub fn preview(&self, pointer_x: f64, track_width: f64, duration: f64) -> SeekPreview {
        let fraction = if track_width > 0.0 {
            (pointer_x / track_width).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let duration = if duration.is_finite() && duration > 0.0 { duration } else { 0.0 };
        let time = fraction * duration;
        let cue = self.cue_at(time);

        let mut left = 0.0;
        let mut translate_x = 0.0;
        if let Some(rect) = cue.and_then(|c| c.rect) {
            let half = f64::from(rect.w) / 2.0;
            if pointer_x >= half {
                translate_x = -50.0;
                left = if duration > 0.0 { time / duration } else { 0.0 };
            }
            if pointer_x >= track_width - half {
                left = 1.0;
                translate_x = -100.0;
            }
        }

        SeekPreview {
            time,
            label: format_time(time),
            image_url: cue.map(|c| c.image_url.clone()),
            rect: cue.and_then(|c| c.rect),
            left,
            translate_x,
        }
    }
}

/// Tooltip shown above the scrubber while hovering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeekPreview {
    /// Hovered time in seconds
    pub time: f64,
    /// Hovered time formatted as `m:ss`
    pub label: String,
    pub image_url: Option<String>,
    pub rect: Option<SpriteRect>,
    /// Anchor as a fraction of the track width
    pub left: f64,
    /// Horizontal translation in percent of the tooltip width
    pub translate_x: f64,
}

/// Parse a timing line: "00:00:05.000 --> 00:00:10.000"
fn parse_timing_line(line: &str) -> Result<(f64, f64)> {
    let (start, rest) = line
        .split_once("-->")
        .ok_or_else(|| Error::InvalidTimestamp(line.to_string()))?;

    let start = parse_timestamp(start.trim())?;
    // Cue settings may follow the end time
    let end = rest
        .split_whitespace()
        .next()
        .ok_or_else(|| Error::InvalidTimestamp(line.to_string()))?;
    let end = parse_timestamp(end)?;

    if end < start {
        return Err(Error::InvalidTimestamp(format!("cue ends before it starts: {}", line)));
    }
    Ok((start, end))
}

/// Parse a timestamp: "H:MM:SS.mmm" or "MM:SS.mmm"
pub fn parse_timestamp(ts: &str) -> Result<f64> {
    let parts: Vec<&str> = ts.split(':').collect();

    let component = |s: &str| -> Result<f64> {
        let value: f64 = s
            .trim()
            .replace(',', ".")
            .parse()
            .map_err(|_| Error::InvalidTimestamp(ts.to_string()))?;
        if value.is_finite() && value >= 0.0 {
            Ok(value)
        } else {
            Err(Error::InvalidTimestamp(ts.to_string()))
        }
    };

    match parts.as_slice() {
        [minutes, seconds] => Ok(component(minutes)? * 60.0 + component(seconds)?),
        [hours, minutes, seconds] => {
            Ok(component(hours)? * 3600.0 + component(minutes)? * 60.0 + component(seconds)?)
        }
        _ => Err(Error::InvalidTimestamp(ts.to_string())),
    }
}

/// Split an image line into URL and optional sprite region
fn parse_image_line(line: &str, base: Option<&Url>) -> Option<(String, Option<SpriteRect>)> {
    let (location, fragment) = match line.split_once('#') {
        Some((location, fragment)) => (location, Some(fragment)),
        None => (line, None),
    };
    if location.is_empty() {
        return None;
    }

    let image_url = match Url::parse(location) {
        Ok(_) => location.to_string(),
        Err(url::ParseError::RelativeUrlWithoutBase) => match base {
            Some(base) => base.join(location).ok()?.to_string(),
            None => location.to_string(),
        },
        Err(_) => return None,
    };

    let rect = fragment
        .and_then(|f| f.strip_prefix("xywh="))
        .and_then(parse_xywh);

    Some((image_url, rect))
}

/// Parse "x,y,w,h" (optionally prefixed with "pixel:")
fn parse_xywh(value: &str) -> Option<SpriteRect> {
    let value = value.strip_prefix("pixel:").unwrap_or(value);
    let numbers: Vec<u32> = value
        .split(',')
        .map(|n| n.trim().parse().ok())
        .collect::<Option<Vec<u32>>>()?;

    match numbers.as_slice() {
        [x, y, w, h] => Some(SpriteRect { x: *x, y: *y, w: *w, h: *h }),
        _ => None,
    }
}

/// Format seconds as `m:ss`
pub fn format_time(seconds: f64) -> String {
    if !seconds.is_finite() {
        return "0:00".to_string();
    }
    let total = seconds.max(0.0).floor() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

/// Where timeline text comes from
#[async_trait]
pub trait TimelineSource: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<String>;
}

/// Fetches timelines over HTTP
#[cfg(feature = "native")]
#[derive(Debug, Clone, Default)]
pub struct HttpTimelineSource {
    client: reqwest::Client,
}

#[cfg(feature = "native")]
impl HttpTimelineSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[cfg(feature = "native")]
#[async_trait]
impl TimelineSource for HttpTimelineSource {
    async fn fetch(&self, url: &Url) -> Result<String> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await?
            .error_for_status()?;
        Ok(response.text().await?)
    }
}

/// Loads timelines, degrading to an empty track on any failure
pub struct ThumbnailLoader;

impl ThumbnailLoader {
    pub async fn load(source: &dyn TimelineSource, url: &Url) -> ThumbnailTrack {
        match source.fetch(url).await {
            Ok(text) => {
                let track = ThumbnailTrack::parse_with_base(&text, Some(url));
                debug!(url = %url, cues = track.len(), "Thumbnail timeline loaded");
                track
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Thumbnail timeline unavailable, previews disabled");
                ThumbnailTrack::empty()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_cue() {
        let track = ThumbnailTrack::parse("00:10.000 --> 00:12.000\nhttp://x/img.jpg#xywh=0,0,100,60");
        assert_eq!(track.len(), 1);
        assert_eq!(
            track.cues()[0],
            Cue {
                start: 10.0,
                end: 12.0,
                image_url: "http://x/img.jpg".to_string(),
                rect: Some(SpriteRect { x: 0, y: 0, w: 100, h: 60 }),
            }
        );
    }

    #[test]
    fn test_parse_full_sheet() {
        let vtt = "WEBVTT\n\n1\n00:00:00.000 --> 00:00:05.000\nhttps://cdn.test/s.jpg#xywh=0,0,160,90\n\n2\n00:00:05.000 --> 00:00:10.000\nhttps://cdn.test/s.jpg#xywh=160,0,160,90\n";
        let track = ThumbnailTrack::parse(vtt);
        assert_eq!(track.len(), 2);
        assert_eq!(track.cues()[1].rect, Some(SpriteRect { x: 160, y: 0, w: 160, h: 90 }));
    }

    #[test]
    fn test_missing_or_malformed_fragment() {
        let vtt = "00:00.000 --> 00:05.000\nhttp://x/a.jpg\n00:05.000 --> 00:10.000\nhttp://x/b.jpg#xywh=1,2,3\n00:10.000 --> 00:15.000\nhttp://x/c.jpg#xywh=a,b,c,d";
        let track = ThumbnailTrack::parse(vtt);
        assert_eq!(track.len(), 3);
        assert!(track.cues().iter().all(|c| c.rect.is_none()));
        assert_eq!(track.cues()[1].image_url, "http://x/b.jpg");
    }

    #[test]
    fn test_pixel_unit_prefix() {
        let track = ThumbnailTrack::parse("00:00.000 --> 00:05.000\nhttp://x/a.jpg#xywh=pixel:10,20,30,40");
        assert_eq!(track.cues()[0].rect, Some(SpriteRect { x: 10, y: 20, w: 30, h: 40 }));
    }

    #[test]
    fn test_relative_urls() {
        let base = Url::parse("https://cdn.test/videos/thumbs.vtt").unwrap();
        let track = ThumbnailTrack::parse_with_base("00:00.000 --> 00:05.000\nsprite.jpg#xywh=0,0,10,10", Some(&base));
        assert_eq!(track.cues()[0].image_url, "https://cdn.test/videos/sprite.jpg");

        let track = ThumbnailTrack::parse("00:00.000 --> 00:05.000\nsprite.jpg");
        assert_eq!(track.cues()[0].image_url, "sprite.jpg");
    }

    #[test]
    fn test_malformed_timing_dropped() {
        let vtt = "00:xx.000 --> 00:05.000\nhttp://x/a.jpg\n00:05.000 --> 00:10.000\nhttp://x/b.jpg\n00:12.000 --> 00:11.000\nhttp://x/c.jpg";
        let track = ThumbnailTrack::parse(vtt);
        assert_eq!(track.len(), 1);
        assert_eq!(track.cues()[0].image_url, "http://x/b.jpg");
    }

    #[test]
    fn test_timing_without_image_dropped() {
        let track = ThumbnailTrack::parse("00:00.000 --> 00:05.000\n00:05.000 --> 00:10.000\nhttp://x/b.jpg");
        assert_eq!(track.len(), 1);
        assert_eq!(track.cues()[0].start, 5.0);
    }

    #[test]
    fn test_cues_sorted_by_start() {
        let vtt = "00:10.000 --> 00:20.000\nhttp://x/b.jpg\n00:00.000 --> 00:10.000\nhttp://x/a.jpg";
        let track = ThumbnailTrack::parse(vtt);
        assert_eq!(track.cues()[0].image_url, "http://x/a.jpg");
    }

    #[test]
    fn test_timestamp_parsing() {
        assert_eq!(parse_timestamp("00:00:05.500").unwrap(), 5.5);
        assert_eq!(parse_timestamp("1:30:00.000").unwrap(), 5400.0);
        assert_eq!(parse_timestamp("05:30.000").unwrap(), 330.0);
        assert!(parse_timestamp("5.0").is_err());
        assert!(parse_timestamp("-1:00.000").is_err());
    }

    #[test]
    fn test_cue_lookup() {
        let track = ThumbnailTrack::parse("00:00.000 --> 00:05.000\nhttp://x/a.jpg\n00:05.000 --> 00:10.000\nhttp://x/b.jpg");
        assert_eq!(track.cue_at(2.0).unwrap().image_url, "http://x/a.jpg");
        // Boundaries are inclusive, first match wins
        assert_eq!(track.cue_at(5.0).unwrap().image_url, "http://x/a.jpg");
        assert!(track.cue_at(11.0).is_none());
    }

    #[test]
    fn test_preview_anchoring() {
        let track = ThumbnailTrack::parse("00:00.000 --> 01:40.000\nhttp://x/a.jpg#xywh=0,0,160,90");

        let near_left = track.preview(40.0, 800.0, 100.0);
        assert_eq!((near_left.left, near_left.translate_x), (0.0, 0.0));

        let middle = track.preview(400.0, 800.0, 100.0);
        assert_eq!(middle.translate_x, -50.0);
        assert_eq!(middle.left, 0.5);
        assert_eq!(middle.label, "0:50");

        let near_right = track.preview(790.0, 800.0, 100.0);
        assert_eq!((near_right.left, near_right.translate_x), (1.0, -100.0));
    }

    #[test]
    fn test_preview_without_cue() {
        let preview = ThumbnailTrack::empty().preview(400.0, 800.0, 60.0);
        assert_eq!(preview.time, 30.0);
        assert!(preview.image_url.is_none());
        assert_eq!(preview.translate_x, 0.0);
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0.0), "0:00");
        assert_eq!(format_time(65.9), "1:05");
        assert_eq!(format_time(3600.0), "60:00");
        assert_eq!(format_time(f64::NAN), "0:00");
    }

    struct FailingSource;

    #[async_trait]
    impl TimelineSource for FailingSource {
        async fn fetch(&self, url: &Url) -> Result<String> {
            Err(Error::TimelineFetch(url.to_string()))
        }
    }

    #[test]
    fn test_loader_degrades_to_empty() {
        let url = Url::parse("https://cdn.test/missing.vtt").unwrap();
        let track = tokio_test::block_on(ThumbnailLoader::load(&FailingSource, &url));
        assert!(track.is_empty());
    }
}
