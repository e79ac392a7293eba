//! Player theming - accent color and derived CSS
//!
//! The accent color is the only themeable input of the player. It tints the
//! progress bar fill and is exposed as a CSS custom property so renderers can
//! reuse it for highlights.
//!
//! # Usage
//!
//! ```rust
//! use fusion_core::theme::AccentColor;
//!
//! let accent = AccentColor::from("#9b30ff");
//! assert_eq!(accent.progress_gradient(), "linear-gradient(to right, #9b30ff, #9b30ff)");
//! ```

use serde::{Deserialize, Serialize};

/// Any CSS color string; white when unset
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccentColor(String);

impl AccentColor {
    pub const DEFAULT: &'static str = "#fff";

    pub fn new(color: impl Into<String>) -> Self {
        let color = color.into();
        let trimmed = color.trim();
        if trimmed.is_empty() {
            Self::default()
        } else {
            Self(trimmed.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Solid gradient used as the scrubber fill image
    pub fn progress_gradient(&self) -> String {
        format!("linear-gradient(to right, {}, {})", self.0, self.0)
    }

    /// Inline style for the scrubber at the given progress
    pub fn progress_style(&self, progress_percent: f64) -> ProgressStyle {
        let percent = if progress_percent.is_finite() {
            progress_percent.clamp(0.0, 100.0)
        } else {
            0.0
        };
        ProgressStyle {
            background_size: format!("{}% 100%", percent),
            background_image: self.progress_gradient(),
        }
    }

    /// CSS custom properties scoped to a player container
    pub fn css_variables(&self, selector: &str) -> String {
        format!(
            r#"{} {{
  --fusion-accent: {};
  --fusion-progress-fill: {};
}}"#,
            selector,
            self.0,
            self.progress_gradient(),
        )
    }
}

impl Default for AccentColor {
    fn default() -> Self {
        Self(Self::DEFAULT.to_string())
    }
}

impl From<&str> for AccentColor {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for AccentColor {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl std::fmt::Display for AccentColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Inline style values for the scrubber track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressStyle {
    pub background_size: String,
    pub background_image: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_white() {
        assert_eq!(AccentColor::default().as_str(), "#fff");
        assert_eq!(AccentColor::new("   ").as_str(), "#fff");
    }

    #[test]
    fn test_progress_style() {
        let style = AccentColor::from("red").progress_style(42.5);
        assert_eq!(style.background_size, "42.5% 100%");
        assert_eq!(style.background_image, "linear-gradient(to right, red, red)");

        let style = AccentColor::default().progress_style(f64::NAN);
        assert_eq!(style.background_size, "0% 100%");
    }

    #[test]
    fn test_css_variables() {
        let css = AccentColor::from("rgb(155, 48, 255)").css_variables("[data-fusion-player]");
        assert!(css.starts_with("[data-fusion-player] {"));
        assert!(css.contains("--fusion-accent: rgb(155, 48, 255);"));
    }
}
