//! Session script steps for `fusion simulate`

use anyhow::{anyhow, bail, Context};
use fusion_core::input::KeyCode;
use fusion_core::KeyEvent;
use std::str::FromStr;
use std::time::Duration;

/// One scripted interaction
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// A DOM key code, optionally `Shift+` prefixed
    Key(KeyEvent),
    /// Let time pass
    Wait(Duration),
    /// Sleep timer minutes
    Sleep(u32),
    /// Quality index, -1 for auto
    Quality(i32),
    Speed(f64),
    Volume(f64),
    Seek(f64),
    /// Hover the scrubber at a fraction of its width
    Hover(f64),
    PointerEnter,
    PointerMove,
    PointerLeave,
    Click,
    Settings,
    Back,
    /// Flip the elapsed/remaining readout
    TimeDisplay,
}

fn value<T: FromStr>(step: &str, raw: &str) -> anyhow::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.parse().with_context(|| format!("invalid value in step `{}`", step))
}

impl FromStr for Step {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        if let Some((name, raw)) = s.split_once(':') {
            let step = match name {
                "wait" => {
                    let seconds: f64 = value(s, raw)?;
                    if !(seconds.is_finite() && seconds >= 0.0) {
                        bail!("wait must be a non-negative number of seconds: `{}`", s);
                    }
                    Step::Wait(Duration::from_secs_f64(seconds))
                }
                "sleep" => Step::Sleep(value(s, raw)?),
                "quality" if raw == "auto" => Step::Quality(-1),
                "quality" => Step::Quality(value(s, raw)?),
                "speed" => Step::Speed(value(s, raw)?),
                "volume" => Step::Volume(value(s, raw)?),
                "seek" => Step::Seek(value(s, raw)?),
                "hover" => Step::Hover(value(s, raw)?),
                _ => bail!("unknown step `{}`", s),
            };
            return Ok(step);
        }

        let step = match s {
            "enter" => Step::PointerEnter,
            "move" => Step::PointerMove,
            "leave" => Step::PointerLeave,
            "click" => Step::Click,
            "settings" => Step::Settings,
            "back" => Step::Back,
            "time" => Step::TimeDisplay,
            _ => {
                let (code, shift) = match s.strip_prefix("Shift+") {
                    Some(code) => (code, true),
                    None => (s, false),
                };
                KeyCode::from_code(code).ok_or_else(|| anyhow!("unknown step `{}`", s))?;
                let event = if shift { KeyEvent::shifted(code) } else { KeyEvent::new(code) };
                Step::Key(event)
            }
        };
        Ok(step)
    }
}

/// Parse every step, failing on the first bad one
pub fn parse_steps(steps: &[String]) -> anyhow::Result<Vec<Step>> {
    steps.iter().map(|s| s.parse()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keys() {
        assert_eq!("Space".parse::<Step>().unwrap(), Step::Key(KeyEvent::new("Space")));
        assert_eq!("Shift+Period".parse::<Step>().unwrap(), Step::Key(KeyEvent::shifted("Period")));
        assert!("KeyZ".parse::<Step>().is_err());
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!("wait:1.5".parse::<Step>().unwrap(), Step::Wait(Duration::from_millis(1500)));
        assert_eq!("quality:auto".parse::<Step>().unwrap(), Step::Quality(-1));
        assert_eq!("quality:2".parse::<Step>().unwrap(), Step::Quality(2));
        assert_eq!("sleep:10".parse::<Step>().unwrap(), Step::Sleep(10));
        assert_eq!("leave".parse::<Step>().unwrap(), Step::PointerLeave);
        assert_eq!("time".parse::<Step>().unwrap(), Step::TimeDisplay);
        assert!("wait:-1".parse::<Step>().is_err());
        assert!("speed:fast".parse::<Step>().is_err());
    }

    #[test]
    fn test_parse_steps_stops_on_error() {
        let steps = vec!["Space".to_string(), "nope".to_string()];
        assert!(parse_steps(&steps).is_err());
    }
}
