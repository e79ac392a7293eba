//! Fullscreen and picture-in-picture bridge
//!
//! Thin calls into the host's display capabilities. The host's
//! fullscreen-change notification is the source of truth for fullscreen
//! state; toggling only issues the request.

use crate::error::Result;
use tracing::{debug, error};

/// Native display capabilities of the host
pub trait DisplayBridge {
    /// Whether any element is currently fullscreen
    fn fullscreen_active(&self) -> bool;
    /// Request fullscreen on the player container
    fn request_fullscreen(&mut self) -> Result<()>;
    fn exit_fullscreen(&mut self) -> Result<()>;
    /// Whether any element is currently in picture-in-picture
    fn pip_active(&self) -> bool;
    /// Request picture-in-picture for the media element
    fn request_pip(&mut self) -> Result<()>;
    fn exit_pip(&mut self) -> Result<()>;
}

/// What a toggle asked the host to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayRequest {
    Enter,
    Exit,
}

/// Enter fullscreen if nothing is fullscreen, otherwise exit
pub fn toggle_fullscreen(bridge: &mut dyn DisplayBridge) -> Result<DisplayRequest> {
    if bridge.fullscreen_active() {
        bridge.exit_fullscreen()?;
        debug!("Exit fullscreen requested");
        Ok(DisplayRequest::Exit)
    } else {
        bridge.request_fullscreen()?;
        debug!("Fullscreen requested");
        Ok(DisplayRequest::Enter)
    }
}

/// Exit picture-in-picture if active, otherwise request it
pub fn toggle_pip(bridge: &mut dyn DisplayBridge) -> Result<DisplayRequest> {
    let outcome = if bridge.pip_active() {
        bridge.exit_pip().map(|_| DisplayRequest::Exit)
    } else {
        bridge.request_pip().map(|_| DisplayRequest::Enter)
    };
    if let Err(ref e) = outcome {
        error!(error = %e, "Picture-in-picture toggle failed");
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::headless::HeadlessBridge;

    #[test]
    fn test_fullscreen_toggle() {
        let mut bridge = HeadlessBridge::new();
        assert_eq!(toggle_fullscreen(&mut bridge).unwrap(), DisplayRequest::Enter);
        assert!(bridge.fullscreen_active());
        assert_eq!(toggle_fullscreen(&mut bridge).unwrap(), DisplayRequest::Exit);
        assert!(!bridge.fullscreen_active());
    }

    #[test]
    fn test_pip_failure_reported() {
        let mut bridge = HeadlessBridge::new().with_pip_supported(false);
        assert!(matches!(toggle_pip(&mut bridge), Err(Error::PictureInPicture(_))));
        assert!(!bridge.pip_active());
    }
}
