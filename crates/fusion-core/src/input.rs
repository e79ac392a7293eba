//! Keyboard input routing
//!
//! Each player owns one [`InputRouter`]. The host registers a keydown
//! listener on mount ([`InputRouter::subscribe`]) and removes it on teardown;
//! events are translated into [`Action`]s that the player applies.
//!
//! Players on one page share a [`FocusGroup`]. A key pressed while focus is
//! inside a player goes to that player; any other key goes to the group's
//! active member only.

use crate::playback::StepDirection;
use crate::types::{PlayerConfig, PlayerId};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::trace;

/// Keys the player reacts to, named after DOM `KeyboardEvent.code`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyCode {
    Space,
    KeyK,
    KeyJ,
    KeyL,
    KeyM,
    KeyF,
    KeyI,
    ArrowLeft,
    ArrowRight,
    ArrowUp,
    ArrowDown,
    Comma,
    Period,
    Slash,
    Escape,
    Digit(u8),
}

impl KeyCode {
    /// Parse a DOM key code ("Space", "KeyK", "Digit7", ...)
    pub fn from_code(code: &str) -> Option<Self> {
        let key = match code {
            "Space" => KeyCode::Space,
            "KeyK" => KeyCode::KeyK,
            "KeyJ" => KeyCode::KeyJ,
            "KeyL" => KeyCode::KeyL,
            "KeyM" => KeyCode::KeyM,
            "KeyF" => KeyCode::KeyF,
            "KeyI" => KeyCode::KeyI,
            "ArrowLeft" => KeyCode::ArrowLeft,
            "ArrowRight" => KeyCode::ArrowRight,
            "ArrowUp" => KeyCode::ArrowUp,
            "ArrowDown" => KeyCode::ArrowDown,
            "Comma" => KeyCode::Comma,
            "Period" => KeyCode::Period,
            "Slash" => KeyCode::Slash,
            "Escape" => KeyCode::Escape,
            _ => {
                let digit = code.strip_prefix("Digit")?;
                match digit.parse::<u8>() {
                    Ok(d) if d <= 9 => KeyCode::Digit(d),
                    _ => return None,
                }
            }
        };
        Some(key)
    }
}

/// Kind of element that had focus when the key was pressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TargetKind {
    #[default]
    Other,
    TextInput,
    TextArea,
    ContentEditable,
}

impl TargetKind {
    pub fn is_editable(&self) -> bool {
        !matches!(self, TargetKind::Other)
    }
}

/// Focus target of a key event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KeyTarget {
    pub kind: TargetKind,
    /// Player instance containing the focused element, if any
    pub owner: Option<PlayerId>,
}

/// A keydown event as delivered by the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    pub code: String,
    pub shift: bool,
    #[serde(default)]
    pub target: KeyTarget,
}

impl KeyEvent {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            shift: false,
            target: KeyTarget::default(),
        }
    }

    pub fn shifted(code: impl Into<String>) -> Self {
        Self { shift: true, ..Self::new(code) }
    }

    pub fn with_target(mut self, target: KeyTarget) -> Self {
        self.target = target;
        self
    }
}

/// Commands produced by the keyboard
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Action {
    TogglePlay,
    /// Relative seek in seconds
    SeekBy(f64),
    /// Relative volume change
    NudgeVolume(f64),
    ToggleMute,
    ToggleFullscreen,
    TogglePip,
    StepFrame(StepDirection),
    StepSpeed { up: bool },
    /// Seek to `n * 10` percent of the duration
    SeekFraction(u8),
    OpenShortcuts,
    CloseShortcuts,
}

/// A routed key: the action and whether the browser default must be suppressed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dispatch {
    pub action: Action,
    pub prevent_default: bool,
}

#[derive(Debug, Default)]
struct FocusState {
    /// Subscribed members, oldest first
    members: Vec<PlayerId>,
    active: Option<PlayerId>,
}

/// Players sharing one keyboard
#[derive(Debug, Clone, Default)]
pub struct FocusGroup {
    state: Arc<Mutex<FocusState>>,
}

impl FocusGroup {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FocusState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Member that takes keys pressed outside every player
    pub fn active(&self) -> Option<PlayerId> {
        self.lock().active
    }

    fn join(&self, id: PlayerId) {
        let mut state = self.lock();
        if !state.members.contains(&id) {
            state.members.push(id);
        }
        if state.active.is_none() {
            state.active = Some(id);
        }
    }

    /// Leaving hands activity to the newest remaining member
    fn leave(&self, id: PlayerId) {
        let mut state = self.lock();
        state.members.retain(|member| *member != id);
        if state.active == Some(id) {
            state.active = state.members.last().copied();
        }
    }

    fn activate(&self, id: PlayerId) {
        let mut state = self.lock();
        if state.members.contains(&id) && state.active != Some(id) {
            trace!(player = %id, "Player became active");
            state.active = Some(id);
        }
    }
}

/// Per-instance keyboard router
#[derive(Debug, Clone)]
pub struct InputRouter {
    owner: PlayerId,
    subscribed: bool,
    focus: FocusGroup,
    seek_step: f64,
    volume_step: f64,
}

impl InputRouter {
    /// A router in a focus group of its own
    pub fn new(owner: PlayerId, config: &PlayerConfig) -> Self {
        Self {
            owner,
            subscribed: false,
            focus: FocusGroup::new(),
            seek_step: config.seek_step,
            volume_step: config.volume_step,
        }
    }

    /// Move to `group`, keeping the subscription
    pub fn join(&mut self, group: FocusGroup) {
        if self.subscribed {
            self.focus.leave(self.owner);
            group.join(self.owner);
        }
        self.focus = group;
    }

    pub fn focus_group(&self) -> &FocusGroup {
        &self.focus
    }

    /// Start receiving key events
    pub fn subscribe(&mut self) {
        self.subscribed = true;
        self.focus.join(self.owner);
    }

    /// Stop receiving key events
    pub fn unsubscribe(&mut self) {
        if self.subscribed {
            self.focus.leave(self.owner);
        }
        self.subscribed = false;
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    /// Make this router the one that takes unowned keys
    pub fn activate(&self) {
        if self.subscribed {
            self.focus.activate(self.owner);
        }
    }

    pub fn is_active(&self) -> bool {
        self.focus.active() == Some(self.owner)
    }

    /// Whether this router should handle the event at all
    pub fn accepts(&self, event: &KeyEvent) -> bool {
        if !self.subscribed || event.target.kind.is_editable() {
            return false;
        }
        match event.target.owner {
            Some(owner) => owner == self.owner,
            None => self.is_active(),
        }
    }

    /// Translate a key event into an action
    pub fn dispatch(&self, event: &KeyEvent) -> Option<Dispatch> {
        if !self.accepts(event) {
            trace!(code = %event.code, "Key ignored");
            return None;
        }
        let key = KeyCode::from_code(&event.code)?;
        if event.target.owner.is_some() {
            self.activate();
        }

        let (action, prevent_default) = match (key, event.shift) {
            (KeyCode::Space | KeyCode::KeyK, _) => (Action::TogglePlay, true),
            (KeyCode::KeyJ | KeyCode::ArrowLeft, _) => (Action::SeekBy(-self.seek_step), true),
            (KeyCode::KeyL | KeyCode::ArrowRight, _) => (Action::SeekBy(self.seek_step), true),
            (KeyCode::ArrowUp, _) => (Action::NudgeVolume(self.volume_step), true),
            (KeyCode::ArrowDown, _) => (Action::NudgeVolume(-self.volume_step), true),
            (KeyCode::KeyM, _) => (Action::ToggleMute, false),
            (KeyCode::KeyF, _) => (Action::ToggleFullscreen, false),
            (KeyCode::KeyI, _) => (Action::TogglePip, false),
            (KeyCode::Comma, true) => (Action::StepSpeed { up: false }, false),
            (KeyCode::Period, true) => (Action::StepSpeed { up: true }, false),
            (KeyCode::Comma, false) => (Action::StepFrame(StepDirection::Backward), false),
            (KeyCode::Period, false) => (Action::StepFrame(StepDirection::Forward), false),
            (KeyCode::Slash, true) => (Action::OpenShortcuts, false),
            (KeyCode::Slash, false) => return None,
            (KeyCode::Escape, _) => (Action::CloseShortcuts, false),
            (KeyCode::Digit(d), _) => (Action::SeekFraction(d), false),
        };
        Some(Dispatch { action, prevent_default })
    }
}

/// One row of the shortcuts reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Shortcut {
    pub label: &'static str,
    pub keys: &'static [&'static str],
}

/// A titled group of shortcuts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ShortcutSection {
    pub title: &'static str,
    pub shortcuts: &'static [Shortcut],
}

const PLAYBACK: &[Shortcut] = &[
    Shortcut { label: "Play / Pause", keys: &["Space", "K"] },
    Shortcut { label: "Rewind 10 seconds", keys: &["J", "←"] },
    Shortcut { label: "Fast forward 10 seconds", keys: &["L", "→"] },
    Shortcut { label: "Previous frame (paused)", keys: &[","] },
    Shortcut { label: "Next frame (paused)", keys: &["."] },
    Shortcut { label: "Decrease playback rate", keys: &["Shift + ,"] },
    Shortcut { label: "Increase playback rate", keys: &["Shift + ."] },
    Shortcut { label: "Seek to specific point", keys: &["0", "–", "9"] },
];

const AUDIO: &[Shortcut] = &[
    Shortcut { label: "Toggle mute", keys: &["M"] },
    Shortcut { label: "Volume up", keys: &["↑"] },
    Shortcut { label: "Volume down", keys: &["↓"] },
];

const VIEW: &[Shortcut] = &[
    Shortcut { label: "Toggle fullscreen", keys: &["F"] },
    Shortcut { label: "Toggle Picture-in-Picture", keys: &["I"] },
    Shortcut { label: "Show shortcuts", keys: &["Shift + /"] },
    Shortcut { label: "Close dialog / exit", keys: &["Esc"] },
];

/// Shortcuts grouped the way the shortcuts modal shows them
pub fn shortcut_sections() -> &'static [ShortcutSection] {
    const SECTIONS: &[ShortcutSection] = &[
        ShortcutSection { title: "Playback", shortcuts: PLAYBACK },
        ShortcutSection { title: "Audio", shortcuts: AUDIO },
        ShortcutSection { title: "View", shortcuts: VIEW },
    ];
    SECTIONS
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> InputRouter {
        let mut router = InputRouter::new(PlayerId::new(), &PlayerConfig::default());
        router.subscribe();
        router
    }

    fn action(router: &InputRouter, event: KeyEvent) -> Option<Action> {
        router.dispatch(&event).map(|d| d.action)
    }

    #[test]
    fn test_key_codes() {
        assert_eq!(KeyCode::from_code("KeyK"), Some(KeyCode::KeyK));
        assert_eq!(KeyCode::from_code("Digit0"), Some(KeyCode::Digit(0)));
        assert_eq!(KeyCode::from_code("Digit10"), None);
        assert_eq!(KeyCode::from_code("KeyZ"), None);
    }

    #[test]
    fn test_binding_table() {
        let router = router();
        assert_eq!(action(&router, KeyEvent::new("Space")), Some(Action::TogglePlay));
        assert_eq!(action(&router, KeyEvent::new("KeyJ")), Some(Action::SeekBy(-10.0)));
        assert_eq!(action(&router, KeyEvent::new("ArrowRight")), Some(Action::SeekBy(10.0)));
        assert_eq!(action(&router, KeyEvent::new("ArrowUp")), Some(Action::NudgeVolume(0.05)));
        assert_eq!(action(&router, KeyEvent::new("KeyI")), Some(Action::TogglePip));
        assert_eq!(
            action(&router, KeyEvent::new("Comma")),
            Some(Action::StepFrame(StepDirection::Backward))
        );
        assert_eq!(action(&router, KeyEvent::shifted("Period")), Some(Action::StepSpeed { up: true }));
        assert_eq!(action(&router, KeyEvent::new("Digit4")), Some(Action::SeekFraction(4)));
        assert_eq!(action(&router, KeyEvent::shifted("Slash")), Some(Action::OpenShortcuts));
        assert_eq!(action(&router, KeyEvent::new("Slash")), None);
        assert_eq!(action(&router, KeyEvent::new("Escape")), Some(Action::CloseShortcuts));
    }

    #[test]
    fn test_prevent_default() {
        let router = router();
        for code in ["Space", "KeyK", "KeyJ", "KeyL", "ArrowLeft", "ArrowRight", "ArrowUp", "ArrowDown"] {
            assert!(router.dispatch(&KeyEvent::new(code)).unwrap().prevent_default, "{}", code);
        }
        assert!(!router.dispatch(&KeyEvent::new("KeyM")).unwrap().prevent_default);
    }

    #[test]
    fn test_editable_targets_ignored() {
        let router = router();
        for kind in [TargetKind::TextInput, TargetKind::TextArea, TargetKind::ContentEditable] {
            let event = KeyEvent::new("Space").with_target(KeyTarget { kind, owner: None });
            assert!(router.dispatch(&event).is_none());
        }
    }

    #[test]
    fn test_other_instance_ignored() {
        let router = router();
        let event = KeyEvent::new("KeyK").with_target(KeyTarget {
            kind: TargetKind::Other,
            owner: Some(PlayerId::new()),
        });
        assert!(router.dispatch(&event).is_none());

        let own = KeyEvent::new("KeyK").with_target(KeyTarget {
            kind: TargetKind::Other,
            owner: Some(router.owner),
        });
        assert!(router.dispatch(&own).is_some());
    }

    #[test]
    fn test_unowned_key_reaches_one_player() {
        let group = FocusGroup::new();
        let config = PlayerConfig::default();
        let mut a = InputRouter::new(PlayerId::new(), &config);
        let mut b = InputRouter::new(PlayerId::new(), &config);
        a.join(group.clone());
        b.join(group.clone());
        a.subscribe();
        b.subscribe();

        let event = KeyEvent::new("Space");
        assert!(a.dispatch(&event).is_some());
        assert!(b.dispatch(&event).is_none());

        b.activate();
        assert!(a.dispatch(&event).is_none());
        assert!(b.dispatch(&event).is_some());
    }

    #[test]
    fn test_focused_player_becomes_active() {
        let group = FocusGroup::new();
        let config = PlayerConfig::default();
        let mut a = InputRouter::new(PlayerId::new(), &config);
        let mut b = InputRouter::new(PlayerId::new(), &config);
        a.subscribe();
        b.subscribe();
        a.join(group.clone());
        b.join(group.clone());
        assert_eq!(group.active(), Some(a.owner));

        let inside_b = KeyEvent::new("KeyM").with_target(KeyTarget {
            kind: TargetKind::Other,
            owner: Some(b.owner),
        });
        assert!(a.dispatch(&inside_b).is_none());
        assert!(b.dispatch(&inside_b).is_some());
        assert_eq!(group.active(), Some(b.owner));

        b.unsubscribe();
        assert_eq!(group.active(), Some(a.owner));
        assert!(a.dispatch(&KeyEvent::new("KeyM")).is_some());
    }

    #[test]
    fn test_unsubscribed_router_ignores_keys() {
        let mut router = router();
        router.unsubscribe();
        assert!(router.dispatch(&KeyEvent::new("Space")).is_none());
    }

    #[test]
    fn test_shortcut_sections() {
        let titles: Vec<&str> = shortcut_sections().iter().map(|s| s.title).collect();
        assert_eq!(titles, vec!["Playback", "Audio", "View"]);
    }
}
