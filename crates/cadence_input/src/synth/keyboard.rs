//! Character map fallbacks for keys nothing handled

use std::sync::Arc;

use cadence_platform::{Key, KeyEvent, KeyFlags, Modifiers};

use crate::stage::InputContext;

/// Replacement key for an unhandled key
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FallbackAction {
    pub key: Key,
    pub modifiers: Modifiers,
}

/// Maps unhandled keys to fallback keys
pub trait KeyCharacterMap: Send + Sync {
    fn fallback_action(&self, key: Key, modifiers: Modifiers) -> Option<FallbackAction>;
}

/// Escape falls back to back, or to home and menu with a modifier
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultKeyCharacterMap;

impl KeyCharacterMap for DefaultKeyCharacterMap {
    fn fallback_action(&self, key: Key, modifiers: Modifiers) -> Option<FallbackAction> {
        if key != Key::Escape {
            return None;
        }
        let key = if modifiers.alt || modifiers.meta {
            Key::SystemHome
        } else if modifiers.ctrl {
            Key::Menu
        } else {
            Key::Back
        };
        Some(FallbackAction { key, modifiers: Modifiers::default() })
    }
}

/// Re-enqueues unhandled keys as their fallback key
pub struct KeyboardSynthesizer {
    map: Arc<dyn KeyCharacterMap>,
}

impl KeyboardSynthesizer {
    pub fn new(map: Arc<dyn KeyCharacterMap>) -> Self {
        Self { map }
    }

    pub fn process(&mut self, event: &KeyEvent, cx: &mut InputContext<'_>) {
        // a fallback is never itself given a fallback
        if event.flags.contains(KeyFlags::FALLBACK) {
            return;
        }
        let Some(action) = self.map.fallback_action(event.key, event.modifiers) else {
            return;
        };
        let fallback = KeyEvent { key: action.key, modifiers: action.modifiers, character: None, ..event.clone() }
            .with_flags(KeyFlags::FALLBACK);
        tracing::debug!(from = ?event.key, to = ?fallback.key, "synthesizing fallback key");
        cx.synthesize(fallback);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Harness;
    use cadence_platform::KeyAction;

    #[test]
    fn test_escape_falls_back_to_back() {
        let mut harness = Harness::new();
        let mut synth = KeyboardSynthesizer::new(Arc::new(DefaultKeyCharacterMap));
        let escape = KeyEvent::new(KeyAction::Down, Key::Escape).at(5);
        synth.process(&escape, &mut harness.cx());

        let keys = harness.take_keys();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].key, Key::Back);
        assert_eq!(keys[0].event_time, 5);
        assert!(keys[0].flags.contains(KeyFlags::FALLBACK));
    }

    #[test]
    fn test_modified_escape() {
        let map = DefaultKeyCharacterMap;
        assert_eq!(map.fallback_action(Key::Escape, Modifiers::CTRL).map(|a| a.key), Some(Key::Menu));
        assert_eq!(map.fallback_action(Key::Escape, Modifiers::META).map(|a| a.key), Some(Key::SystemHome));
        assert_eq!(map.fallback_action(Key::A, Modifiers::default()), None);
    }

    #[test]
    fn test_fallback_keys_are_not_resynthesized() {
        let mut harness = Harness::new();
        let mut synth = KeyboardSynthesizer::new(Arc::new(DefaultKeyCharacterMap));
        let escape = KeyEvent::new(KeyAction::Down, Key::Escape).with_flags(KeyFlags::FALLBACK);
        synth.process(&escape, &mut harness.cx());
        assert!(harness.take_keys().is_empty());
    }
}
