//! Keyboard shortcuts.

use crate::api::Command;
use crate::timeline::Direction;

/// Key press as reported by the host, reduced to what the viewer reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    ArrowUp,
    ArrowRight,
    ArrowDown,
    ArrowLeft,
    Space,
    Char(char),
}

impl Key {
    /// Parses a DOM `KeyboardEvent.key` value.
    pub fn from_dom_key(key: &str) -> Option<Self> {
        let key = match key {
            "ArrowUp" => Self::ArrowUp,
            "ArrowRight" => Self::ArrowRight,
            "ArrowDown" => Self::ArrowDown,
            "ArrowLeft" => Self::ArrowLeft,
            " " | "Spacebar" => Self::Space,
            other => {
                let mut chars = other.chars();
                let (Some(ch), None) = (chars.next(), chars.next()) else {
                    return None;
                };
                Self::Char(ch)
            }
        };
        Some(key)
    }
}

/// Maps a key press to a session command.
///
/// Returns `None` while a text field has focus so typing never drives the viewer.
///
/// # Example
/// ```
/// use worlds_engine::input::{Key, command_for_key};
/// use worlds_engine::{Command, Direction};
///
/// assert_eq!(
///     command_for_key(Key::ArrowLeft, false),
///     Some(Command::Navigate(Direction::West))
/// );
/// assert_eq!(command_for_key(Key::Char('m'), true), None);
/// ```
pub fn command_for_key(key: Key, typing: bool) -> Option<Command> {
    if typing {
        return None;
    }
    let command = match key {
        Key::ArrowUp => Command::Navigate(Direction::North),
        Key::ArrowRight => Command::Navigate(Direction::East),
        Key::ArrowDown => Command::Navigate(Direction::South),
        Key::ArrowLeft => Command::Navigate(Direction::West),
        Key::Space => Command::TogglePlayPause,
        Key::Char(ch) => match ch.to_ascii_lowercase() {
            'm' => Command::ToggleMute,
            'v' => Command::CycleViewMode,
            _ => return None,
        },
    };
    Some(command)
}

#[cfg(test)]
mod tests {
    use super::{Key, command_for_key};
    use crate::api::Command;
    use crate::timeline::Direction;

    #[test]
    fn arrows_map_to_compass_directions() {
        let cases = [
            (Key::ArrowUp, Direction::North),
            (Key::ArrowRight, Direction::East),
            (Key::ArrowDown, Direction::South),
            (Key::ArrowLeft, Direction::West),
        ];
        for (key, direction) in cases {
            assert_eq!(command_for_key(key, false), Some(Command::Navigate(direction)));
        }
    }

    #[test]
    fn dom_keys_parse_to_shortcuts() {
        assert_eq!(Key::from_dom_key(" "), Some(Key::Space));
        assert_eq!(Key::from_dom_key("M"), Some(Key::Char('M')));
        assert_eq!(Key::from_dom_key("Escape"), None);
        assert_eq!(
            command_for_key(Key::Char('V'), false),
            Some(Command::CycleViewMode)
        );
    }

    #[test]
    fn unbound_and_typing_keys_are_ignored() {
        assert_eq!(command_for_key(Key::Char('q'), false), None);
        assert_eq!(command_for_key(Key::Space, true), None);
    }
}
