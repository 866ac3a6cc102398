use std::fmt::{Display, Formatter};
use std::ops::{Index, IndexMut};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Identifier of one of the four parallel timelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimelineId {
    Catch,
    Sky,
    Shared,
    Tangled,
}

impl TimelineId {
    /// All timelines in display order.
    pub const ALL: [Self; 4] = [Self::Catch, Self::Sky, Self::Shared, Self::Tangled];

    /// Number of timelines in the registry.
    pub const COUNT: usize = Self::ALL.len();

    /// Dense index into [`TimelineMap`] storage.
    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Catch => "catch",
            Self::Sky => "sky",
            Self::Shared => "shared",
            Self::Tangled => "tangled",
        }
    }

    /// Returns the static registry entry for this timeline.
    pub fn timeline(self) -> &'static Timeline {
        &TIMELINES[self.index()]
    }

    /// Next timeline in display order, wrapping after the last one.
    ///
    /// # Example
    /// ```
    /// use worlds_engine::TimelineId;
    ///
    /// assert_eq!(TimelineId::Catch.next(), TimelineId::Sky);
    /// assert_eq!(TimelineId::Tangled.next(), TimelineId::Catch);
    /// ```
    pub const fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::COUNT]
    }
}

impl Display for TimelineId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for TimelineId {
    type Err = EngineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|id| id.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| EngineError::UnknownTimeline(value.to_owned()))
    }
}

/// Cardinal navigation direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    /// Canonical resolution order used when searching for a direction.
    pub const ALL: [Self; 4] = [Self::North, Self::East, Self::South, Self::West];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::North => "north",
            Self::East => "east",
            Self::South => "south",
            Self::West => "west",
        }
    }
}

impl Display for Direction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = EngineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value_trimmed = value.trim();
        let direction = match value_trimmed.to_ascii_lowercase().as_str() {
            "north" | "n" | "up" => Self::North,
            "east" | "e" | "right" => Self::East,
            "south" | "s" | "down" => Self::South,
            "west" | "w" | "left" => Self::West,
            _ => return Err(EngineError::UnknownDirection(value.to_owned())),
        };
        Ok(direction)
    }
}

/// Static description of one timeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timeline {
    pub id: TimelineId,
    pub name: &'static str,
    pub description: &'static str,
    pub position: Direction,
    pub color: &'static str,
    pub accent_color: &'static str,
    pub media_url: &'static str,
    pub audio_signature: Option<&'static str>,
    /// Nominal duration in seconds, used until the media reports its own.
    pub duration: f64,
    /// Prompt used when the timeline is regenerated by the video service.
    pub generation_prompt: &'static str,
}

/// The four timelines diverging from the balloon moment, indexed by [`TimelineId::index`].
pub static TIMELINES: [Timeline; 4] = [
    Timeline {
        id: TimelineId::Catch,
        name: "The Catch",
        description: "A stranger reaches out and catches the balloon string just in time",
        position: Direction::North,
        color: "#10B981",
        accent_color: "#34D399",
        media_url: "/videos/catch.mp4",
        audio_signature: Some("/audio/timeline-signatures/catch.mp3"),
        duration: 15.0,
        generation_prompt: "A cinematic shot of a child's red balloon slipping from their hand in a park. \
A kind stranger nearby notices and reaches out, catching the balloon string just in time. \
The child's face lights up with relief and gratitude. Golden hour lighting, soft focus background, 4K quality.",
    },
    Timeline {
        id: TimelineId::Sky,
        name: "Into the Sky",
        description: "The balloon drifts upward, becoming a tiny red dot against the clouds",
        position: Direction::East,
        color: "#3B82F6",
        accent_color: "#60A5FA",
        media_url: "/videos/sky.mp4",
        audio_signature: Some("/audio/timeline-signatures/sky.mp3"),
        duration: 15.0,
        generation_prompt: "A cinematic shot of a child's red balloon slipping from their hand and floating upward \
into a bright blue sky. The balloon becomes smaller and smaller, a tiny red dot against white clouds. \
The child watches with bittersweet wonder. Golden hour lighting, 4K quality.",
    },
    Timeline {
        id: TimelineId::Shared,
        name: "Shared Joy",
        description: "Another child catches the balloon, creating an unexpected friendship",
        position: Direction::South,
        color: "#F59E0B",
        accent_color: "#FBBF24",
        media_url: "/videos/shared.mp4",
        audio_signature: Some("/audio/timeline-signatures/shared.mp3"),
        duration: 15.0,
        generation_prompt: "A cinematic shot of a child's red balloon slipping from their hand in a park. \
Another young child nearby catches the drifting balloon, and the two children share a moment of connection, \
leading to an unexpected friendship forming. Warm, joyful lighting, 4K quality.",
    },
    Timeline {
        id: TimelineId::Tangled,
        name: "Tangled Fate",
        description: "The string catches on a street performer's props, creating chaos",
        position: Direction::West,
        color: "#EC4899",
        accent_color: "#F472B6",
        media_url: "/videos/tangled.mp4",
        audio_signature: Some("/audio/timeline-signatures/tangled.mp3"),
        duration: 15.0,
        generation_prompt: "A cinematic shot of a child's red balloon slipping from their hand. \
The balloon's string catches on a street performer's juggling props, creating a colorful chain reaction of chaos. \
The performer incorporates the balloon into their act as onlookers laugh. Whimsical lighting, 4K quality.",
    },
];

/// The moment every timeline diverges from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecisionPoint {
    pub timestamp: f64,
    pub description: &'static str,
    pub diverging_timelines: [TimelineId; 4],
}

pub const DECISION_POINT: DecisionPoint = DecisionPoint {
    timestamp: 0.0,
    description: "The child's grip loosens on the balloon string...",
    diverging_timelines: TimelineId::ALL,
};

// Rows follow `TimelineId::ALL`, columns follow `Direction::ALL`.
// Literal table; reversing a move is not guaranteed to use the opposite direction.
const ADJACENCY: [[TimelineId; 4]; 4] = {
    use TimelineId::{Catch, Shared, Sky, Tangled};
    [
        [Catch, Sky, Shared, Tangled],
        [Catch, Sky, Tangled, Shared],
        [Catch, Tangled, Shared, Sky],
        [Catch, Shared, Sky, Tangled],
    ]
};

/// Returns the timeline reached from `from` by moving in `direction`.
///
/// # Example
/// ```
/// use worlds_engine::{Direction, TimelineId, adjacent};
///
/// assert_eq!(adjacent(TimelineId::Catch, Direction::East), TimelineId::Sky);
/// assert_eq!(adjacent(TimelineId::Sky, Direction::South), TimelineId::Tangled);
/// ```
pub fn adjacent(from: TimelineId, direction: Direction) -> TimelineId {
    ADJACENCY[from.index()][direction.index()]
}

/// First direction in canonical order that leads from `from` to `to`.
pub fn first_direction_to(from: TimelineId, to: TimelineId) -> Option<Direction> {
    Direction::ALL
        .into_iter()
        .find(|direction| adjacent(from, *direction) == to)
}

/// The direction that maps a timeline onto itself.
pub fn stay_direction(id: TimelineId) -> Direction {
    first_direction_to(id, id).unwrap_or(id.timeline().position)
}

/// Fixed-size storage with one slot per timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineMap<T>([T; 4]);

impl<T> TimelineMap<T> {
    pub fn new(slots: [T; 4]) -> Self {
        Self(slots)
    }

    pub fn from_fn(mut f: impl FnMut(TimelineId) -> T) -> Self {
        Self(TimelineId::ALL.map(&mut f))
    }

    pub fn map<U>(self, mut f: impl FnMut(TimelineId, T) -> U) -> TimelineMap<U> {
        let mut index = 0;
        TimelineMap(self.0.map(|value| {
            let id = TimelineId::ALL[index];
            index += 1;
            f(id, value)
        }))
    }

    pub fn iter(&self) -> impl Iterator<Item = (TimelineId, &T)> {
        TimelineId::ALL.into_iter().zip(self.0.iter())
    }
}

impl<T: Default> Default for TimelineMap<T> {
    fn default() -> Self {
        Self::from_fn(|_| T::default())
    }
}

impl<T> Index<TimelineId> for TimelineMap<T> {
    type Output = T;

    fn index(&self, id: TimelineId) -> &T {
        &self.0[id.index()]
    }
}

impl<T> IndexMut<TimelineId> for TimelineMap<T> {
    fn index_mut(&mut self, id: TimelineId) -> &mut T {
        &mut self.0[id.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::{Direction, TIMELINES, TimelineId, TimelineMap, adjacent, first_direction_to};

    #[test]
    fn registry_is_indexed_by_timeline_id() {
        for id in TimelineId::ALL {
            assert_eq!(id.timeline().id, id);
            assert_eq!(TIMELINES[id.index()].id, id);
        }
    }

    #[test]
    fn every_timeline_has_exactly_one_stay_direction() {
        for id in TimelineId::ALL {
            let stays = Direction::ALL
                .into_iter()
                .filter(|direction| adjacent(id, *direction) == id)
                .count();
            assert_eq!(stays, 1, "{id} must have exactly one self-loop");
        }
    }

    #[test]
    fn non_stay_directions_reach_the_three_other_timelines() {
        for from in TimelineId::ALL {
            let mut reached: Vec<TimelineId> = Direction::ALL
                .into_iter()
                .map(|direction| adjacent(from, direction))
                .filter(|to| *to != from)
                .collect();
            reached.sort();
            let mut expected: Vec<TimelineId> =
                TimelineId::ALL.into_iter().filter(|id| *id != from).collect();
            expected.sort();
            assert_eq!(reached, expected, "targets from {from}");
        }
    }

    #[test]
    fn every_pair_is_reachable_in_one_step() {
        for from in TimelineId::ALL {
            for to in TimelineId::ALL.into_iter().filter(|to| *to != from) {
                let direction = first_direction_to(from, to)
                    .unwrap_or_else(|| panic!("no direction from {from} to {to}"));
                assert_eq!(adjacent(from, direction), to);
            }
        }
    }

    #[test]
    fn literal_table_is_not_forced_into_compass_symmetry() {
        assert_eq!(adjacent(TimelineId::Catch, Direction::East), TimelineId::Sky);
        assert_eq!(adjacent(TimelineId::Sky, Direction::West), TimelineId::Shared);
        assert_eq!(adjacent(TimelineId::Sky, Direction::North), TimelineId::Catch);
    }

    #[test]
    fn identifiers_parse_case_insensitively_and_reject_unknown_names() {
        assert_eq!("Sky".parse::<TimelineId>().expect("valid id"), TimelineId::Sky);
        assert_eq!("w".parse::<Direction>().expect("valid direction"), Direction::West);
        assert!("moon".parse::<TimelineId>().is_err());
        assert!("up-left".parse::<Direction>().is_err());
    }

    #[test]
    fn timeline_map_map_passes_matching_ids() {
        let map = TimelineMap::from_fn(|id| id.index());
        let mapped = map.map(|id, index| (id, index * 10));
        assert_eq!(mapped[TimelineId::Shared], (TimelineId::Shared, 20));
    }
}
