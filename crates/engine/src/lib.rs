//! UI-agnostic timeline navigation and multi-video synchronization engine for
//! the Parallel Worlds viewer.

pub mod api;
pub mod audio;
pub mod config;
pub mod error;
pub mod input;
pub mod media;
pub mod navigation;
pub mod observer;
pub mod scheduler;
pub mod sim;
pub mod sync;
pub mod time;
pub mod timeline;

pub use api::{
    Command, EngineErrorEvent, EngineErrorKind, Event, Session, SessionSnapshot, ViewMode,
};
pub use audio::{MuteBridge, MuteToggle};
pub use config::SessionConfig;
pub use error::{EngineError, Result};
pub use media::{LoadState, MediaEvent, MediaEventKind, MediaHandle, PlayOutcome, ReadyState};
pub use navigation::{MemoryMap, NavigationEvent, Navigator};
pub use sync::{SwitchOptions, SyncOptions, VideoSync, VideoSyncState};
pub use timeline::{
    DECISION_POINT, Direction, TIMELINES, Timeline, TimelineId, TimelineMap, adjacent,
    first_direction_to,
};
