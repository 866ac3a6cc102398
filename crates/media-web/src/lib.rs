//! Browser backend for the Parallel Worlds viewer.
//!
//! - [`VideoElementHandle`]: `<video>` elements as engine media handles
//! - [`TimeoutScheduler`] and [`BrowserClock`]: event-loop timing
//! - [`WorldsPlayer`]: session wiring exported to JavaScript

mod element;
mod error;
mod player;
mod timer;

pub use element::{VideoElementHandle, mount_videos};
pub use error::{Result, WebMediaError};
pub use player::WorldsPlayer;
pub use timer::{BrowserClock, TimeoutScheduler};
