mod client;
mod error;
mod poll;
mod types;

pub use client::{
    API_BASE_ENV, API_KEY_ENV, DEFAULT_API_BASE, HttpMethod, HttpRequest, HttpResponse,
    LumaClient, LumaConfig, Transport, UreqTransport,
};
pub use error::{LumaError, Result};
pub use poll::{PollPolicy, wait_for_generation};
pub use types::{
    AspectRatio, Generation, GenerationAssets, GenerationRequest, GenerationState, Keyframe,
    Keyframes, RequestEcho,
};
