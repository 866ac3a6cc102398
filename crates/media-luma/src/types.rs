use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{LumaError, Result};

/// Output frame shape accepted by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "16:9")]
    Widescreen,
    #[serde(rename = "9:16")]
    Portrait,
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "4:3")]
    Standard,
    #[serde(rename = "3:4")]
    StandardPortrait,
    #[serde(rename = "21:9")]
    Ultrawide,
    #[serde(rename = "9:21")]
    UltrawidePortrait,
}

impl AspectRatio {
    pub const ALL: [Self; 7] = [
        Self::Widescreen,
        Self::Portrait,
        Self::Square,
        Self::Standard,
        Self::StandardPortrait,
        Self::Ultrawide,
        Self::UltrawidePortrait,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Widescreen => "16:9",
            Self::Portrait => "9:16",
            Self::Square => "1:1",
            Self::Standard => "4:3",
            Self::StandardPortrait => "3:4",
            Self::Ultrawide => "21:9",
            Self::UltrawidePortrait => "9:21",
        }
    }
}

impl Display for AspectRatio {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|ratio| ratio.as_str() == value.trim())
            .ok_or_else(|| format!("unsupported aspect ratio: {value}"))
    }
}

/// Start or end frame constraint for a generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Keyframe {
    Image { url: String },
    Generation { id: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyframes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame0: Option<Keyframe>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame1: Option<Keyframe>,
}

/// Body of a generation request.
///
/// # Example
/// ```
/// use media_luma::{AspectRatio, GenerationRequest};
///
/// let request = GenerationRequest::new("a red balloon drifting into the clouds");
/// assert_eq!(request.aspect_ratio, AspectRatio::Widescreen);
/// assert!(!request.loop_video);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub aspect_ratio: AspectRatio,
    #[serde(rename = "loop")]
    pub loop_video: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyframes: Option<Keyframes>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            aspect_ratio: AspectRatio::default(),
            loop_video: false,
            keyframes: None,
        }
    }

    pub fn aspect_ratio(mut self, aspect_ratio: AspectRatio) -> Self {
        self.aspect_ratio = aspect_ratio;
        self
    }

    pub fn looping(mut self, loop_video: bool) -> Self {
        self.loop_video = loop_video;
        self
    }

    pub fn keyframes(mut self, keyframes: Keyframes) -> Self {
        self.keyframes = Some(keyframes);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.prompt.trim().is_empty() {
            return Err(LumaError::MissingPrompt);
        }
        Ok(())
    }
}

/// Lifecycle state reported by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationState {
    Queued,
    Dreaming,
    Completed,
    Failed,
    #[serde(other)]
    Unknown,
}

impl GenerationState {
    /// `completed` and `failed` end polling.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl Display for GenerationState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Queued => "queued",
            Self::Dreaming => "dreaming",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationAssets {
    #[serde(default)]
    pub video: Option<String>,
}

/// Request parameters as echoed back by the service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestEcho {
    pub prompt: String,
    pub aspect_ratio: Option<String>,
    #[serde(rename = "loop")]
    pub loop_video: bool,
}

/// One generation job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Generation {
    pub id: String,
    pub state: GenerationState,
    #[serde(default)]
    pub failure_reason: Option<String>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub assets: Option<GenerationAssets>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub request: Option<RequestEcho>,
}

impl Generation {
    /// URL of the rendered video once the job completed.
    pub fn video_url(&self) -> Option<&str> {
        self.assets.as_ref()?.video.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::{AspectRatio, Generation, GenerationRequest, GenerationState, Keyframe, Keyframes};

    #[test]
    fn request_serializes_loop_and_omits_missing_keyframes() {
        let request = GenerationRequest::new("balloon").aspect_ratio(AspectRatio::Square);

        let json = serde_json::to_value(&request).expect("request should serialize");

        assert_eq!(json["aspect_ratio"], "1:1");
        assert_eq!(json["loop"], false);
        assert!(json.get("keyframes").is_none());
    }

    #[test]
    fn keyframes_are_tagged_by_type() {
        let request = GenerationRequest::new("balloon").keyframes(Keyframes {
            frame0: Some(Keyframe::Image {
                url: "https://cdn.example/start.jpg".to_owned(),
            }),
            frame1: None,
        });

        let json = serde_json::to_value(&request).expect("request should serialize");

        assert_eq!(json["keyframes"]["frame0"]["type"], "image");
        assert!(json["keyframes"].get("frame1").is_none());
    }

    #[test]
    fn unknown_states_decode_without_failing() {
        let generation: Generation =
            serde_json::from_str(r#"{ "id": "g-1", "state": "upscaling", "created_at": "now" }"#)
                .expect("generation should decode");

        assert_eq!(generation.state, GenerationState::Unknown);
        assert!(!generation.state.is_terminal());
        assert_eq!(generation.video_url(), None);
    }

    #[test]
    fn aspect_ratio_parses_its_wire_form() {
        assert_eq!("21:9".parse::<AspectRatio>(), Ok(AspectRatio::Ultrawide));
        assert!("2:1".parse::<AspectRatio>().is_err());
    }
}
