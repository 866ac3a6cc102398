use std::fmt::{Debug, Formatter};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{LumaError, Result};
use crate::types::{Generation, GenerationRequest};

pub const DEFAULT_API_BASE: &str = "https://api.lumalabs.ai/dream-machine/v1";
pub const API_KEY_ENV: &str = "LUMA_API_KEY";
pub const API_BASE_ENV: &str = "LUMA_API_BASE";

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Connection settings for the generation service.
#[derive(Clone)]
pub struct LumaConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

impl LumaConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Self::default()
        }
    }

    /// Reads the key from `LUMA_API_KEY` and an optional base URL override
    /// from `LUMA_API_BASE`.
    pub fn from_env() -> Self {
        let api_key = std::env::var(API_KEY_ENV)
            .ok()
            .filter(|key| !key.trim().is_empty());
        let base_url = std::env::var(API_BASE_ENV)
            .ok()
            .filter(|base| !base.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_owned());
        Self {
            api_key,
            base_url,
            ..Self::default()
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url.trim_end_matches('/'))
    }

    fn require_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(LumaError::MissingApiKey)
    }
}

impl Default for LumaConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_API_BASE.to_owned(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

impl Debug for LumaConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LumaConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("connect_timeout", &self.connect_timeout)
            .field("read_timeout", &self.read_timeout)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub bearer: String,
    pub body: Option<String>,
}

/// Raw response. Non-success statuses are returned here rather than as errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends one HTTP exchange. Errors mean the service could not be reached.
pub trait Transport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse>;
}

/// Blocking transport backed by a `ureq` agent.
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(config: &LumaConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(config.connect_timeout)
            .timeout_read(config.read_timeout)
            .timeout_write(config.connect_timeout)
            .build();
        Self { agent }
    }
}

impl Transport for UreqTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let authorization = format!("Bearer {}", request.bearer);
        let outcome = match (request.method, request.body.as_deref()) {
            (HttpMethod::Post, body) => self
                .agent
                .post(&request.url)
                .set("Authorization", &authorization)
                .set("Content-Type", "application/json")
                .set("Accept", "application/json")
                .send_string(body.unwrap_or("{}")),
            (HttpMethod::Get, _) => self
                .agent
                .get(&request.url)
                .set("Authorization", &authorization)
                .set("Accept", "application/json")
                .call(),
        };

        match outcome {
            Ok(response) => {
                let status = response.status();
                let body = response.into_string().map_err(|source| LumaError::Io {
                    context: "failed to read generation response",
                    source,
                })?;
                Ok(HttpResponse { status, body })
            }
            Err(ureq::Error::Status(status, response)) => Ok(HttpResponse {
                status,
                body: response.into_string().unwrap_or_default(),
            }),
            Err(ureq::Error::Transport(err)) => Err(LumaError::Transport(err.to_string())),
        }
    }
}

/// Starts generations and polls their status.
pub struct LumaClient<T = UreqTransport> {
    config: LumaConfig,
    transport: T,
}

impl LumaClient<UreqTransport> {
    pub fn new(config: LumaConfig) -> Self {
        let transport = UreqTransport::new(&config);
        Self { config, transport }
    }
}

impl<T: Transport> LumaClient<T> {
    pub fn with_transport(config: LumaConfig, transport: T) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &LumaConfig {
        &self.config
    }

    /// Submits a new generation job.
    ///
    /// A missing API key fails before any request is sent.
    pub fn start(&self, request: &GenerationRequest) -> Result<Generation> {
        let key = self.config.require_key()?;
        request.validate()?;

        let body = serde_json::to_string(request).map_err(LumaError::Encode)?;
        info!(
            aspect_ratio = %request.aspect_ratio,
            loop_video = request.loop_video,
            "starting generation"
        );
        let response = self.transport.send(&HttpRequest {
            method: HttpMethod::Post,
            url: self.config.endpoint("generations"),
            bearer: key.to_owned(),
            body: Some(body),
        })?;
        let generation = decode_generation(response)?;
        info!(id = %generation.id, state = %generation.state, "generation accepted");
        Ok(generation)
    }

    /// Fetches the current state of a generation job.
    pub fn poll(&self, id: &str) -> Result<Generation> {
        let key = self.config.require_key()?;
        let id = id.trim();
        if id.is_empty() {
            return Err(LumaError::MissingGenerationId);
        }

        let response = self.transport.send(&HttpRequest {
            method: HttpMethod::Get,
            url: self.config.endpoint(&format!("generations/{id}")),
            bearer: key.to_owned(),
            body: None,
        })?;
        let generation = decode_generation(response)?;
        debug!(id = %generation.id, state = %generation.state, "generation status");
        Ok(generation)
    }
}

fn decode_generation(response: HttpResponse) -> Result<Generation> {
    if !response.is_success() {
        return Err(LumaError::Api {
            status: response.status,
            body: response.body,
        });
    }
    serde_json::from_str(&response.body).map_err(|source| LumaError::Decode {
        source,
        body: response.body,
    })
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_API_BASE, LumaConfig};

    #[test]
    fn debug_output_hides_the_key() {
        let config = LumaConfig::new("sk-secret");

        let rendered = format!("{config:?}");

        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn endpoint_joins_without_double_slashes() {
        let config = LumaConfig {
            base_url: "http://localhost:9000/v1/".to_owned(),
            ..LumaConfig::default()
        };

        assert_eq!(
            config.endpoint("generations"),
            "http://localhost:9000/v1/generations"
        );
        assert!(LumaConfig::default().endpoint("x").starts_with(DEFAULT_API_BASE));
    }

    #[test]
    fn blank_key_counts_as_missing() {
        let config = LumaConfig::new("   ");

        assert!(config.require_key().is_err());
    }
}
