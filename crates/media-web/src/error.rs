use std::fmt::{Display, Formatter};

use wasm_bindgen::JsValue;
use worlds_engine::EngineError;

pub type Result<T> = std::result::Result<T, WebMediaError>;

#[derive(Debug)]
pub enum WebMediaError {
    NoWindow,
    NoDocument,
    Dom {
        context: &'static str,
        message: String,
    },
    Engine(EngineError),
}

impl WebMediaError {
    pub(crate) fn dom(context: &'static str, value: &JsValue) -> Self {
        Self::Dom {
            context,
            message: describe_js(value),
        }
    }
}

impl Display for WebMediaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoWindow => write!(f, "no global window"),
            Self::NoDocument => write!(f, "window has no document"),
            Self::Dom { context, message } => write!(f, "{context}: {message}"),
            Self::Engine(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for WebMediaError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Engine(err) => Some(err),
            _ => None,
        }
    }
}

impl From<EngineError> for WebMediaError {
    fn from(err: EngineError) -> Self {
        Self::Engine(err)
    }
}

impl From<WebMediaError> for JsValue {
    fn from(err: WebMediaError) -> Self {
        JsValue::from(js_sys::Error::new(&err.to_string()))
    }
}

/// Best-effort text for a thrown JS value or rejected promise reason.
pub(crate) fn describe_js(value: &JsValue) -> String {
    if let Some(text) = value.as_string() {
        return text;
    }
    js_sys::Reflect::get(value, &JsValue::from_str("message"))
        .ok()
        .and_then(|message| message.as_string())
        .unwrap_or_else(|| format!("{value:?}"))
}
