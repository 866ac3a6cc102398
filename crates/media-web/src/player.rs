//! JavaScript-facing player built on [`Session`].

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, info, warn};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;
use web_sys::{Element, HtmlElement, KeyboardEvent, Window};
use worlds_engine::input::{Key, command_for_key};
use worlds_engine::{Command, Direction, Event, Session, SessionConfig, TimelineId, ViewMode};

use crate::element::{VideoElementHandle, mount_videos};
use crate::error::{Result, WebMediaError};
use crate::timer::{BrowserClock, TimeoutScheduler};

type KeyListener = Closure<dyn FnMut(KeyboardEvent)>;
type SharedSession = Rc<RefCell<Session<VideoElementHandle>>>;

/// Four stacked videos under one container, navigable from script or keyboard.
#[wasm_bindgen]
pub struct WorldsPlayer {
    session: SharedSession,
    window: Window,
    keydown: Option<KeyListener>,
}

#[wasm_bindgen]
impl WorldsPlayer {
    /// Mounts the videos. `config_json` uses the session config format; `None`
    /// keeps the defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(container: Element, config_json: Option<String>) -> std::result::Result<WorldsPlayer, JsValue> {
        Ok(Self::mount(&container, config_json.as_deref())?)
    }

    pub fn load(&self) {
        run(&self.session, Command::Load);
    }

    /// Applies a DOM `KeyboardEvent.key`. Returns whether the key was bound.
    #[wasm_bindgen(js_name = pressKey)]
    pub fn press_key(&self, key: &str, typing: bool) -> bool {
        press(&self.session, key, typing)
    }

    pub fn navigate(&self, direction: &str) -> std::result::Result<(), JsValue> {
        let direction: Direction = direction.parse().map_err(engine_error)?;
        run(&self.session, Command::Navigate(direction));
        Ok(())
    }

    #[wasm_bindgen(js_name = navigateTo)]
    pub fn navigate_to(&self, timeline: &str) -> std::result::Result<(), JsValue> {
        let timeline: TimelineId = timeline.parse().map_err(engine_error)?;
        run(&self.session, Command::NavigateTo(timeline));
        Ok(())
    }

    pub fn select(&self, timeline: &str) -> std::result::Result<(), JsValue> {
        let timeline: TimelineId = timeline.parse().map_err(engine_error)?;
        run(&self.session, Command::SelectTimeline(timeline));
        Ok(())
    }

    pub fn play(&self) {
        run(&self.session, Command::Play);
    }

    pub fn pause(&self) {
        run(&self.session, Command::Pause);
    }

    #[wasm_bindgen(js_name = togglePlayPause)]
    pub fn toggle_play_pause(&self) {
        run(&self.session, Command::TogglePlayPause);
    }

    /// Seeks the active video. Rejected times are logged and ignored.
    pub fn seek(&self, seconds: f64) {
        run(&self.session, Command::Seek { seconds });
    }

    #[wasm_bindgen(js_name = seekToProgress)]
    pub fn seek_to_progress(&self, percent: f64) {
        run(&self.session, Command::SeekToProgress { percent });
    }

    #[wasm_bindgen(js_name = setMuted)]
    pub fn set_muted(&self, muted: bool) {
        run(&self.session, Command::SetMuted(muted));
    }

    #[wasm_bindgen(js_name = toggleMute)]
    pub fn toggle_mute(&self) {
        run(&self.session, Command::ToggleMute);
    }

    /// Effect-sound volume in `0..=1`; starts at 0.7 unless configured.
    #[wasm_bindgen(js_name = setMasterVolume)]
    pub fn set_master_volume(&self, volume: f64) {
        run(&self.session, Command::SetMasterVolume(volume));
    }

    #[wasm_bindgen(js_name = setAutoAdvance)]
    pub fn set_auto_advance(&self, enabled: bool) {
        run(&self.session, Command::SetAutoAdvance(enabled));
    }

    #[wasm_bindgen(js_name = cycleViewMode)]
    pub fn cycle_view_mode(&self) {
        run(&self.session, Command::CycleViewMode);
    }

    /// Accepts `single`, `quad` or `memory-map`.
    #[wasm_bindgen(js_name = setViewMode)]
    pub fn set_view_mode(&self, mode: &str) -> std::result::Result<(), JsValue> {
        let mode: ViewMode = mode.parse().map_err(engine_error)?;
        run(&self.session, Command::SetViewMode(mode));
        Ok(())
    }

    pub fn reset(&self) {
        run(&self.session, Command::Reset);
    }

    /// Current session state as JSON.
    pub fn snapshot(&self) -> std::result::Result<String, JsValue> {
        let snapshot = self.session.borrow().snapshot();
        serde_json::to_string(&snapshot).map_err(|err| JsValue::from_str(&err.to_string()))
    }

    /// Routes `keydown` on the window to the session, ignoring keys typed
    /// into text fields.
    #[wasm_bindgen(js_name = bindKeyboard)]
    pub fn bind_keyboard(&mut self) -> std::result::Result<(), JsValue> {
        if self.keydown.is_some() {
            return Ok(());
        }
        let session = Rc::clone(&self.session);
        let listener: KeyListener = Closure::wrap(Box::new(move |event: KeyboardEvent| {
            if press(&session, &event.key(), typing_target(&event)) {
                event.prevent_default();
            }
        }) as Box<dyn FnMut(KeyboardEvent)>);
        self.window
            .add_event_listener_with_callback("keydown", listener.as_ref().unchecked_ref())
            .map_err(|err| WebMediaError::dom("failed to bind keyboard", &err))?;
        self.keydown = Some(listener);
        Ok(())
    }

    #[wasm_bindgen(js_name = unbindKeyboard)]
    pub fn unbind_keyboard(&mut self) {
        if let Some(listener) = self.keydown.take()
            && let Err(err) = self
                .window
                .remove_event_listener_with_callback("keydown", listener.as_ref().unchecked_ref())
        {
            warn!(error = ?err, "failed to unbind keyboard");
        }
    }
}

impl WorldsPlayer {
    pub fn mount(container: &Element, config_json: Option<&str>) -> Result<Self> {
        let window = web_sys::window().ok_or(WebMediaError::NoWindow)?;
        let document = window.document().ok_or(WebMediaError::NoDocument)?;
        let config = match config_json {
            Some(json) => SessionConfig::from_json_str(json)?,
            None => SessionConfig::default(),
        };

        let handles = mount_videos(&document, container)?;
        let session = Session::new(
            handles,
            Rc::new(TimeoutScheduler::new()),
            Rc::new(BrowserClock),
            config,
        )?;
        info!("player mounted");
        Ok(Self {
            session: Rc::new(RefCell::new(session)),
            window,
            keydown: None,
        })
    }
}

impl Drop for WorldsPlayer {
    fn drop(&mut self) {
        self.unbind_keyboard();
    }
}

fn run(session: &SharedSession, command: Command) -> Vec<Event> {
    let mut session = session.borrow_mut();
    let mut events = session.take_events();
    events.extend(session.dispatch(command));
    for event in &events {
        match event {
            Event::Error(error) => warn!(kind = ?error.kind, message = %error.message, "command rejected"),
            other => debug!(event = ?other, "session event"),
        }
    }
    events
}

fn press(session: &SharedSession, key: &str, typing: bool) -> bool {
    let Some(command) = Key::from_dom_key(key).and_then(|key| command_for_key(key, typing)) else {
        return false;
    };
    run(session, command);
    true
}

fn typing_target(event: &KeyboardEvent) -> bool {
    event
        .target()
        .and_then(|target| target.dyn_into::<HtmlElement>().ok())
        .is_some_and(|element| is_text_entry(&element.tag_name(), element.is_content_editable()))
}

fn engine_error(err: worlds_engine::EngineError) -> JsValue {
    WebMediaError::from(err).into()
}

/// Whether focus on an element with this tag means the user is typing.
pub(crate) fn is_text_entry(tag_name: &str, content_editable: bool) -> bool {
    content_editable
        || ["INPUT", "TEXTAREA", "SELECT"]
            .iter()
            .any(|tag| tag_name.eq_ignore_ascii_case(tag))
}

#[cfg(test)]
mod tests {
    use super::is_text_entry;

    #[test]
    fn text_fields_and_editable_regions_count_as_typing() {
        assert!(is_text_entry("INPUT", false));
        assert!(is_text_entry("textarea", false));
        assert!(is_text_entry("DIV", true));
        assert!(!is_text_entry("VIDEO", false));
        assert!(!is_text_entry("BODY", false));
    }
}
