//! `HTMLVideoElement` as a [`MediaHandle`].

use std::collections::BTreeMap;

use tracing::{debug, warn};
use wasm_bindgen::JsCast;
use wasm_bindgen::closure::Closure;
use wasm_bindgen_futures::{JsFuture, spawn_local};
use web_sys::{Document, Element, HtmlVideoElement};
use worlds_engine::media::{ListenerId, MediaListener, PlayCallback};
use worlds_engine::{
    MediaEvent, MediaEventKind, MediaHandle, PlayOutcome, ReadyState, TimelineId, TimelineMap,
};

use crate::error::{Result, WebMediaError, describe_js};

type DomListener = Closure<dyn FnMut(web_sys::Event)>;

/// One `<video>` element driven by the engine.
///
/// Listener closures stay alive until unsubscribed or until the handle drops.
pub struct VideoElementHandle {
    element: HtmlVideoElement,
    listeners: BTreeMap<ListenerId, (MediaEventKind, DomListener)>,
    next_listener: u64,
}

impl VideoElementHandle {
    pub fn new(element: HtmlVideoElement) -> Self {
        Self {
            element,
            listeners: BTreeMap::new(),
            next_listener: 0,
        }
    }

    pub fn element(&self) -> &HtmlVideoElement {
        &self.element
    }

    fn detach(&self, kind: MediaEventKind, listener: &DomListener) {
        if let Err(err) = self
            .element
            .remove_event_listener_with_callback(kind.dom_name(), listener.as_ref().unchecked_ref())
        {
            warn!(event = kind.dom_name(), error = %describe_js(&err), "failed to detach listener");
        }
    }
}

impl MediaHandle for VideoElementHandle {
    fn load(&mut self, source: &str) {
        self.element.set_preload("auto");
        self.element.set_src(source);
        self.element.load();
        debug!(source, "video source assigned");
    }

    fn play(&mut self, on_settled: PlayCallback) {
        match self.element.play() {
            Ok(promise) => spawn_local(async move {
                let outcome = match JsFuture::from(promise).await {
                    Ok(_) => PlayOutcome::Started,
                    Err(reason) => PlayOutcome::Rejected(describe_js(&reason)),
                };
                on_settled(outcome);
            }),
            Err(reason) => on_settled(PlayOutcome::Rejected(describe_js(&reason))),
        }
    }

    fn pause(&mut self) {
        if let Err(err) = self.element.pause() {
            warn!(error = %describe_js(&err), "pause failed");
        }
    }

    fn is_paused(&self) -> bool {
        self.element.paused()
    }

    fn current_time(&self) -> f64 {
        self.element.current_time()
    }

    fn set_current_time(&mut self, seconds: f64) {
        self.element.set_current_time(seconds);
    }

    fn duration(&self) -> f64 {
        self.element.duration()
    }

    fn is_muted(&self) -> bool {
        self.element.muted()
    }

    fn set_muted(&mut self, muted: bool) {
        self.element.set_muted(muted);
    }

    fn ready_state(&self) -> ReadyState {
        ReadyState::from_level(self.element.ready_state())
    }

    fn subscribe(&mut self, kind: MediaEventKind, listener: MediaListener) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;

        let element = self.element.clone();
        let closure: DomListener = Closure::wrap(Box::new(move |_event: web_sys::Event| {
            listener(&MediaEvent {
                kind,
                current_time: element.current_time(),
                duration: element.duration(),
            });
        }) as Box<dyn FnMut(web_sys::Event)>);

        if let Err(err) = self
            .element
            .add_event_listener_with_callback(kind.dom_name(), closure.as_ref().unchecked_ref())
        {
            warn!(event = kind.dom_name(), error = %describe_js(&err), "failed to attach listener");
        }
        self.listeners.insert(id, (kind, closure));
        id
    }

    fn unsubscribe(&mut self, id: ListenerId) {
        if let Some((kind, listener)) = self.listeners.remove(&id) {
            self.detach(kind, &listener);
        }
    }
}

impl Drop for VideoElementHandle {
    fn drop(&mut self) {
        for (kind, listener) in self.listeners.values() {
            self.detach(*kind, listener);
        }
    }
}

/// Creates one muted, inline `<video>` per timeline inside `container`.
///
/// Elements carry a `data-timeline` attribute so styles can stack them.
pub fn mount_videos(
    document: &Document,
    container: &Element,
) -> Result<TimelineMap<VideoElementHandle>> {
    let [catch, sky, shared, tangled] = TimelineId::ALL;
    Ok(TimelineMap::new([
        mount_video(document, container, catch)?,
        mount_video(document, container, sky)?,
        mount_video(document, container, shared)?,
        mount_video(document, container, tangled)?,
    ]))
}

fn mount_video(
    document: &Document,
    container: &Element,
    id: TimelineId,
) -> Result<VideoElementHandle> {
    let element = document
        .create_element("video")
        .map_err(|err| WebMediaError::dom("failed to create video element", &err))?
        .dyn_into::<HtmlVideoElement>()
        .map_err(|_| WebMediaError::Dom {
            context: "created element is not a video",
            message: id.to_string(),
        })?;

    element
        .set_attribute("data-timeline", id.as_str())
        .and_then(|()| element.set_attribute("playsinline", ""))
        .and_then(|()| element.class_list().add_1("worlds-video"))
        .map_err(|err| WebMediaError::dom("failed to tag video element", &err))?;
    element.set_muted(true);
    container
        .append_child(&element)
        .map_err(|err| WebMediaError::dom("failed to mount video element", &err))?;

    Ok(VideoElementHandle::new(element))
}
