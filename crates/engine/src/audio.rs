use std::cell::Cell;

use tracing::debug;

use crate::media::MediaHandle;
use crate::observer::{Observers, Subscription};
use crate::sync::VideoSync;

pub const DEFAULT_MASTER_VOLUME: f64 = 0.7;

/// Audio settings owned by the presentation layer: a mute toggle and a
/// master volume for effect sounds.
#[derive(Debug)]
pub struct MuteToggle {
    muted: Cell<bool>,
    master_volume: Cell<f64>,
    changes: Observers<bool>,
}

impl MuteToggle {
    pub fn new(muted: bool) -> Self {
        Self {
            muted: Cell::new(muted),
            master_volume: Cell::new(DEFAULT_MASTER_VOLUME),
            changes: Observers::new(),
        }
    }

    pub fn is_muted(&self) -> bool {
        self.muted.get()
    }

    /// Updates the flag. Observers run only when the value actually changes.
    pub fn set(&self, muted: bool) -> bool {
        if self.muted.replace(muted) == muted {
            return false;
        }
        debug!(muted, "mute toggle changed");
        self.changes.notify(&muted);
        true
    }

    /// Flips the flag and returns the new value.
    pub fn toggle(&self) -> bool {
        let muted = !self.is_muted();
        self.set(muted);
        muted
    }

    pub fn on_change(&self, mut callback: impl FnMut(bool) + 'static) -> Subscription {
        self.changes.subscribe(move |muted: &bool| callback(*muted))
    }

    pub fn master_volume(&self) -> f64 {
        self.master_volume.get()
    }

    /// Sets the master volume, clamped to `0.0..=1.0`. Returns whether the
    /// stored value changed.
    pub fn set_master_volume(&self, volume: f64) -> bool {
        let volume = if volume.is_finite() {
            volume.clamp(0.0, 1.0)
        } else {
            0.0
        };
        if self.master_volume.replace(volume) == volume {
            return false;
        }
        debug!(volume, "master volume changed");
        true
    }

    /// Volume effect sounds should play at: zero while muted.
    pub fn effective_volume(&self) -> f64 {
        if self.is_muted() {
            0.0
        } else {
            self.master_volume()
        }
    }
}

impl Default for MuteToggle {
    fn default() -> Self {
        Self::new(false)
    }
}

/// Mirrors a [`MuteToggle`] into a [`VideoSync`] engine's global mute flag.
#[derive(Debug)]
pub struct MuteBridge {
    subscription: Subscription,
}

impl MuteBridge {
    /// Pushes the toggle's current value, then follows every change.
    pub fn connect<H: MediaHandle + 'static>(toggle: &MuteToggle, sync: &VideoSync<H>) -> Self {
        sync.set_muted(toggle.is_muted());
        let target = sync.downgrade();
        let subscription = toggle.on_change(move |muted| {
            if let Some(sync) = target.upgrade() {
                sync.set_muted(muted);
            }
        });
        Self { subscription }
    }

    pub fn disconnect(self) {
        self.subscription.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::{DEFAULT_MASTER_VOLUME, MuteBridge, MuteToggle};
    use crate::scheduler::ManualScheduler;
    use crate::sim::{SimProbe, SimulatedHandle};
    use crate::sync::{SyncOptions, VideoSync};
    use crate::timeline::{TimelineId, TimelineMap};

    fn engine() -> (VideoSync<SimulatedHandle>, TimelineMap<SimProbe>) {
        let handles = TimelineMap::from_fn(|_| SimulatedHandle::preloaded(15.0));
        let probes = TimelineMap::from_fn(|id| handles[id].probe());
        let sync = VideoSync::new(
            handles,
            Rc::new(ManualScheduler::new()),
            TimelineId::Catch,
            SyncOptions::default(),
        );
        (sync, probes)
    }

    #[test]
    fn bridge_pushes_initial_value_and_follows_changes() {
        let (sync, probes) = engine();
        let toggle = MuteToggle::new(true);

        let _bridge = MuteBridge::connect(&toggle, &sync);
        assert!(sync.is_muted());
        assert!(probes[TimelineId::Catch].is_muted());

        toggle.toggle();
        assert!(!sync.is_muted());
        assert!(!probes[TimelineId::Catch].is_muted());
        assert!(probes[TimelineId::Sky].is_muted());
    }

    #[test]
    fn disconnected_bridge_stops_forwarding() {
        let (sync, _) = engine();
        let toggle = MuteToggle::default();
        let bridge = MuteBridge::connect(&toggle, &sync);

        bridge.disconnect();
        toggle.set(true);

        assert!(!sync.is_muted());
    }

    #[test]
    fn set_reports_whether_value_changed() {
        let toggle = MuteToggle::default();

        assert!(!toggle.set(false));
        assert!(toggle.set(true));
        assert_eq!(toggle.effective_volume(), 0.0);
    }

    #[test]
    fn master_volume_starts_below_full_scale() {
        let toggle = MuteToggle::default();

        assert_eq!(toggle.master_volume(), DEFAULT_MASTER_VOLUME);
        assert_eq!(toggle.effective_volume(), 0.7);
        assert!(!toggle.set_master_volume(0.7));
        assert!(toggle.set_master_volume(0.25));
        assert_eq!(toggle.effective_volume(), 0.25);
    }

    #[test]
    fn master_volume_is_clamped() {
        let toggle = MuteToggle::default();

        toggle.set_master_volume(1.7);
        assert_eq!(toggle.master_volume(), 1.0);
        toggle.set_master_volume(f64::NAN);
        assert_eq!(toggle.effective_volume(), 0.0);
    }
}
