use std::rc::Rc;
use std::time::Duration;

use worlds_engine::input::{Key, command_for_key};
use worlds_engine::scheduler::ManualScheduler;
use worlds_engine::sim::{AudibleMonitor, SimProbe, SimulatedHandle};
use worlds_engine::{
    Command, Event, Session, SessionConfig, TimelineId, TimelineMap, ViewMode,
};

fn session_with_probes(
    config: SessionConfig,
) -> (Session<SimulatedHandle>, TimelineMap<SimProbe>, Rc<ManualScheduler>) {
    let scheduler = Rc::new(ManualScheduler::starting_at(1_700_000_000_000));
    let handles = TimelineMap::from_fn(|_| SimulatedHandle::new(15.0));
    let probes = TimelineMap::from_fn(|id| handles[id].probe());
    let session = Session::new(handles, scheduler.clone(), scheduler.clone(), config)
        .expect("session should build");
    (session, probes, scheduler)
}

fn press(session: &mut Session<SimulatedHandle>, key: Key) -> Vec<Event> {
    let command = command_for_key(key, false).expect("key should be bound");
    session
        .handle_command(command)
        .expect("keyboard command should succeed")
}

#[test]
fn keyboard_walk_catch_sky_tangled_then_reset() {
    let (mut session, probes, scheduler) = session_with_probes(SessionConfig::default());
    let monitor = AudibleMonitor::new();
    for id in TimelineId::ALL {
        monitor.attach(&probes[id]);
    }

    session
        .handle_command(Command::Load)
        .expect("load should succeed");
    for id in TimelineId::ALL {
        probes[id].finish_load();
    }
    scheduler.advance(Duration::from_millis(250));
    assert_eq!(
        session.take_events(),
        vec![Event::IntroComplete { all_ready: true }]
    );

    press(&mut session, Key::Space);
    probes[TimelineId::Catch].advance(2.0);
    monitor.reset_peak();

    press(&mut session, Key::ArrowRight);
    press(&mut session, Key::ArrowDown);

    let snapshot = session.snapshot();
    assert_eq!(snapshot.active_timeline, TimelineId::Tangled);
    assert_eq!(snapshot.previous_timeline, Some(TimelineId::Sky));
    assert_eq!(snapshot.playback.active_timeline, TimelineId::Tangled);
    assert!(snapshot.playback.is_playing);
    assert_eq!(snapshot.memory_map.exploration_percentage(), 75.0);
    assert_eq!(snapshot.history.len(), 2);
    assert_eq!(snapshot.history[0].timestamp, 1_700_000_000_250);
    assert_eq!(monitor.peak(), 1);
    assert!(!probes[TimelineId::Tangled].is_muted());
    assert!((probes[TimelineId::Tangled].current_time() - 2.0).abs() < 1e-9);

    let events = session
        .handle_command(Command::Reset)
        .expect("reset should succeed");
    assert_eq!(
        events,
        vec![Event::Reset {
            timeline: TimelineId::Catch
        }]
    );

    let snapshot = session.snapshot();
    assert_eq!(snapshot.active_timeline, TimelineId::Catch);
    assert_eq!(snapshot.previous_timeline, None);
    assert!(snapshot.history.is_empty());
    assert_eq!(snapshot.memory_map.exploration_percentage(), 25.0);
    assert_eq!(snapshot.playback.current_time, 0.0);
    assert_eq!(monitor.audible(), 1);
    assert!(!probes[TimelineId::Catch].is_muted());
}

#[test]
fn seek_then_switch_reports_progress_on_new_timeline() {
    let (mut session, probes, _) = session_with_probes(SessionConfig::default());
    for id in TimelineId::ALL {
        probes[id].finish_load();
    }

    session
        .handle_command(Command::Seek { seconds: 5.0 })
        .expect("seek should succeed");
    assert!((session.snapshot().progress - 33.33).abs() < 0.01);

    session
        .handle_command(Command::NavigateTo(TimelineId::Shared))
        .expect("navigate should succeed");

    let snapshot = session.snapshot();
    assert_eq!(snapshot.playback.active_timeline, TimelineId::Shared);
    assert!((snapshot.progress - 33.33).abs() < 0.01);
}

#[test]
fn mute_key_silences_everything_and_survives_navigation() {
    let (mut session, probes, _) = session_with_probes(SessionConfig::default());

    assert_eq!(
        press(&mut session, Key::Char('m')),
        vec![Event::MuteChanged { muted: true }]
    );
    press(&mut session, Key::ArrowLeft);

    for id in TimelineId::ALL {
        assert!(probes[id].is_muted(), "{id} should stay muted");
    }

    press(&mut session, Key::Char('m'));
    for id in TimelineId::ALL {
        assert_eq!(probes[id].is_muted(), id != TimelineId::Tangled);
    }
}

#[test]
fn auto_advance_walks_the_display_order_and_wraps() {
    let config = SessionConfig {
        auto_advance: true,
        initial_timeline: TimelineId::Tangled,
        ..SessionConfig::default()
    };
    let (mut session, probes, scheduler) = session_with_probes(config);
    for id in TimelineId::ALL {
        probes[id].finish_load();
    }
    session
        .handle_command(Command::Play)
        .expect("play should succeed");

    probes[TimelineId::Tangled].advance(15.0);
    scheduler.advance(Duration::ZERO);

    let events = session.take_events();
    assert!(events.contains(&Event::AutoAdvanced {
        from: TimelineId::Tangled,
        to: TimelineId::Catch,
    }));
    assert_eq!(session.snapshot().active_timeline, TimelineId::Catch);
    assert!(session.snapshot().playback.is_playing);
}

#[test]
fn view_key_cycles_and_snapshot_serializes() {
    let (mut session, _, _) = session_with_probes(SessionConfig::default());

    press(&mut session, Key::Char('v'));
    assert_eq!(session.view_mode(), ViewMode::Quad);

    let json = serde_json::to_value(session.snapshot()).expect("snapshot should serialize");
    assert_eq!(json["view_mode"], "quad");
    assert_eq!(json["active_timeline"], "catch");
    assert_eq!(json["memory_map"]["exploration_percentage"], 25.0);
    assert_eq!(json["memory_map"]["current_path"], serde_json::json!([]));
    assert_eq!(json["master_volume"], 0.7);

    press(&mut session, Key::ArrowRight);
    let json = serde_json::to_value(session.snapshot()).expect("snapshot should serialize");
    let step = &json["memory_map"]["current_path"][0];
    assert_eq!(step["from"], "catch");
    assert_eq!(step["to"], "sky");
    assert_eq!(step["direction"], "east");
}

#[test]
fn typing_never_navigates() {
    let (mut session, _, _) = session_with_probes(SessionConfig::default());

    for key in [Key::ArrowUp, Key::ArrowRight, Key::Space, Key::Char('v')] {
        if let Some(command) = command_for_key(key, true) {
            session
                .handle_command(command)
                .expect("command should succeed");
        }
    }

    let snapshot = session.snapshot();
    assert_eq!(snapshot.active_timeline, TimelineId::Catch);
    assert_eq!(snapshot.view_mode, ViewMode::Single);
    assert!(!snapshot.playback.is_playing);
}
