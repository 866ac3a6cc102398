use std::io::{BufRead, Write};
use std::rc::Rc;
use std::time::Duration;

use anyhow::{Context, Result};
use worlds_engine::input::{Key, command_for_key};
use worlds_engine::scheduler::ManualScheduler;
use worlds_engine::sim::{SimProbe, SimulatedHandle};
use worlds_engine::time::format_time_precise;
use worlds_engine::{
    Command, Event, Session, SessionConfig, TimelineId, TimelineMap, ViewMode,
};

const HELP: &str = "\
keys:     up right down left space m v
commands: play pause seek <s> progress <pct> goto <timeline> select <timeline>
          view single|quad|memory-map volume <0-1> auto on|off
          reset tick <ms> status help quit";

#[derive(Debug, Clone, PartialEq)]
enum Action {
    Apply(Command),
    Tick(Duration),
    Status,
    Help,
    Quit,
}

fn parse_action(line: &str) -> std::result::Result<Action, String> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Err("empty input".to_owned());
    };
    let arg = words.next();
    let number = |name: &str| -> std::result::Result<f64, String> {
        arg.ok_or_else(|| format!("{name} needs a number"))?
            .parse::<f64>()
            .map_err(|err| format!("{name}: {err}"))
    };
    let timeline = |name: &str| -> std::result::Result<TimelineId, String> {
        arg.ok_or_else(|| format!("{name} needs a timeline"))?
            .parse::<TimelineId>()
            .map_err(|err| err.to_string())
    };

    let key = match head {
        "up" => Some(Key::ArrowUp),
        "right" => Some(Key::ArrowRight),
        "down" => Some(Key::ArrowDown),
        "left" => Some(Key::ArrowLeft),
        "space" => Some(Key::Space),
        single if single.chars().count() == 1 => single.chars().next().map(Key::Char),
        _ => None,
    };
    if let Some(key) = key {
        return command_for_key(key, false)
            .map(Action::Apply)
            .ok_or_else(|| format!("unbound key: {head}"));
    }

    let action = match head {
        "play" => Action::Apply(Command::Play),
        "pause" => Action::Apply(Command::Pause),
        "seek" => Action::Apply(Command::Seek {
            seconds: number("seek")?,
        }),
        "progress" => Action::Apply(Command::SeekToProgress {
            percent: number("progress")?,
        }),
        "goto" => Action::Apply(Command::NavigateTo(timeline("goto")?)),
        "select" => Action::Apply(Command::SelectTimeline(timeline("select")?)),
        "volume" => Action::Apply(Command::SetMasterVolume(number("volume")?)),
        "view" => Action::Apply(Command::SetViewMode(
            arg.ok_or_else(|| "view needs a mode".to_owned())?
                .parse::<ViewMode>()
                .map_err(|err| err.to_string())?,
        )),
        "auto" => match arg {
            Some("on") => Action::Apply(Command::SetAutoAdvance(true)),
            Some("off") => Action::Apply(Command::SetAutoAdvance(false)),
            _ => return Err("auto takes on or off".to_owned()),
        },
        "reset" => Action::Apply(Command::Reset),
        "tick" => {
            let millis = number("tick")?;
            if !millis.is_finite() || millis < 0.0 {
                return Err(format!("tick: invalid duration {millis}"));
            }
            Action::Tick(Duration::from_secs_f64(millis / 1000.0))
        }
        "status" => Action::Status,
        "help" => Action::Help,
        "quit" | "exit" => Action::Quit,
        other => return Err(format!("unknown command: {other}")),
    };
    Ok(action)
}

struct Explorer {
    session: Session<SimulatedHandle>,
    probes: TimelineMap<SimProbe>,
    scheduler: Rc<ManualScheduler>,
}

impl Explorer {
    fn new(config: SessionConfig, duration: f64) -> Result<Self> {
        let scheduler = Rc::new(ManualScheduler::new());
        let handles = TimelineMap::from_fn(|_| SimulatedHandle::preloaded(duration));
        let probes = TimelineMap::from_fn(|id| handles[id].probe());
        let session = Session::new(handles, scheduler.clone(), scheduler.clone(), config)
            .context("Failed to start session")?;
        Ok(Self {
            session,
            probes,
            scheduler,
        })
    }

    fn apply(&mut self, command: Command) -> Vec<Event> {
        self.session.dispatch(command)
    }

    /// Plays the active video forward and runs timers due in the window.
    fn tick(&mut self, by: Duration) -> Vec<Event> {
        let active = self.session.sync().active_timeline();
        if self.session.sync().state().is_playing {
            self.probes[active].advance(by.as_secs_f64());
        }
        self.scheduler.advance(by);
        self.session.take_events()
    }

    fn status_line(&self) -> String {
        let snapshot = self.session.snapshot();
        format!(
            "{} {} / {} ({:.1}%) {} {}{} explored {:.0}%",
            snapshot.active_timeline,
            format_time_precise(snapshot.playback.current_time),
            format_time_precise(snapshot.playback.duration),
            snapshot.progress,
            if snapshot.playback.is_playing { "playing" } else { "paused" },
            if snapshot.muted { "muted " } else { "" },
            snapshot.view_mode.as_str(),
            snapshot.memory_map.exploration_percentage(),
        )
    }
}

fn describe(event: &Event) -> String {
    match event {
        Event::Navigated(navigation) => format!(
            "navigated {} -> {} ({})",
            navigation.from, navigation.to, navigation.direction
        ),
        Event::TransitionStarted { from, to } => format!("transition {from} -> {to}"),
        Event::TransitionFinished { to } => format!("arrived at {to}"),
        Event::AutoAdvanced { from, to } => format!("auto-advanced {from} -> {to}"),
        Event::MuteChanged { muted } => format!("muted: {muted}"),
        Event::MasterVolumeChanged { volume } => format!("volume: {volume:.2}"),
        Event::ViewModeChanged(mode) => format!("view: {}", mode.as_str()),
        Event::Reset { timeline } => format!("reset to {timeline}"),
        Event::IntroComplete { all_ready } => {
            if *all_ready {
                "intro complete".to_owned()
            } else {
                "intro complete (timed out waiting for media)".to_owned()
            }
        }
        Event::Error(error) => format!("error: {}", error.message),
    }
}

/// Reads one action per line from `input` until `quit` or end of input.
pub fn run(
    config: SessionConfig,
    duration: f64,
    input: impl BufRead,
    mut output: impl Write,
) -> Result<()> {
    let mut explorer = Explorer::new(config, duration)?;
    let events = explorer.apply(Command::Load);
    write_events(&mut output, &events)?;
    writeln!(output, "{}", explorer.status_line())?;

    for line in input.lines() {
        let line = line.context("Failed to read input")?;
        if line.trim().is_empty() {
            continue;
        }
        let events = match parse_action(&line) {
            Ok(Action::Apply(command)) => explorer.apply(command),
            Ok(Action::Tick(by)) => explorer.tick(by),
            Ok(Action::Status) => {
                writeln!(output, "{}", explorer.status_line())?;
                continue;
            }
            Ok(Action::Help) => {
                writeln!(output, "{HELP}")?;
                continue;
            }
            Ok(Action::Quit) => break,
            Err(message) => {
                writeln!(output, "? {message}")?;
                continue;
            }
        };
        write_events(&mut output, &events)?;
    }

    Ok(())
}

fn write_events(output: &mut impl Write, events: &[Event]) -> Result<()> {
    for event in events {
        writeln!(output, "{}", describe(event))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use worlds_engine::{Command, Direction, SessionConfig, TimelineId, ViewMode};

    use super::{Action, parse_action, run};

    #[test]
    fn words_and_keys_parse_to_commands() {
        assert_eq!(
            parse_action("right"),
            Ok(Action::Apply(Command::Navigate(Direction::East)))
        );
        assert_eq!(
            parse_action("goto tangled"),
            Ok(Action::Apply(Command::NavigateTo(TimelineId::Tangled)))
        );
        assert_eq!(
            parse_action("tick 250"),
            Ok(Action::Tick(Duration::from_millis(250)))
        );
        assert_eq!(parse_action("m"), Ok(Action::Apply(Command::ToggleMute)));
        assert_eq!(
            parse_action("view memory-map"),
            Ok(Action::Apply(Command::SetViewMode(ViewMode::MemoryMap)))
        );
        assert_eq!(
            parse_action("volume 0.4"),
            Ok(Action::Apply(Command::SetMasterVolume(0.4)))
        );
        assert!(parse_action("seek").is_err());
        assert!(parse_action("fly away").is_err());
    }

    #[test]
    fn scripted_walk_reports_events_and_status() {
        let script = "tick 250\nright\ndown\nvolume 2\nstatus\nreset\nquit\nleft\n";
        let mut output = Vec::new();

        run(SessionConfig::default(), 15.0, script.as_bytes(), &mut output)
            .expect("script should run");

        let text = String::from_utf8(output).expect("output should be utf-8");
        assert!(text.contains("intro complete"));
        assert!(text.contains("navigated catch -> sky (east)"));
        assert!(text.contains("navigated sky -> tangled (south)"));
        assert!(text.contains("tangled 00:00.00"));
        assert!(text.contains("explored 75%"));
        assert!(text.contains("volume: 1.00"));
        assert!(text.contains("reset to catch"));
        assert!(!text.contains("navigated catch -> tangled"));
    }
}
