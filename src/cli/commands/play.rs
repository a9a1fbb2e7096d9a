//! Terminal front end
//!
//! `escaperoom play` reads one command per line from stdin and interleaves
//! them with timer and store notices from the [`Session`]. The session is
//! only touched from this task.

use std::fmt::Write as _;
use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::LinesStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cli::args::PlayArgs;
use crate::config::ScenarioLoader;
use crate::error::EscapeRoomError;
use crate::observability::EventEmitter;
use crate::persistence::{HttpStore, MemoryStore, RunStore, RunsClient};
use crate::preferences::{PreferenceStore, Theme};
use crate::progression::{RunStatus, StageEngine};
use crate::scenarios::{self, Catalog};
use crate::session::{Notice, SaveRequest, SaveState, Session};
use crate::timer::format_clock;

const COMMANDS: &[&str] = &[
    "answer",
    "icon",
    "next",
    "hint",
    "start",
    "pause",
    "reset-timer",
    "apply",
    "reset",
    "scenario",
    "save",
    "runs",
    "rename",
    "delete",
    "status",
    "theme",
    "help",
    "quit",
];

const HELP: &str = "\
Commands:
  answer <text>        submit an answer for the current stage
  icon <id>            pick an icon on an icon stage
  next                 go to the next stage after a correct answer
  hint                 show the stage hint
  start | pause        run or pause the countdown
  reset-timer          restore the countdown to the stage limit
  apply <duration>     set the countdown, e.g. 2m30s
  reset                restart the scenario
  scenario [id]        list scenarios or switch to one
  save [name]          store the completed run
  runs                 refresh and show saved runs
  rename <id> <name>   rename a saved run
  delete <id>          delete a saved run
  status               show the current stage again
  theme <dark|light>   change the color theme
  quit                 leave";

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PlayCommand {
    Answer(String),
    Icon(String),
    Next,
    Hint,
    Start,
    Pause,
    ResetTimer,
    Apply(Duration),
    Reset,
    Scenario(Option<String>),
    Save(Option<String>),
    Runs,
    Rename { id: String, name: String },
    Delete(String),
    Status,
    Theme(Theme),
    Help,
    Quit,
    Empty,
}

/// Parses one line of input.
///
/// `answer` takes the rest of the line verbatim so quotes and braces reach
/// the validator untouched; everything else is split shell-style.
fn parse_command(line: &str) -> Result<PlayCommand, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(PlayCommand::Empty);
    }
    let (word, rest) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(w, r)| (w, r.trim()));

    if word == "answer" {
        return Ok(PlayCommand::Answer(rest.to_string()));
    }

    let args = shlex::split(rest).ok_or_else(|| "unbalanced quotes".to_string())?;
    let one = |usage: &str| -> Result<String, String> {
        match args.as_slice() {
            [arg] => Ok(arg.clone()),
            _ => Err(format!("usage: {usage}")),
        }
    };

    let command = match word {
        "icon" => PlayCommand::Icon(one("icon <id>")?),
        "next" => PlayCommand::Next,
        "hint" => PlayCommand::Hint,
        "start" => PlayCommand::Start,
        "pause" => PlayCommand::Pause,
        "reset-timer" => PlayCommand::ResetTimer,
        "apply" => {
            let raw = args.join(" ");
            let duration = humantime::parse_duration(&raw)
                .map_err(|e| format!("usage: apply <duration> (e.g. 2m30s): {e}"))?;
            PlayCommand::Apply(duration)
        }
        "reset" => PlayCommand::Reset,
        "scenario" => PlayCommand::Scenario(args.first().cloned()),
        "save" => PlayCommand::Save((!args.is_empty()).then(|| args.join(" "))),
        "runs" => PlayCommand::Runs,
        "rename" => match args.split_first() {
            Some((id, name)) if !name.is_empty() => PlayCommand::Rename {
                id: id.clone(),
                name: name.join(" "),
            },
            _ => return Err("usage: rename <id> <name>".to_string()),
        },
        "delete" => PlayCommand::Delete(one("delete <id>")?),
        "status" => PlayCommand::Status,
        "theme" => match one("theme <dark|light>")?.as_str() {
            "dark" => PlayCommand::Theme(Theme::Dark),
            "light" => PlayCommand::Theme(Theme::Light),
            other => return Err(format!("unknown theme '{other}'")),
        },
        "help" | "?" => PlayCommand::Help,
        "quit" | "exit" => PlayCommand::Quit,
        other => {
            let mut message = format!("unknown command '{other}'");
            if let Some(s) = scenarios::suggest(other, COMMANDS.iter().copied()) {
                let _ = write!(message, ", did you mean '{s}'?");
            }
            return Err(message);
        }
    };
    Ok(command)
}

/// Splits a countdown duration into whole minutes and seconds.
fn minutes_seconds(duration: Duration) -> (u32, u32) {
    let total = u32::try_from(duration.as_secs()).unwrap_or(u32::MAX);
    (total / 60, total % 60)
}

// ============================================================================
// Rendering
// ============================================================================

struct Screen {
    theme: Theme,
    ansi: bool,
}

impl Screen {
    fn new(theme: Theme) -> Self {
        Self {
            theme,
            ansi: std::io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none(),
        }
    }

    fn accent(&self, text: &str) -> String {
        if !self.ansi {
            return text.to_string();
        }
        let code = match self.theme {
            Theme::Dark => "1;36",
            Theme::Light => "1;34",
        };
        format!("\x1b[{code}m{text}\x1b[0m")
    }

    fn stage(&self, session: &Session) {
        let engine = session.engine();
        let scenario = engine.scenario();
        let stage = engine.current_stage();
        println!();
        println!(
            "{}",
            self.accent(&format!(
                "{}  [{}/{}]  {}",
                scenario.name,
                engine.current_index() + 1,
                scenario.stages.len(),
                stage.title
            ))
        );
        println!("{}", stage.prompt);
        if let Some(icons) = &stage.icon_choice {
            println!();
            println!("{}", icons.instruction);
            for choice in &icons.choices {
                println!("  icon {:<16}{}", choice.id, choice.label);
            }
        }
        println!(
            "{}: {}    timer {}{}",
            stage.input_label,
            stage.placeholder,
            format_clock(session.timer().remaining),
            if session.timer().running { "" } else { " (paused, type 'start')" }
        );
    }

    fn verdict(&self, session: &Session) {
        let engine = session.engine();
        if let Some(verdict) = engine.verdict() {
            let mark = if verdict.ok { "✔" } else { "✘" };
            println!("{mark} {}", verdict.message);
        }
        if engine.is_complete() {
            println!(
                "{} Type 'save [name]' to store your run.",
                self.accent("All stages cleared!")
            );
        } else if engine.status() == RunStatus::StagePassed {
            println!("Type 'next' to continue.");
        }
    }

    fn runs(&self, session: &Session) {
        let view = session.runs();
        if view.loading {
            println!("Loading saved runs...");
        }
        if let Some(error) = &view.error {
            println!("Could not load saved runs: {error}");
        }
        if view.runs.is_empty() && !view.loading {
            println!("No saved runs for '{}' yet.", view.scenario_id);
        }
        for run in &view.runs {
            let duration = u32::try_from(run.duration_seconds)
                .map_or_else(|_| "--:--".to_string(), format_clock);
            let saved = matches!(session.save_state(), SaveState::Saved { id } if *id == run.id);
            println!(
                "  {}{:<38}{:<28}{:<8}{}",
                if saved { "* " } else { "  " },
                run.id,
                run.label(),
                duration,
                run.created_at.format("%Y-%m-%d %H:%M")
            );
            if let Some(error) = view.entry_errors.get(&run.id) {
                println!("      {error}");
            }
        }
    }

    fn notice(&self, session: &Session, notice: &Notice) {
        match notice {
            Notice::TimeUp { .. } => {
                println!();
                self.verdict(session);
            }
            Notice::RunsLoaded { count, error } => match error {
                Some(e) => println!("Could not load saved runs: {e}"),
                None => debug!(count, "runs refreshed"),
            },
            Notice::Saved { id } => println!("Run saved ({id})."),
            Notice::SaveFailed { message } => {
                println!("Saving failed: {message}. Type 'save' to retry.");
            }
            Notice::Renamed { id } => println!("Renamed {id}."),
            Notice::Deleted { id } => println!("Deleted {id}."),
            Notice::RenameFailed { id, message } | Notice::DeleteFailed { id, message } => {
                println!("{id}: {message}");
            }
        }
    }
}

// ============================================================================
// Command loop
// ============================================================================

enum Flow {
    Continue,
    Quit,
}

fn handle(
    session: &mut Session,
    prefs: &PreferenceStore,
    screen: &Screen,
    command: PlayCommand,
) -> Flow {
    match command {
        PlayCommand::Empty => {}
        PlayCommand::Answer(text) => {
            if session.submit_answer(&text).is_some() {
                screen.verdict(session);
            }
        }
        PlayCommand::Icon(id) => {
            if session.select_icon(&id).is_some() {
                screen.verdict(session);
            } else if session.engine().current_stage().icon_choice.is_none() {
                println!("This stage has no icons.");
            }
        }
        PlayCommand::Next => match session.advance() {
            Some(t) if t.completed => screen.verdict(session),
            Some(_) => screen.stage(session),
            None if session.engine().is_failed() => screen.verdict(session),
            None => println!("Solve this stage first."),
        },
        PlayCommand::Hint => println!("Hint: {}", session.hint()),
        PlayCommand::Start => {
            if session.start_timer() {
                println!("Timer running: {}", format_clock(session.timer().remaining));
            } else {
                println!("Timer not started ({}).", format_clock(session.timer().remaining));
            }
        }
        PlayCommand::Pause => {
            let snap = session.pause_timer();
            println!("Timer paused at {}.", format_clock(snap.remaining));
        }
        PlayCommand::ResetTimer => {
            let snap = session.reset_timer();
            println!("Timer reset to {}.", format_clock(snap.total));
        }
        PlayCommand::Apply(duration) => {
            let (minutes, seconds) = minutes_seconds(duration);
            let snap = session.apply_timer(minutes, seconds);
            println!("Timer set to {}.", format_clock(snap.total));
        }
        PlayCommand::Reset => {
            session.reset();
            screen.stage(session);
        }
        PlayCommand::Scenario(None) => {
            let current = session.engine().scenario().id.clone();
            for s in session.engine().catalog().iter() {
                let mark = if s.id == current { "*" } else { " " };
                println!("{mark} {:<16}{}", s.id, s.name);
            }
        }
        PlayCommand::Scenario(Some(id)) => match session.select_scenario(&id) {
            Ok(()) => {
                if let Err(e) = prefs.set_last_scenario(&id) {
                    warn!(error = %e, "failed to save preferences");
                }
                screen.stage(session);
            }
            Err(e) => println!("{e}"),
        },
        PlayCommand::Save(name) => match session.save(name.as_deref()) {
            SaveRequest::Started => println!("Saving..."),
            SaveRequest::NotComplete => println!("Finish every stage before saving."),
            SaveRequest::InFlight => println!("Already saving."),
            SaveRequest::AlreadySaved => println!("This run is already saved."),
        },
        PlayCommand::Runs => {
            screen.runs(session);
            session.refresh_runs();
        }
        PlayCommand::Rename { id, name } => {
            if let Err(e) = session.rename(&id, &name) {
                println!("{id}: {e}");
            }
        }
        PlayCommand::Delete(id) => session.delete(&id),
        PlayCommand::Status => {
            screen.stage(session);
            screen.verdict(session);
        }
        PlayCommand::Theme(theme) => {
            if let Err(e) = prefs.set_theme(theme) {
                warn!(error = %e, "failed to save preferences");
            }
        }
        PlayCommand::Help => println!("{HELP}"),
        PlayCommand::Quit => return Flow::Quit,
    }
    Flow::Continue
}

/// Play until `quit`, end of input, or cancellation.
///
/// # Errors
///
/// Returns a config error if a scenario file is invalid, an engine error
/// for an unknown `--scenario`, or a persistence error for a bad store URL.
pub async fn run(args: &PlayArgs, cancel: CancellationToken) -> Result<(), EscapeRoomError> {
    let prefs = PreferenceStore::open(args.prefs.as_deref())?;

    let loader = ScenarioLoader::with_defaults();
    let (catalog, warnings) = Catalog::load(&loader, &args.scenario_files)?;
    for warning in &warnings {
        warn!(
            location = warning.location.as_deref().unwrap_or("<unknown>"),
            "{}",
            warning.message
        );
    }

    let initial = args.scenario.clone().or_else(|| {
        prefs
            .get()
            .last_scenario
            .filter(|id| catalog.get(id).is_some())
    });
    let engine = StageEngine::new(catalog, initial.as_deref())?;

    let store: Arc<dyn RunStore> = match &args.store_url {
        Some(url) => Arc::new(HttpStore::new(url, args.store_timeout)?),
        None => Arc::new(MemoryStore::new()),
    };
    let emitter = match &args.events_file {
        Some(path) => EventEmitter::from_file(path)?,
        None => EventEmitter::noop(),
    };

    let mut session = Session::new(engine, RunsClient::new(store), Arc::new(emitter));
    if let Err(e) = prefs.set_last_scenario(&session.engine().scenario().id) {
        warn!(error = %e, "failed to save preferences");
    }

    let mut theme_rx = prefs.subscribe();
    let mut screen = Screen::new(prefs.get().theme);
    println!("Type 'help' for commands.");
    screen.stage(&session);

    let mut lines = LinesStream::new(BufReader::new(tokio::io::stdin()).lines());

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                debug!("play cancelled");
                break;
            }
            line = lines.next() => {
                let Some(line) = line.transpose()? else {
                    break;
                };
                match parse_command(&line) {
                    Ok(command) => {
                        if matches!(handle(&mut session, &prefs, &screen, command), Flow::Quit) {
                            break;
                        }
                    }
                    Err(message) => println!("{message}"),
                }
            }
            Some(notice) = session.next_notice() => screen.notice(&session, &notice),
            Ok(()) = theme_rx.changed() => {
                let theme = theme_rx.borrow_and_update().theme;
                if theme != screen.theme {
                    screen.theme = theme;
                    println!("{}", screen.accent(&format!("Theme: {theme}")));
                }
            }
        }
    }

    println!("Bye.");
    Ok(())
}
