//! Preference command handlers

use crate::cli::args::{OutputFormat, PrefsCommand, PrefsSetArgs, PrefsShowArgs};
use crate::error::EscapeRoomError;
use crate::preferences::PreferenceStore;
use crate::scenarios;

/// Print the current preferences.
///
/// # Errors
///
/// Returns an I/O error if the preferences file exists but is unreadable.
pub fn show(cmd: &PrefsCommand, args: &PrefsShowArgs) -> Result<(), EscapeRoomError> {
    let store = PreferenceStore::open(cmd.prefs.as_deref())?;
    let prefs = store.get();
    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&prefs)?),
        OutputFormat::Human => {
            println!("theme:         {}", prefs.theme);
            println!(
                "last scenario: {}",
                prefs.last_scenario.as_deref().unwrap_or("(none)")
            );
            match store.path() {
                Some(path) => println!("file:          {}", path.display()),
                None => println!("file:          (not persisted; pass --prefs)"),
            }
        }
    }
    Ok(())
}

/// Change preferences and write them back.
///
/// # Errors
///
/// Returns a usage error if nothing was given to change, or if no
/// preferences file is configured.
pub fn set(cmd: &PrefsCommand, args: &PrefsSetArgs) -> Result<(), EscapeRoomError> {
    if args.theme.is_none() && args.scenario.is_none() {
        return Err(EscapeRoomError::Usage(
            "nothing to set; pass --theme or --scenario".to_string(),
        ));
    }
    let Some(path) = cmd.prefs.as_deref() else {
        return Err(EscapeRoomError::Usage(
            "no preferences file; pass --prefs or set ESCAPEROOM_PREFS".to_string(),
        ));
    };
    let store = PreferenceStore::load(path)?;

    if let Some(theme) = args.theme {
        store.set_theme(theme)?;
    }
    if let Some(id) = &args.scenario {
        if scenarios::find_builtin(id).is_none() {
            tracing::warn!(
                scenario = %id,
                "not a built-in scenario; pass its file with --scenario-file when playing"
            );
        }
        store.set_last_scenario(id)?;
    }

    let prefs = store.get();
    println!("theme: {}, last scenario: {}", prefs.theme, prefs.last_scenario.as_deref().unwrap_or("(none)"));
    tracing::info!(path = %path.display(), "preferences updated");
    Ok(())
}
