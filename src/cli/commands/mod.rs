//! CLI command dispatch and handlers
//!
//! Routes parsed CLI arguments to the appropriate command handler.

pub mod play;
pub mod prefs;
pub mod runs;
pub mod scenarios;
pub mod store;
pub mod version;

use tokio_util::sync::CancellationToken;

use crate::cli::args::{
    Cli, Commands, PrefsSubcommand, RunsSubcommand, ScenariosSubcommand, StoreSubcommand,
};
use crate::error::EscapeRoomError;

/// Dispatch a parsed CLI invocation to the appropriate command handler.
///
/// # Errors
///
/// Returns an error if the dispatched command handler fails.
pub async fn dispatch(cli: Cli, cancel: CancellationToken) -> Result<(), EscapeRoomError> {
    match cli.command {
        Commands::Play(args) => play::run(&args, cancel).await,
        Commands::Scenarios(cmd) => match cmd.subcommand {
            ScenariosSubcommand::List(args) => scenarios::list(&args),
            ScenariosSubcommand::Show(args) => scenarios::show(&args),
            ScenariosSubcommand::Validate(args) => scenarios::validate(&args),
        },
        Commands::Runs(cmd) => match &cmd.subcommand {
            RunsSubcommand::List(args) => runs::list(&cmd, args).await,
            RunsSubcommand::Show(args) => runs::show(&cmd, args).await,
            RunsSubcommand::Rename(args) => runs::rename(&cmd, args).await,
            RunsSubcommand::Delete(args) => runs::delete(&cmd, args).await,
        },
        Commands::Store(cmd) => match cmd.subcommand {
            StoreSubcommand::Serve(args) => store::serve(&args, cancel).await,
        },
        Commands::Prefs(cmd) => match &cmd.subcommand {
            PrefsSubcommand::Show(args) => prefs::show(&cmd, args),
            PrefsSubcommand::Set(args) => prefs::set(&cmd, args),
        },
        Commands::Version(args) => {
            version::run(&args);
            Ok(())
        }
    }
}
