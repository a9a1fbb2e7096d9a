//! Version information display

use serde_json::json;

use crate::cli::args::{OutputFormat, VersionArgs};
use crate::scenarios;

/// Print version information and the built-in scenario ids.
pub fn run(args: &VersionArgs) {
    let name = env!("CARGO_PKG_NAME");
    let version = env!("CARGO_PKG_VERSION");
    let builtin: Vec<&str> = scenarios::list_builtin().iter().map(|b| b.id).collect();

    match args.format {
        OutputFormat::Human => {
            println!("{name} {version}");
            println!("built-in scenarios: {}", builtin.join(", "));
        }
        OutputFormat::Json => {
            println!(
                "{}",
                json!({ "name": name, "version": version, "scenarios": builtin })
            );
        }
    }
}
