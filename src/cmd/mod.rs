//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module     | Commands handled                                  |
//! |------------|---------------------------------------------------|
//! | `serve`    | `Init`, `Serve`                                   |
//! | `records`  | `Submit`, `Start`, `Complete`, `Latest`, `Sessions` |
//! | `maintain` | `Sweep`, `Stats`                                  |
//! | `directory`| `Directory`, plus `--email` resolution            |
//! | `config`   | `Config`                                          |

pub mod config;
pub mod directory;
pub mod maintain;
pub mod records;
pub mod serve;

pub use config::cmd_config;
pub use directory::{Caller, DirectoryCommands, cmd_directory, resolve_caller};
pub use maintain::{cmd_stats, cmd_sweep};
pub use records::{cmd_complete, cmd_latest, cmd_sessions, cmd_start, cmd_submit};
pub use serve::{cmd_init, cmd_serve};

/// Print a value as pretty JSON on stdout.
pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
