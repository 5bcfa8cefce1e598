use std::env;
use std::io::Write;
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use nvram_lib::{Config, Mode, Nvram, NvramError};
use tracing::debug;

// Environment contract shared with existing tooling; names are stable.
const ENV_SYSTEM_A: &str = "NVRAM_SYSTEM_A";
const ENV_SYSTEM_B: &str = "NVRAM_SYSTEM_B";
const ENV_USER_A: &str = "NVRAM_USER_A";
const ENV_USER_B: &str = "NVRAM_USER_B";
const ENV_SYSTEM_UNLOCK: &str = "NVRAM_SYSTEM_UNLOCK";
const ENV_DEBUG: &str = "NVRAM_DEBUG";

#[derive(Parser, Debug)]
#[command(name = "nvram")]
#[command(version)]
#[command(about = "Redundant non-volatile key-value store", long_about = None)]
struct Args {
    /// Operate on the system namespace instead of the user namespace
    #[arg(long = "sys")]
    sys: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Assign VALUE to KEY, adding the entry if it does not exist
    Set { key: String, value: String },
    /// Write the value stored under KEY to stdout
    Get { key: String },
    /// Remove the entry stored under KEY
    Delete { key: String },
    /// Write all entries to stdout as key=value lines
    List,
}

/// Build the store configuration from the environment. An unset or empty
/// slot variable disables that slot.
fn resolve_config(lookup: impl Fn(&str) -> Option<String>) -> Config {
    let path = |name: &str| {
        lookup(name)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
    };
    Config {
        system_a: path(ENV_SYSTEM_A),
        system_b: path(ENV_SYSTEM_B),
        user_a: path(ENV_USER_A),
        user_b: path(ENV_USER_B),
        system_unlock: lookup(ENV_SYSTEM_UNLOCK).filter(|v| !v.is_empty()),
    }
}

fn init_logging() {
    // Any value that parses to a nonzero integer enables debug output.
    let enabled = env::var(ENV_DEBUG)
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(0)
        != 0;
    let filter = if enabled { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(args: Args) -> Result<(), NvramError> {
    let mode = if args.sys { Mode::System } else { Mode::User };
    let nvram = Nvram::open(resolve_config(|name| env::var(name).ok()));

    match args.cmd {
        Command::Set { key, value } => {
            debug!("setting: {}={}", key, value);
            nvram.set(mode, &key, &value)
        }
        Command::Get { key } => {
            debug!("getting: {}", key);
            let value = nvram.get(mode, &key)?;
            println!("{}", value);
            Ok(())
        }
        Command::Delete { key } => {
            debug!("deleting: {}", key);
            nvram.delete(mode, &key)
        }
        Command::List => {
            debug!("listing all");
            // One buffered write so a failure cannot leave half a listing.
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            for (key, value) in nvram.list(mode) {
                writeln!(out, "{}={}", key, value)?;
            }
            Ok(())
        }
    }
}

fn main() {
    let args = Args::parse();
    init_logging();

    if let Err(e) = run(args) {
        eprintln!("{}", e);
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn all_slots_resolved() {
        let config = resolve_config(lookup(&[
            (ENV_SYSTEM_A, "/tmp/sa"),
            (ENV_SYSTEM_B, "/tmp/sb"),
            (ENV_USER_A, "/tmp/ua"),
            (ENV_USER_B, "/tmp/ub"),
            (ENV_SYSTEM_UNLOCK, "16440"),
        ]));
        assert_eq!(config.system_a, Some(PathBuf::from("/tmp/sa")));
        assert_eq!(config.system_b, Some(PathBuf::from("/tmp/sb")));
        assert_eq!(config.user_a, Some(PathBuf::from("/tmp/ua")));
        assert_eq!(config.user_b, Some(PathBuf::from("/tmp/ub")));
        assert_eq!(config.system_unlock.as_deref(), Some("16440"));
    }

    #[test]
    fn unset_slot_is_disabled() {
        let config = resolve_config(lookup(&[(ENV_USER_A, "/tmp/ua")]));
        assert_eq!(config.user_a, Some(PathBuf::from("/tmp/ua")));
        assert!(config.user_b.is_none());
        assert!(config.system_a.is_none());
        assert!(config.system_unlock.is_none());
    }

    #[test]
    fn empty_slot_is_disabled() {
        let config = resolve_config(lookup(&[
            (ENV_USER_A, "/tmp/ua"),
            (ENV_USER_B, ""),
            (ENV_SYSTEM_UNLOCK, ""),
        ]));
        assert_eq!(config.user_a, Some(PathBuf::from("/tmp/ua")));
        assert!(config.user_b.is_none());
        assert!(config.system_unlock.is_none());
    }
}
