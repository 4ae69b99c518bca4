use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        let key = k.trim();
        if key.is_empty() {
            return Err(anyhow!("empty key in override: {s}"));
        }
        Ok(Self {
            key: key.to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "taskdeck",
    version,
    about = "Taskdeck: filter, track and bulk-edit your tasks",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    /// Override a config key, e.g. `--rc store.backend=memory`.
    #[arg(
        long = "rc",
        value_name = "KEY=VALUE",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "config", value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    #[arg(long = "data", value_name = "DIR", global = true)]
    pub data: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    /// Show tasks matching the search and filters.
    List {
        #[arg(short = 's', long)]
        search: Option<String>,
        #[arg(short = 'c', long)]
        category: Option<String>,
        #[arg(short = 'p', long)]
        priority: Option<String>,
        #[arg(long)]
        status: Option<String>,
    },

    /// Create a task.
    Add {
        #[arg(required = true, num_args = 1..)]
        title: Vec<String>,
        #[arg(short = 'd', long)]
        description: Option<String>,
        #[arg(short = 'c', long)]
        category: Option<String>,
        #[arg(short = 'p', long)]
        priority: Option<String>,
        /// YYYY-MM-DD, today, tomorrow, a weekday, +Nd or +Nw.
        #[arg(long)]
        due: Option<String>,
    },

    /// Flip a task between pending and completed.
    Toggle { id: String },

    Delete { id: String },

    /// Mark several tasks completed at once.
    Complete {
        #[arg(required = true, num_args = 1..)]
        ids: Vec<String>,
    },

    /// Delete several tasks at once.
    Remove {
        #[arg(required = true, num_args = 1..)]
        ids: Vec<String>,
    },

    /// Today's progress and overall counts.
    Stats,

    Categories,
}

impl CliCommand {
    pub fn name(&self) -> &'static str {
        match self {
            CliCommand::List { .. } => "list",
            CliCommand::Add { .. } => "add",
            CliCommand::Toggle { .. } => "toggle",
            CliCommand::Delete { .. } => "delete",
            CliCommand::Complete { .. } => "complete",
            CliCommand::Remove { .. } => "remove",
            CliCommand::Stats => "stats",
            CliCommand::Categories => "categories",
        }
    }
}

impl Default for CliCommand {
    fn default() -> Self {
        CliCommand::List {
            search: None,
            category: None,
            priority: None,
            status: None,
        }
    }
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{CliCommand, GlobalCli, KeyVal};

    #[test]
    fn key_val_requires_equals() {
        let kv: KeyVal = "store.backend = memory".parse().unwrap();
        assert_eq!(kv.key, "store.backend");
        assert_eq!(kv.value, "memory");
        assert!("color".parse::<KeyVal>().is_err());
        assert!("=on".parse::<KeyVal>().is_err());
    }

    #[test]
    fn no_subcommand_means_list() {
        let cli = GlobalCli::parse_from(["taskdeck", "-vv"]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.command.unwrap_or_default(), CliCommand::default());
    }

    #[test]
    fn global_flags_follow_subcommands() {
        let cli = GlobalCli::parse_from([
            "taskdeck",
            "add",
            "Buy",
            "milk",
            "--priority",
            "high",
            "--rc",
            "store.backend=memory",
            "--due",
            "tomorrow",
        ]);
        assert_eq!(cli.rc_overrides.len(), 1);
        match cli.command {
            Some(CliCommand::Add {
                title,
                priority,
                due,
                ..
            }) => {
                assert_eq!(title, vec!["Buy", "milk"]);
                assert_eq!(priority.as_deref(), Some("high"));
                assert_eq!(due.as_deref(), Some("tomorrow"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn bulk_commands_take_many_ids() {
        let cli = GlobalCli::parse_from(["taskdeck", "complete", "ab12", "cd34"]);
        assert_eq!(
            cli.command,
            Some(CliCommand::Complete {
                ids: vec!["ab12".to_string(), "cd34".to_string()]
            })
        );
        assert!(GlobalCli::try_parse_from(["taskdeck", "remove"]).is_err());
    }
}
