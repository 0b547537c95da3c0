use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use blockd::access::AuthError;
use blockd::backup::BackupAgent;
use blockd::config::Config;
use blockd::notify::BroadcastNotifier;
use blockd::provider::{BlockedNumberProvider, CallArgs, ContentValues, ProviderError};
use blockd::store::create_storage;
use blockd::telemetry::{init_tracing, TracingConfig};

#[derive(Parser, Debug)]
#[command(name = "blockd")]
#[command(author, version, about = "Blocked phone number store and call-blocking decisions")]
struct Args {
    /// Path to config file (defaults apply when absent)
    #[arg(short, long, value_name = "FILE", env = "BLOCKD_CONFIG")]
    config: Option<PathBuf>,

    /// Increase log verbosity (repeatable)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Add a number to the block list
    Insert { number: String },

    /// Remove a number (by original or canonical form) from the block list
    Unblock { number: String },

    /// List blocked numbers
    List {
        /// Single entry by id
        #[arg(long, conflicts_with = "filter")]
        id: Option<u64>,

        /// Filter expression, e.g. "original_number = ? OR e164_number = ?"
        #[arg(long)]
        filter: Option<String>,

        /// Positional filter argument (repeatable)
        #[arg(long = "arg", value_name = "VALUE")]
        args: Vec<String>,

        /// Sort order, e.g. "e164_number DESC"
        #[arg(long)]
        sort: Option<String>,
    },

    /// Whether a number is on the block list
    IsBlocked { number: String },

    /// Full block decision for an incoming call
    ShouldBlock {
        number: String,

        /// Presentation code (1 allowed, 2 restricted, 3 unknown, 4 payphone, 5 unavailable)
        #[arg(long)]
        presentation: Option<i32>,

        /// Whether the caller is a saved contact
        #[arg(long, action = ArgAction::Set)]
        contact: Option<bool>,
    },

    /// Record an emergency contact, suspending blocking
    NotifyEmergency,

    /// Resume blocking
    EndSuppression,

    /// Show suppression state and notification decision
    Status,

    /// Read an enhanced blocking setting
    GetSetting { key: String },

    /// Write an enhanced blocking setting
    SetSetting {
        key: String,
        #[arg(action = ArgAction::Set)]
        value: bool,
    },

    /// Whether the current user may manage the block list
    CanBlock,

    /// Write the block list as a versioned JSON backup
    Backup {
        /// Output file (stdout when absent)
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },

    /// Restore entries from a backup file
    Restore { file: PathBuf },

    /// Validate config and exit
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    init_tracing(&TracingConfig::from(&config.telemetry).with_verbosity(args.verbose))?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?args.config,
        "starting blockd"
    );

    if let Command::Validate = args.command {
        config.validate()?;
        println!("{}", json!({ "valid": true }));
        return Ok(());
    }

    let notifier = BroadcastNotifier::new(16);
    let mut changes = notifier.subscribe();
    let watcher = tokio::spawn(async move {
        while let Ok(event) = changes.recv().await {
            info!(event = ?event, "state changed");
        }
    });

    let storage = create_storage(&config.store).context("failed to open storage")?;
    let agent = Arc::new(BackupAgent::new(storage.clone(), notifier.clone()));
    let provider = BlockedNumberProvider::from_config(&config, storage.clone(), agent.clone());

    let output = run(&provider, &agent, args.command);

    storage.flush().context("failed to flush storage")?;
    if let Some(path) = &config.backup.path {
        if agent.needs_backup() {
            write_backup(&agent, path)?;
        }
    }
    drop(provider);
    drop(agent);
    drop(notifier);
    let _ = watcher.await;

    match output {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        Err(e) => match e.downcast_ref::<ProviderError>() {
            Some(err) => {
                warn!(kind = err.kind(), error = %err, "command failed");
                println!(
                    "{}",
                    serde_json::to_string_pretty(&json!({
                        "error": err.kind(),
                        "message": err.to_string(),
                    }))?
                );
                std::process::exit(if err.is_security() { 2 } else { 1 });
            }
            None => Err(e),
        },
    }
}

fn write_backup(agent: &BackupAgent, path: &Path) -> Result<()> {
    let data = agent.backup()?;
    std::fs::write(path, data)
        .with_context(|| format!("failed to write backup to {}", path.display()))?;
    info!(path = %path.display(), "backup written");
    Ok(())
}

fn run(
    provider: &BlockedNumberProvider,
    agent: &BackupAgent,
    command: Command,
) -> Result<serde_json::Value> {
    let value = match command {
        Command::Insert { number } => {
            let id = provider.insert("blocked", &ContentValues::with_original(number))?;
            json!({ "id": id })
        }
        Command::Unblock { number } => {
            serde_json::to_value(provider.call("unblock", Some(number.as_str()), &CallArgs::default())?)?
        }
        Command::List {
            id,
            filter,
            args,
            sort,
        } => {
            let route = match id {
                Some(id) => format!("blocked/{}", id),
                None => "blocked".to_string(),
            };
            let rows: Vec<_> = provider
                .query(&route, filter.as_deref(), &args, sort.as_deref(), None)?
                .collect();
            serde_json::to_value(rows)?
        }
        Command::IsBlocked { number } => serde_json::to_value(provider.call(
            "is_blocked",
            Some(number.as_str()),
            &CallArgs::default(),
        )?)?,
        Command::ShouldBlock {
            number,
            presentation,
            contact,
        } => {
            let call_args = CallArgs {
                presentation,
                contact_exists: contact,
                ..Default::default()
            };
            serde_json::to_value(provider.call(
                "should_system_block_number",
                Some(number.as_str()),
                &call_args,
            )?)?
        }
        Command::NotifyEmergency => {
            let status = provider.notify_emergency_contact()?;
            json!({
                "is_suppressed": status.is_suppressed,
                "suppressed_until": status.until_millis,
            })
        }
        Command::EndSuppression => {
            json!({ "ended": provider.end_block_suppression()? })
        }
        Command::Status => {
            let status = provider.get_block_suppression_status()?;
            json!({
                "is_suppressed": status.is_suppressed,
                "suppressed_until": status.until_millis,
                "show_emergency_notification": provider.should_show_emergency_call_notification()?,
            })
        }
        Command::GetSetting { key } => {
            json!({ "key": key, "enabled": provider.get_enhanced_block_setting(&key)? })
        }
        Command::SetSetting { key, value } => {
            provider.set_enhanced_block_setting(&key, value)?;
            json!({ "key": key, "enabled": value })
        }
        Command::CanBlock => json!({ "can_block": provider.can_current_user_block_numbers() }),
        Command::Backup { out } => match out {
            Some(path) => {
                write_backup(agent, &path)?;
                json!({ "path": path, "entries": agent.snapshot()?.entries.len() })
            }
            None => serde_json::to_value(agent.snapshot()?)?,
        },
        Command::Restore { file } => {
            if !provider.can_current_user_block_numbers() {
                return Err(ProviderError::from(AuthError::UserNotPermitted).into());
            }
            let data = std::fs::read(&file)
                .with_context(|| format!("failed to read backup {}", file.display()))?;
            serde_json::to_value(agent.restore(&data)?)?
        }
        Command::Validate => json!({ "valid": true }),
    };
    Ok(value)
}
