use anyhow::Result;
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use secshell::approval::{ApprovalGate, ConsoleConfirmer, Confirmer};
use secshell::commands::{execute_command, CommandParser, CommandResult, ShellState};
use secshell::config::Config;
use secshell::error::SessionError;
use secshell::permissions::PermissionManager;
use secshell::session::{format_sessions_table, SessionManager};
use secshell::tools::ToolRunner;

#[derive(Parser)]
#[command(name = "secshell")]
#[command(about = "Security assistant shell with durable session history", long_about = None)]
struct Cli {
    /// Path to the config file (default: <config dir>/secshell/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive session
    Chat {
        /// Resume an existing session (id or any part of it)
        #[arg(short, long)]
        resume: Option<String>,
        /// Operator name recorded with the session
        #[arg(short, long)]
        user: Option<String>,
    },
    /// Inspect and manage saved sessions
    Sessions {
        #[command(subcommand)]
        action: SessionsAction,
    },
    /// Show or initialize the configuration
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },
}

#[derive(Subcommand)]
enum SessionsAction {
    /// List the most recent sessions
    List {
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
    /// Find sessions whose last request mentions the query
    Search {
        query: String,
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
    /// Print a session's transcript
    Show { id: String },
    /// Delete a session's log and memory
    Delete {
        id: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Statistics over saved sessions
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "secshell=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    let config_path = match cli.config {
        Some(path) => path,
        None => Config::config_path()?,
    };
    let config = Config::load_from(&config_path)?;

    match cli.command {
        Commands::Chat { resume, user } => {
            run_chat(config, resume, user.unwrap_or_else(current_user)).await?;
        }
        Commands::Sessions { action } => {
            handle_sessions(config, action)?;
        }
        Commands::Config { show } => {
            handle_config(&config, &config_path, show)?;
        }
    }

    Ok(())
}

fn current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}

fn session_manager(config: &Config) -> SessionManager {
    let permissions = PermissionManager::new(config.permissions.clone(), &config.tools);
    SessionManager::new(config.storage.clone(), Box::new(permissions))
}

async fn run_chat(config: Config, resume: Option<String>, user: String) -> Result<()> {
    let manager = session_manager(&config);

    // A resumed session keeps the operator it was recorded under
    let (memory, resumed, user) = match resume {
        Some(id) => {
            let (memory, summary) = manager.resume(&id)?;
            let user = summary.user.clone();
            (memory, Some(summary), user)
        }
        None => (manager.start(&user)?, None, user),
    };

    let mut state = ShellState {
        manager,
        memory,
        gate: ApprovalGate::new(config.approval.clone()),
        runner: ToolRunner::new(config.tools.clone(), std::env::current_dir()?),
        confirmer: Box::new(ConsoleConfirmer),
        user,
    };

    println!("🛡️  secshell - security assistant shell");
    if PermissionManager::is_root() {
        println!("⚠️  Running as root: captures and raw scans are available");
    } else {
        println!("ℹ️  Running as a regular user: some captures may need sudo");
    }
    match resumed {
        Some(summary) => println!("{}", summary),
        None => println!("📋 New session: {}", state.session_id()),
    }
    println!("Type /help for commands, /quit to exit\n");

    loop {
        print!("\n> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }

        let parsed = CommandParser::parse(&input);
        match execute_command(parsed, &mut state).await {
            Ok(CommandResult::Continue) => {}
            Ok(CommandResult::Message(message)) => println!("{}", message),
            Ok(CommandResult::Exit) => break,
            Err(e) => {
                tracing::error!("Command failed: {:#}", e);
                eprintln!("❌ {:#}", e);
            }
        }
    }

    println!("\n👋 Session {} saved. Goodbye!", state.session_id());
    Ok(())
}

fn handle_sessions(config: Config, action: SessionsAction) -> Result<()> {
    let manager = session_manager(&config);

    match action {
        SessionsAction::List { limit } => {
            print!("{}", format_sessions_table(&manager.list(limit)?));
        }
        SessionsAction::Search { query, limit } => {
            let sessions = manager.search(&query, limit)?;
            if sessions.is_empty() {
                println!("🔍 No sessions mention '{}'", query);
            } else {
                print!("{}", format_sessions_table(&sessions));
            }
        }
        SessionsAction::Show { id } => {
            let loaded = manager.load(&id)?;
            println!(
                "📋 {} ({} messages, user {})",
                loaded.summary.session_id,
                loaded.message_count(),
                loaded.summary.user
            );
            for message in &loaded.messages {
                println!(
                    "\n[{}] {}\n{}",
                    message.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    message.role.label(),
                    message.content
                );
            }
        }
        SessionsAction::Delete { id, yes } => {
            let matched = manager.index().matching_session_ids(&id);
            if matched.len() > 1 {
                println!("⚠️  '{}' matches {} sessions, use a full session ID:", id, matched.len());
                for session_id in &matched {
                    println!("  {}", session_id);
                }
                return Ok(());
            }

            if !yes {
                let mut console = ConsoleConfirmer;
                let answer = console.ask(&format!("Delete session {}? [y/n]: ", id))?;
                let confirmed = answer
                    .as_deref()
                    .and_then(secshell::approval::parse_answer)
                    .unwrap_or(false);
                if !confirmed {
                    println!("Deletion cancelled.");
                    return Ok(());
                }
            }

            match manager.delete(&id) {
                Ok(report) => {
                    for path in &report.removed {
                        println!("🗑️  {}", path.display());
                    }
                    for (path, err) in &report.failed {
                        eprintln!("⚠️  Could not delete {}: {}", path.display(), err);
                    }
                }
                Err(SessionError::NotFound { id }) => {
                    println!("❌ Session not found: {}", id);
                }
                Err(e) => return Err(e.into()),
            }
        }
        SessionsAction::Stats => {
            print!("{}", manager.statistics().format());
        }
    }

    Ok(())
}

fn handle_config(config: &Config, config_path: &Path, show: bool) -> Result<()> {
    if show {
        println!("# {}", config_path.display());
        println!("{}", toml::to_string_pretty(config)?);
        return Ok(());
    }

    if config_path.exists() {
        println!("Config file: {}", config_path.display());
    } else {
        config.save_to(config_path)?;
        println!("✓ Wrote default configuration to {}", config_path.display());
    }
    Ok(())
}
