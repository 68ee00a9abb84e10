//! Binary entrypoint for the USACO Treasure tracker.
//!
//! Commands:
//! - `init` - write a starter `config.toml` and an initial snapshot
//! - `status` - print the active player and the leaderboard
//! - `exec <command...>` - run one game command and exit
//! - `play` - interactive prompt reading commands from stdin
//!
//! See the library crate docs for module-level details: `usaco_treasure::`.
use anyhow::Result;
use clap::{Parser, Subcommand};
use log::{info, warn};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use usaco_treasure::config::Config;
use usaco_treasure::progress::{GameSession, ProgressionEngine};

#[derive(Parser)]
#[command(name = "usaco-treasure")]
#[command(about = "Coins, levels and treasure for USACO practice")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration and an initial snapshot
    Init,
    /// Show the active player and the leaderboard
    Status,
    /// Run a single game command, e.g. `exec complete 1-impl-1`
    Exec {
        #[arg(required = true, trailing_var_arg = true)]
        command: Vec<String>,
    },
    /// Interactive session on stdin/stdout
    Play,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Init = cli.command {
        init_logging(&None, cli.verbose);
        info!("Initializing new configuration");
        Config::create_default(&cli.config).await?;
        info!("Configuration file created at {}", cli.config);
        let config = Config::load(&cli.config).await?;
        let engine = open_engine(&config)?;
        if engine.persist() {
            info!(
                "Initial snapshot '{}' written to {}",
                config.storage.state_key, config.storage.data_dir
            );
        } else {
            warn!("Initial snapshot could not be written");
        }
        return Ok(());
    }

    let config = Config::load_or_default(&cli.config).await?;
    init_logging(&Some(config.clone()), cli.verbose);
    let engine = open_engine(&config)?;
    let mut session = GameSession::new(engine);

    match cli.command {
        Commands::Init => {}
        Commands::Status => {
            println!("{}", session.process_command("status"));
            println!();
            println!("{}", session.process_command("leaderboard"));
        }
        Commands::Exec { command } => {
            println!("{}", session.process_command(&command.join(" ")));
        }
        Commands::Play => {
            info!("Starting session v{}", env!("CARGO_PKG_VERSION"));
            run_interactive(&mut session).await?;
        }
    }

    Ok(())
}

fn open_engine(config: &Config) -> Result<ProgressionEngine> {
    let store = config.storage.open_store()?;
    Ok(ProgressionEngine::load(
        store,
        config.storage.state_key.clone(),
        config.progression.policy(),
    ))
}

async fn run_interactive(session: &mut GameSession) -> Result<()> {
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    stdout
        .write_all(b"USACO Treasure - type HELP for commands.\n")
        .await?;
    stdout.write_all(b"> ").await?;
    stdout.flush().await?;
    while let Some(line) = lines.next_line().await? {
        if !line.trim().is_empty() {
            let reply = session.process_command(&line);
            stdout.write_all(reply.trim_end().as_bytes()).await?;
            stdout.write_all(b"\n").await?;
        }
        if session.is_finished() {
            break;
        }
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
    }
    stdout.flush().await?;
    Ok(())
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity overrides the configured level
    let configured = config
        .as_ref()
        .and_then(|cfg| cfg.logging.level.parse::<log::LevelFilter>().ok())
        .unwrap_or(log::LevelFilter::Info);
    let base_level = match verbosity {
        0 => configured,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);

    let log_file = config
        .as_ref()
        .and_then(|cfg| cfg.logging.file.as_ref())
        .and_then(|path| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .ok()
        });

    match log_file {
        Some(f) => {
            let write_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));
            // Mirror to the console only when attached to a terminal
            let is_tty = atty::is(atty::Stream::Stderr);
            builder.format(move |fmt, record| {
                let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                let line = format!("{} [{}] {}", ts, record.level(), record.args());
                if let Ok(mut guard) = write_mutex.lock() {
                    let _ = writeln!(guard, "{}", line);
                }
                if is_tty {
                    writeln!(fmt, "{}", line)
                } else {
                    Ok(())
                }
            });
        }
        None => {
            builder.format(|fmt, record| {
                let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                writeln!(fmt, "{} [{}] {}", ts, record.level(), record.args())
            });
        }
    }
    let _ = builder.try_init();
}
