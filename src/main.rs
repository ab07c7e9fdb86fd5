//! Binary entrypoint for the arcomd controller daemon.
//!
//! Commands:
//! - `start [--device <path>] [--port <n>] [--simulate] [--pid-file <path>]` - serve the RPC interface
//! - `init` - write a starter `arcomd.toml`
//! - `passwd [--user <call>]` - print a credential line for the password file
//!
//! See the library crate docs for module-level details: `arcomd::`.
use std::io::Write;
use std::path::Path;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use log::{error, info};

use arcomd::auth::credential_hash;
use arcomd::config::Config;
use arcomd::daemon::Daemon;
use arcomd::error::StartupError;

#[derive(Parser)]
#[command(name = "arcomd")]
#[command(about = "Remote control daemon for an Arcom RC210 repeater controller")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "arcomd.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the controller daemon
    Start {
        /// Serial device of the controller (e.g., /dev/ttyUSB0)
        #[arg(short, long)]
        device: Option<String>,

        /// Listen port for the RPC interface
        #[arg(short, long)]
        port: Option<u16>,

        /// Do not open the device; every command reports success
        #[arg(long)]
        simulate: bool,

        /// PID file used as a single-instance lock
        #[arg(long)]
        pid_file: Option<String>,
    },
    /// Write a default configuration file
    Init,
    /// Generate a `user:hash` line for the password file
    Passwd {
        /// Operator call sign; prompted for when omitted
        #[arg(short, long)]
        user: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        let code = e
            .downcast_ref::<StartupError>()
            .map(StartupError::exit_code)
            .unwrap_or(1);
        error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Start {
            device,
            port,
            simulate,
            pid_file,
        } => {
            let mut config = match Config::load(&cli.config).await {
                Ok(config) => config,
                Err(e) => {
                    init_logging(None, cli.verbose);
                    return Err(StartupError::Config(e.to_string()).into());
                }
            };
            if let Some(device) = device {
                config.serial.device = device;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if pid_file.is_some() {
                config.server.pid_file = pid_file;
            }

            init_logging(Some(&config), cli.verbose);
            info!("Starting arcomd v{}", env!("CARGO_PKG_VERSION"));

            let daemon = Daemon::start(&config, simulate)?;
            daemon.run().await?;
        }
        Commands::Init => {
            init_logging(None, cli.verbose);
            if Path::new(&cli.config).exists() {
                return Err(anyhow!(
                    "{} already exists, refusing to overwrite",
                    cli.config
                ));
            }
            Config::create_default(&cli.config).await?;
            info!("Configuration file created at {}", cli.config);
        }
        Commands::Passwd { user } => {
            let user = match user {
                Some(user) => user,
                None => prompt_line("Call sign: ")?,
            };
            if user.is_empty() || user.contains(':') {
                return Err(anyhow!("user must be non-empty and must not contain ':'"));
            }
            // Prompt twice without echo
            let pass1 = rpassword::prompt_password("New password: ")?;
            if pass1.is_empty() {
                return Err(anyhow!("password must not be empty"));
            }
            let pass2 = rpassword::prompt_password("Confirm password: ")?;
            if pass1 != pass2 {
                return Err(anyhow!("passwords do not match"));
            }
            println!("{}:{}", user, credential_hash(&user, &pass1));
        }
    }

    Ok(())
}

fn prompt_line(prompt: &str) -> Result<String> {
    print!("{prompt}");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// Log to the configured file (and the console when attached to a TTY).
/// Records with target `security` are also appended to the security log.
fn init_logging(config: Option<&Config>, verbosity: u8) {
    let mut builder = env_logger::Builder::new();
    // CLI verbosity overrides the configured level
    let base_level = match verbosity {
        0 => config
            .and_then(|c| c.logging.level.parse().ok())
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);

    let log_file = config
        .and_then(|c| c.logging.file.as_ref())
        .and_then(|path| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .ok()
        })
        .map(|f| std::sync::Arc::new(std::sync::Mutex::new(f)));
    let security_path = config.and_then(|c| c.logging.security_file.clone());
    let is_tty = atty::is(atty::Stream::Stdout);

    builder.format(move |fmt, record| {
        let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
        let line = format!("{} [{}] {}", ts, record.level(), record.args());

        if let Some(file) = &log_file {
            if let Ok(mut guard) = file.lock() {
                let _ = writeln!(guard, "{}", line);
            }
        }

        if record.target() == "security" {
            if let Some(ref sec_path) = security_path {
                if let Ok(mut sf) = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(sec_path)
                {
                    let _ = writeln!(sf, "{}", line);
                }
            }
        }

        // Running detached with a log file: don't duplicate into stdout
        if log_file.is_none() || is_tty {
            writeln!(fmt, "{}", line)
        } else {
            Ok(())
        }
    });
    let _ = builder.try_init();
}
