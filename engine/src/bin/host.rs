//! Headless host process: owns the journal of record for one directory
//! and serializes incoming peer edits into it (spec.md §6).

use clap::Parser;
use engine::{Config, ConfigRegistry, Host};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "host", about = "Headless journal host")]
struct Cli {
    /// Journal directory. Created if it doesn't exist.
    #[arg(long = "dir")]
    dir: PathBuf,

    /// Connect as a client of a remote host instead of serving locally.
    /// Not yet fully defined (spec.md §6).
    #[arg(long = "connect")]
    connect: Option<String>,
}

fn now_us() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_micros() as i64
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    if cli.connect.is_some() {
        tracing::error!("client mode (-connect) is not implemented yet");
        return ExitCode::FAILURE;
    }

    if let Err(e) = std::fs::create_dir_all(&cli.dir) {
        tracing::error!(error = %e, dir = %cli.dir.display(), "could not create journal directory");
        return ExitCode::FAILURE;
    }

    let registry = ConfigRegistry::new();
    let config_handle = registry.get(&cli.dir);
    let config: Config = config_handle.lock().unwrap().clone();

    let journal_path = cli.dir.join("journal.dojo");
    let mut host = match if journal_path.exists() {
        Host::open(&journal_path, &config)
    } else {
        Host::create(&journal_path, &config)
    } {
        Ok(h) => h,
        Err(e) => {
            tracing::error!(error = %e, "failed to open journal");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(dir = %cli.dir.display(), "host ready");

    loop {
        let did_work = match host.tick(now_us(), None, None) {
            Ok(did_work) => did_work,
            Err(e) => {
                tracing::error!(error = %e, "tick failed");
                return ExitCode::FAILURE;
            }
        };
        if !did_work {
            std::thread::sleep(std::time::Duration::from_micros(100));
        }
    }
}
