use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use tick_median::{
    config::{default_config_path, parse_level, AppConfig},
    error::MedianError,
    runner::{self, TableBuilder},
    tick_log::{error, info, warn, LoggerGuard},
    ShutdownToken,
};

#[derive(Parser, Debug)]
#[command(name = "tick_median", version, about = "Streaming k-way merge of tick CSV files with an online price median")]
struct Cli
{
    /// Path to the TOML config. Defaults to config.toml next to the executable.
    #[arg(long, visible_alias = "cfg", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Overrides [log].level (off|error|warn|info|debug|trace).
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,
}

fn init_logger(config: &AppConfig, level: Option<&str>) -> Result<LoggerGuard, MedianError>
{
    let level_override = level.map(parse_level).transpose()?;
    config.log
          .logger_builder(level_override)?
          .try_init()
          .map_err(|e| MedianError::Logger(e.to_string()))
}

#[tokio::main]
async fn main() -> ExitCode
{
    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(default_config_path);

    let config = match AppConfig::from_file(&config_path) {
        | Ok(config) => config,
        | Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let _guard = match init_logger(&config, cli.log_level.as_deref()) {
        | Ok(guard) => guard,
        | Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    info!("[TickMedian] : config loaded from {}", config_path.display());

    let log_to_file = config.log.file.is_some();
    let shutdown = ShutdownToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("[TickMedian] : interrupt received, stopping");
                shutdown.cancel();
            }
        }
    });

    let outcome = tokio::task::spawn_blocking(move || runner::run(&config, &shutdown)).await;
    let failure = match outcome {
        | Ok(Ok(summary)) => {
            summary.table("Run").printstd();
            return ExitCode::SUCCESS;
        }
        | Ok(Err(e)) => e.to_string(),
        | Err(e) => format!("[TickMedian] : run aborted: {}", e),
    };

    error!("{}", failure);
    if log_to_file {
        eprintln!("{}", failure);
    }
    ExitCode::FAILURE
}
