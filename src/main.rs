use std::{fs::File, process::ExitCode, time::Duration};

use accel_tablet_moded::{application::Application, cli::Cli, config::ConfigManager};
use anyhow::{Context, Result, anyhow};
use clap::Parser;
use daemonize::Daemonize;
use log::{LevelFilter, error};
use syslog::{BasicLogger, Facility, Formatter3164};

const LOG_FILE: &str = "/var/tmp/accel-tablet-moded.log";

fn init_log(level: LevelFilter) -> Result<()> {
    syslog::unix(Formatter3164 {
        facility: Facility::LOG_DAEMON,
        hostname: None,
        process: "accel-tablet-moded".into(),
        pid: 0,
    })
    .map_err(|e| anyhow!("{e}"))
    .and_then(|logger| {
        log::set_boxed_logger(Box::new(BasicLogger::new(logger)))
            .map(|_| log::set_max_level(level))
            .map_err(|e| anyhow!("{e}"))
    })
}

fn into_daemon() -> Result<()> {
    File::create(LOG_FILE)
        .and_then(|out| Ok((out.try_clone()?, out)))
        .map_err(|e| anyhow!("{e}"))
        .and_then(|(stderr, stdout)| {
            Daemonize::new()
                .stdout(stdout)
                .stderr(stderr)
                .start()
                .map_err(|e| anyhow!("{e}"))
        })
}

fn run(cli: Cli) -> Result<()> {
    if cli.daemonize {
        into_daemon().context("Failed to daemonize")?;
    }

    // The runtime must not exist before forking.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;

    let result = runtime.block_on(async {
        let config_manager = ConfigManager::load(cli.config).await?;
        Application::builder()
            .with_config_manager(config_manager)
            .build()?
            .run()
            .await
    });

    // Don't wait forever on a control loop stuck in a blocking call.
    runtime.shutdown_timeout(Duration::from_secs(1));
    result
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_log(cli.log_level()) {
        eprintln!("Warning: syslog unavailable, continuing without logging: {e}");
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
