use clap::Parser;
use log::LevelFilter;
use std::path::PathBuf;

/// accel-tablet-moded: emits SW_TABLET_MODE from the hinge angle of convertible laptops
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Log sensor readings and angles on every iteration
    #[arg(short = 'd', long = "debug")]
    pub debug: bool,

    /// YAML config file path (default: standard locations, then built-in defaults)
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Detach from the terminal, output goes to /var/tmp/accel-tablet-moded.log
    #[arg(long = "daemonize")]
    pub daemonize: bool,
}

impl Cli {
    pub fn log_level(&self) -> LevelFilter {
        if self.debug {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        }
    }
}
