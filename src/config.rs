//! Configuration and CLI argument handling

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::{
    engine::{PersistOptions, TimerOptions},
    state::TimerMode,
    storage::FileStorage,
};

/// Timer direction as given on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Countdown,
    Countup,
}

impl From<ModeArg> for TimerMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Countdown => TimerMode::Countdown,
            ModeArg::Countup => TimerMode::Countup,
        }
    }
}

/// CLI argument parsing structure
#[derive(Debug, Parser)]
#[command(name = "anchor-timer")]
#[command(about = "Serve a persistent countdown/countup timer over HTTP")]
#[command(version)]
pub struct Config {
    /// Port to bind the server to
    #[arg(short, long, default_value = "20554")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Persistence key; servers sharing key and directory share the timer
    #[arg(short, long, default_value = "default")]
    pub key: String,

    /// Directory holding timer files (defaults to $ANCHOR_TIMER_DIR or the temp dir)
    #[arg(long)]
    pub store_dir: Option<PathBuf>,

    /// Count down to zero or up from zero
    #[arg(short, long, value_enum, default_value = "countdown")]
    pub mode: ModeArg,

    /// Reference duration in milliseconds
    #[arg(short, long)]
    pub duration_ms: Option<i64>,

    /// Tick period in milliseconds
    #[arg(short, long, default_value = "1000")]
    pub interval_ms: i64,

    /// Start right away when nothing was restored
    #[arg(long)]
    pub auto_start: bool,

    /// Follow changes made by other servers on the same key
    #[arg(long)]
    pub cross_tab: bool,

    /// Stop a countup timer once it reaches the duration
    #[arg(long)]
    pub stop_at_duration: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }

    /// Timer options described by the arguments, without callbacks
    pub fn timer_options(&self) -> TimerOptions {
        let mut persist = PersistOptions::new(self.key.clone()).cross_tab(self.cross_tab);
        if let Some(dir) = &self.store_dir {
            persist = persist.adapter(FileStorage::new(dir, &self.key));
        }

        let mut options = TimerOptions::new(self.mode.into())
            .auto_start(self.auto_start)
            .interval_ms(self.interval_ms)
            .stop_at_duration(self.stop_at_duration)
            .persist(persist);
        options.duration_ms = self.duration_ms;
        options
    }
}
