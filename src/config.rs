use clap::Parser;

use crate::movement::{DEFAULT_HYSTERESIS_M, DEFAULT_MIN_SAMPLE_INTERVAL, DEFAULT_PAIR_MAX_AGE};
use crate::proximity::{Thresholds, DEFAULT_COLLISION_M, DEFAULT_WARNING_M};

/// Proximity Server Configuration
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Listen on [host:]port for connections from vehicle trackers.
    #[arg(long, value_name = "ADDR")]
    pub client_listen: Vec<String>,

    /// Set the server MOTD sent to clients.
    #[arg(long, default_value = "")]
    pub motd: String,

    /// Directory for the vehicles.json snapshot
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub work_dir: String,

    /// Distance in meters at or below which a peer is a collision
    #[arg(long, value_name = "METERS", default_value_t = DEFAULT_COLLISION_M)]
    pub collision_meters: f64,

    /// Distance in meters at or below which a peer is a warning
    #[arg(long, value_name = "METERS", default_value_t = DEFAULT_WARNING_M)]
    pub warning_meters: f64,

    /// Minimum seconds between samples used for movement trends
    #[arg(long, value_name = "SECONDS", default_value_t = DEFAULT_MIN_SAMPLE_INTERVAL)]
    pub min_sample_interval: f64,

    /// Distance change in meters below which no movement trend is reported
    #[arg(long, value_name = "METERS", default_value_t = DEFAULT_HYSTERESIS_M)]
    pub movement_hysteresis: f64,

    /// Seconds after which unrefreshed pair trend records are swept
    #[arg(long, value_name = "SECONDS", default_value_t = DEFAULT_PAIR_MAX_AGE)]
    pub pair_max_age: f64,

    /// Status logging interval in seconds, -1 to disable
    #[arg(long, default_value_t = 15)]
    pub status_interval: i32,

    /// Verbose logging (DEBUG level)
    #[arg(long, short, default_value_t = false)]
    pub verbose: bool,
}

impl Config {
    pub fn thresholds(&self) -> Thresholds {
        Thresholds::new(self.collision_meters, self.warning_meters)
    }
}
