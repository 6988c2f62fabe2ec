// In crates/app-config/src/types.rs

use serde::Deserialize;

use indicators::IndicatorSettings;
use strategies::MACrossoverSettings;

#[derive(Deserialize, Debug, Clone)]
pub struct Settings {
    /// The application's general settings.
    pub app: AppSettings,
    /// Settings for the database connection.
    pub database: DatabaseSettings,
    /// Window lengths of the moving averages and the oscillator.
    #[serde(default)]
    pub indicators: IndicatorSettings,
    /// RSI gates of the crossover rule.
    #[serde(default)]
    pub strategy: MACrossoverSettings,
    #[serde(default)]
    pub pipeline: PipelineSettings,
}

#[derive(Deserialize, Debug, Clone)]
pub struct AppSettings {
    /// The environment the application is running in (e.g., "development", "production").
    pub environment: String,
    /// The log level for the application.
    pub log_level: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct DatabaseSettings {
    /// The connection URL for the PostgreSQL database.
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

/// Runtime knobs of the per-symbol pipelines.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Processed bars between two checkpoints of a symbol's state.
    #[serde(default = "default_checkpoint_every")]
    pub checkpoint_every: usize,
    /// Bars requested from the bar store per page.
    #[serde(default = "default_fetch_batch_size")]
    pub fetch_batch_size: usize,
    /// Recently processed bars remembered to recognise re-delivered duplicates.
    #[serde(default = "default_duplicate_lookback")]
    pub duplicate_lookback: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            checkpoint_every: default_checkpoint_every(),
            fetch_batch_size: default_fetch_batch_size(),
            duplicate_lookback: default_duplicate_lookback(),
        }
    }
}

/// Helper functions for serde defaults
fn default_max_connections() -> u32 { 5 }
fn default_checkpoint_every() -> usize { 500 }
fn default_fetch_batch_size() -> usize { 1000 }
fn default_duplicate_lookback() -> usize { 64 }
