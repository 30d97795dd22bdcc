use anyhow::{Context, Result};
use chrono::Duration;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use taskace_core::{LifecyclePolicy, SessionConfig};

use crate::state::ensure_taskace_home;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub log: LogSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    /// IANA zone, e.g. "America/Chicago".
    pub timezone: String,
    pub horizon_days: u32,
    pub undo_window_secs: i64,
    pub stale_after_hours: i64,
    pub sweep_interval_minutes: i64,
    pub completion_points: u32,
}

impl Default for EngineSection {
    fn default() -> Self {
        let policy = LifecyclePolicy::default();
        Self {
            timezone: "UTC".to_string(),
            horizon_days: taskace_core::DEFAULT_HORIZON_DAYS,
            undo_window_secs: policy.undo_window.num_seconds(),
            stale_after_hours: policy.stale_after.num_hours(),
            sweep_interval_minutes: policy.sweep_interval.num_minutes(),
            completion_points: policy.completion_reward,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSection {
    /// Filter used when RUST_LOG is unset.
    pub level: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

impl Config {
    pub fn timezone(&self) -> Result<Tz> {
        self.engine
            .timezone
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid timezone in config: {}", self.engine.timezone))
    }

    pub fn session_config(&self) -> Result<SessionConfig> {
        let e = &self.engine;
        for (key, value) in [
            ("undo_window_secs", e.undo_window_secs),
            ("stale_after_hours", e.stale_after_hours),
            ("sweep_interval_minutes", e.sweep_interval_minutes),
        ] {
            if value <= 0 {
                anyhow::bail!("engine.{key} must be positive, got {value}");
            }
        }
        if e.horizon_days == 0 {
            anyhow::bail!("engine.horizon_days must be positive");
        }

        Ok(SessionConfig {
            timezone: self.timezone()?,
            horizon_days: e.horizon_days,
            policy: LifecyclePolicy {
                undo_window: Duration::seconds(e.undo_window_secs),
                stale_after: Duration::hours(e.stale_after_hours),
                sweep_interval: Duration::minutes(e.sweep_interval_minutes),
                completion_reward: e.completion_points,
            },
        })
    }
}

pub fn config_path() -> Result<PathBuf> {
    Ok(ensure_taskace_home()?.join("config.toml"))
}

pub fn load_config() -> Result<Config> {
    load_config_from(&config_path()?)
}

pub fn load_config_from(p: &Path) -> Result<Config> {
    if !p.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(p).with_context(|| format!("read {}", p.display()))?;
    toml::from_str(&s).with_context(|| format!("parse {}", p.display()))
}

pub fn save_config_to(p: &Path, cfg: &Config) -> Result<()> {
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(())
}

pub fn init_config() -> Result<()> {
    let p = config_path()?;
    if p.exists() {
        println!("Config already exists: {}", p.display());
        return Ok(());
    }
    save_config_to(&p, &Config::default())?;
    println!("Wrote {}", p.display());
    Ok(())
}
