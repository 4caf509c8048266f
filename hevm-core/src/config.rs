use std::env;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::LevelFilter;
use serde::{Deserialize, Serialize};

/// Variable ids the VM writes on its own. `None` disables the write.
///
/// Defaults follow the v6 variable layout; titles that differ override them.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct WellKnownVars {
    pub room: Option<u16>,
    pub override_hit: Option<u16>,
    pub cutscene_start_script: Option<u16>,
    pub cutscene_end_script: Option<u16>,
    pub cursor_state: Option<u16>,
    pub userput: Option<u16>,
    pub random_nr: Option<u16>,
}

impl Default for WellKnownVars {
    fn default() -> Self {
        Self {
            room: Some(4),
            override_hit: Some(5),
            cutscene_start_script: Some(35),
            cutscene_end_script: Some(36),
            cursor_state: Some(52),
            userput: Some(53),
            random_nr: Some(118),
        }
    }
}

/// Logger configuration used by the command line tools.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LoggerConfig {
    pub level_filter: LevelFilter,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self { level_filter: LevelFilter::Info }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct VmConfig {
    pub slot_count: usize,
    pub stack_limit: usize,
    pub global_vars: usize,
    pub room_vars: usize,
    pub local_vars: usize,
    pub max_arrays: usize,
    /// Opcodes a slot may run in one tick before it is forced to yield.
    pub max_ops_per_slot: usize,
    pub ticks_per_second: u32,
    pub max_nested_scripts: usize,
    /// Script numbers at or above this are room-local.
    pub global_scripts: i32,
    pub rng_seed: u64,
    pub vars: WellKnownVars,
    pub logger: LoggerConfig,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            slot_count: 40,
            stack_limit: 150,
            global_vars: 800,
            room_vars: 64,
            local_vars: 25,
            max_arrays: 256,
            max_ops_per_slot: 2000,
            ticks_per_second: 60,
            max_nested_scripts: 15,
            global_scripts: 200,
            rng_seed: 0,
            vars: WellKnownVars::default(),
            logger: LoggerConfig::default(),
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse::<T>().ok())
}

impl VmConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).with_context(|| format!("read {:?}", path))?;
        let config: VmConfig =
            serde_json::from_slice(&bytes).with_context(|| format!("parse VM config {:?}", path))?;
        Ok(config)
    }

    /// Overlay `HEVM_*` environment variables.
    pub fn apply_env(mut self) -> Self {
        if let Some(v) = parse_env("HEVM_SLOT_COUNT") {
            self.slot_count = v;
        }
        if let Some(v) = parse_env("HEVM_MAX_OPS") {
            self.max_ops_per_slot = v;
        }
        if let Some(v) = parse_env("HEVM_TICKS_PER_SECOND") {
            self.ticks_per_second = v;
        }
        if let Some(v) = parse_env("HEVM_RNG_SEED") {
            self.rng_seed = v;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let c: VmConfig = serde_json::from_str(r#"{ "slot_count": 8, "vars": { "room": null } }"#).unwrap();
        assert_eq!(c.slot_count, 8);
        assert_eq!(c.stack_limit, 150);
        assert_eq!(c.vars.room, None);
        assert_eq!(c.vars.override_hit, Some(5));
    }

    #[test]
    fn load_reports_path() {
        let err = VmConfig::load("/nonexistent/hevm.json").unwrap_err();
        assert!(format!("{err:#}").contains("hevm.json"));
    }
}
