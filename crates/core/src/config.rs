use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use types::SolveParams;

const PREFIX: &str = "TIMETABLE__";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: String, value: String },
    #[error("unknown configuration key {0}")]
    UnknownKey(String),
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BusyPolicy {
    #[default]
    Reject,
    Queue,
}

impl FromStr for BusyPolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, ()> {
        match s.to_ascii_lowercase().as_str() {
            "reject" => Ok(BusyPolicy::Reject),
            "queue" => Ok(BusyPolicy::Queue),
            _ => Err(()),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SolverSettings {
    pub time_limit_ms: u64,
    pub node_limit: Option<u64>,
    pub seed: u64,
    pub workers: usize,
    pub max_solutions: u32,
    pub repair_steps: u32,
}

impl Default for SolverSettings {
    fn default() -> Self {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get().min(4))
            .unwrap_or(1);
        Self {
            time_limit_ms: 120_000,
            node_limit: None,
            seed: 0,
            workers,
            max_solutions: 4,
            repair_steps: 200,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct JobSettings {
    pub max_concurrent: usize,
    pub on_busy: BusyPolicy,
    /// Finished jobs are forgotten this long after they end.
    pub retain_finished_ms: u64,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            max_concurrent: 2,
            on_busy: BusyPolicy::Reject,
            retain_finished_ms: 600_000,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    #[serde(default)]
    pub solver: SolverSettings,
    #[serde(default)]
    pub jobs: JobSettings,
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars())
    }

    /// Applies `TIMETABLE__*` overrides from `vars` on top of the defaults.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut cfg = EngineConfig::default();
        for (key, value) in vars {
            let key = key.as_ref();
            let value = value.as_ref().trim();
            let Some(rest) = key.strip_prefix(PREFIX) else {
                continue;
            };
            match rest {
                "SOLVER__TIME_LIMIT_MS" => cfg.solver.time_limit_ms = parse(key, value)?,
                "SOLVER__NODE_LIMIT" => {
                    cfg.solver.node_limit = match value {
                        "" | "none" => None,
                        v => Some(parse(key, v)?),
                    }
                }
                "SOLVER__SEED" => cfg.solver.seed = parse(key, value)?,
                "SOLVER__WORKERS" => cfg.solver.workers = parse::<usize>(key, value)?.max(1),
                "SOLVER__MAX_SOLUTIONS" => {
                    cfg.solver.max_solutions = parse::<u32>(key, value)?.max(1)
                }
                "SOLVER__REPAIR_STEPS" => cfg.solver.repair_steps = parse(key, value)?,
                "JOBS__MAX_CONCURRENT" => {
                    cfg.jobs.max_concurrent = parse::<usize>(key, value)?.max(1)
                }
                "JOBS__ON_BUSY" => {
                    cfg.jobs.on_busy = value.parse().map_err(|()| invalid(key, value))?
                }
                "JOBS__RETAIN_FINISHED_MS" => cfg.jobs.retain_finished_ms = parse(key, value)?,
                _ => return Err(ConfigError::UnknownKey(key.to_owned())),
            }
        }
        Ok(cfg)
    }

    pub fn solve_params(&self) -> SolveParams {
        SolveParams {
            time_limit_ms: self.solver.time_limit_ms,
            node_limit: self.solver.node_limit,
            seed: self.solver.seed,
            workers: self.solver.workers,
            max_solutions: self.solver.max_solutions,
            repair_steps: self.solver.repair_steps,
        }
    }
}

fn parse<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| invalid(key, value))
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_owned(),
        value: value.to_owned(),
    }
}
