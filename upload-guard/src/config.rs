use std::time::Duration;

use crate::error::ConfigError;

pub const TABLE_ENV: &str = "DDB_TABLE_NAME";
pub const TOPIC_ENV: &str = "SNS_TOPIC_ARN";
pub const STATE_MACHINE_ENV: &str = "STATE_MACHINE_ARN";
pub const TIMEOUT_ENV: &str = "CALL_TIMEOUT_MS";

const DEFAULT_TIMEOUT_MS: u64 = 5_000;

/// Settings for the workflow task (checks, record, alerts).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorConfig {
    pub table_name: String,
    pub topic_arn: String,
    pub call_timeout: Duration,
}

/// Settings for the trigger side that starts workflow executions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StarterConfig {
    pub state_machine_arn: String,
    pub call_timeout: Duration,
}

impl ProcessorConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_var)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            table_name: required(&lookup, TABLE_ENV)?,
            topic_arn: required(&lookup, TOPIC_ENV)?,
            call_timeout: call_timeout(&lookup)?,
        })
    }
}

impl StarterConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_var)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            state_machine_arn: required(&lookup, STATE_MACHINE_ENV)?,
            call_timeout: call_timeout(&lookup)?,
        })
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn required<F>(lookup: &F, name: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(name))
}

fn call_timeout<F>(lookup: &F) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(TIMEOUT_ENV).filter(|v| !v.trim().is_empty()) else {
        return Ok(Duration::from_millis(DEFAULT_TIMEOUT_MS));
    };
    match raw.trim().parse::<u64>() {
        Ok(ms) if ms > 0 => Ok(Duration::from_millis(ms)),
        Ok(_) => Err(ConfigError::Invalid { name: TIMEOUT_ENV, reason: "must be positive".into() }),
        Err(e) => Err(ConfigError::Invalid { name: TIMEOUT_ENV, reason: e.to_string() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn processor_requires_table_and_topic() {
        let err = ProcessorConfig::from_lookup(env(&[(TOPIC_ENV, "arn:topic")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing(TABLE_ENV));

        let err = ProcessorConfig::from_lookup(env(&[(TABLE_ENV, "files"), (TOPIC_ENV, "  ")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing(TOPIC_ENV));

        let cfg = ProcessorConfig::from_lookup(env(&[(TABLE_ENV, "files"), (TOPIC_ENV, "arn:topic")])).unwrap();
        assert_eq!(cfg.table_name, "files");
        assert_eq!(cfg.call_timeout, Duration::from_millis(DEFAULT_TIMEOUT_MS));
    }

    #[test]
    fn starter_requires_state_machine() {
        assert_eq!(
            StarterConfig::from_lookup(env(&[])).unwrap_err(),
            ConfigError::Missing(STATE_MACHINE_ENV)
        );
        let cfg = StarterConfig::from_lookup(env(&[
            (STATE_MACHINE_ENV, "arn:sm"),
            (TIMEOUT_ENV, "250"),
        ]))
        .unwrap();
        assert_eq!(cfg.call_timeout, Duration::from_millis(250));
    }

    #[test]
    fn rejects_bad_timeouts() {
        for bad in ["0", "soon", "-5"] {
            let err = StarterConfig::from_lookup(env(&[(STATE_MACHINE_ENV, "arn:sm"), (TIMEOUT_ENV, bad)]))
                .unwrap_err();
            assert!(matches!(err, ConfigError::Invalid { name: TIMEOUT_ENV, .. }), "{bad}");
        }
    }
}
