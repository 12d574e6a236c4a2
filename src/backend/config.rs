use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Config {
    #[serde(default)]
    pub strategy: Strategy,
    #[serde(default)]
    pub intervals: Intervals,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    #[default]
    Sse,
    Polling,
}

/// Seconds between ticks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Intervals {
    #[serde(deserialize_with = "non_zero")]
    pub reconnect: u64,
    #[serde(deserialize_with = "non_zero")]
    pub poll: u64,
}

fn non_zero<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match u64::deserialize(deserializer)? {
        0 => Err(D::Error::custom("interval must be at least 1 second")),
        secs => Ok(secs),
    }
}

impl Default for Intervals {
    fn default() -> Self {
        Self {
            reconnect: 10,
            poll: 10,
        }
    }
}
