use crate::backend::config::Config as WatcherConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Config {
    #[serde(default)]
    pub api: Api,
    #[serde(default)]
    pub content: Content,
    #[serde(default)]
    pub sse: Sse,
    #[serde(default)]
    pub watcher: WatcherConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Api {
    pub base_url: String,
}

impl Default for Api {
    fn default() -> Self {
        Self {
            base_url: String::from("http://localhost"),
        }
    }
}

/// Where uploaded files and thumbnails are served from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Content {
    pub base_url: String,
}

impl Default for Content {
    fn default() -> Self {
        Self {
            base_url: String::from("http://localhost"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Sse {
    pub url: String,
}

impl Default for Sse {
    fn default() -> Self {
        Self {
            url: String::from("http://localhost/sse"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::config::{Intervals, Strategy};

    #[test]
    fn deserialize_empty() {
        let config = toml::from_str::<Config>("").expect("failed to deserialize config");
        assert_eq!(config, Config::default());
        assert_eq!(config.sse.url, "http://localhost/sse");
        assert_eq!(config.watcher.strategy, Strategy::Sse);
        assert_eq!(config.watcher.intervals.reconnect, 10);
        assert_eq!(config.watcher.intervals.poll, 10);
    }

    #[test]
    fn deserialize() {
        let input = r#"
[api]
base_url = "https://board.example/api"

[sse]
url = "https://board.example/sse"

[watcher]
strategy = "polling"

[watcher.intervals]
poll = 20
"#;
        let config = toml::from_str::<Config>(input).expect("failed to deserialize config");
        assert_eq!(
            config,
            Config {
                api: Api {
                    base_url: String::from("https://board.example/api"),
                },
                content: Content::default(),
                sse: Sse {
                    url: String::from("https://board.example/sse"),
                },
                watcher: WatcherConfig {
                    strategy: Strategy::Polling,
                    intervals: Intervals {
                        reconnect: 10,
                        poll: 20,
                    },
                },
            }
        )
    }

    #[test]
    fn reject_unknown_strategy() {
        let input = r#"
[watcher]
strategy = "websocket"
"#;
        assert!(toml::from_str::<Config>(input).is_err());
    }

    #[test]
    fn reject_zero_interval() {
        for input in [
            "[watcher.intervals]\npoll = 0\n",
            "[watcher.intervals]\nreconnect = 0\n",
        ] {
            let err = toml::from_str::<Config>(input).expect_err("zero interval accepted");
            assert!(err.to_string().contains("at least 1 second"), "{err}");
        }
    }

    #[test]
    fn serialize() {
        let config = Config {
            content: Content {
                base_url: String::from("https://cdn.board.example"),
            },
            watcher: WatcherConfig {
                strategy: Strategy::Polling,
                intervals: Intervals::default(),
            },
            ..Default::default()
        };
        let s = toml::to_string(&config).expect("failed to serialize config");
        let deserialized = toml::from_str::<Config>(&s).expect("failed to deserialize config");
        assert_eq!(deserialized, config);
    }
}
