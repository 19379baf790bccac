// Sink selection
use crate::record::sink::{Discard, JsonLinesSink, LogSink, Logger};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use log::Level;
use std::fs;
use std::path::{Path, PathBuf};

pub const SINK_ENV_VAR: &str = "LOGFS_SINK";

/// Where decorated filesystem records go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SinkConfig {
    /// `level` is any `log::Level` name, matched case-insensitively.
    Log { level: Level },
    JsonLines { path: PathBuf },
    Discard,
}

impl Default for SinkConfig {
    fn default() -> Self {
        SinkConfig::Log {
            level: Level::Debug,
        }
    }
}

impl SinkConfig {
    /// Reads a JSON sink config from disk.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read sink config {}", path.display()))?;
        let config: SinkConfig = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse sink config {}", path.display()))?;
        log::debug!("loaded sink config from {}: {:?}", path.display(), config);
        Ok(config)
    }

    /// Parses the compact form: `log`, `log:<level>`, `jsonl:<path>` or `discard`.
    pub fn parse(spec: &str) -> Result<Self> {
        let spec = spec.trim();
        let (kind, rest) = match spec.split_once(':') {
            Some((kind, rest)) => (kind, Some(rest)),
            None => (spec, None),
        };
        match (kind, rest) {
            ("log", None) => Ok(SinkConfig::default()),
            ("log", Some(level)) => Ok(SinkConfig::Log {
                level: level
                    .parse::<Level>()
                    .with_context(|| format!("unknown log level: {}", level))?,
            }),
            ("jsonl", Some(path)) if !path.is_empty() => Ok(SinkConfig::JsonLines {
                path: PathBuf::from(path),
            }),
            ("jsonl", _) => bail!("jsonl sink needs a path, e.g. jsonl:/tmp/fs.jsonl"),
            ("discard", None) => Ok(SinkConfig::Discard),
            _ => bail!("unrecognized sink spec: {:?}", spec),
        }
    }

    /// Uses `LOGFS_SINK` when set, the default otherwise.
    pub fn from_env() -> Result<Self> {
        match std::env::var(SINK_ENV_VAR) {
            Ok(val) if !val.trim().is_empty() => Self::parse(&val)
                .with_context(|| format!("Invalid {} value", SINK_ENV_VAR)),
            _ => Ok(Self::default()),
        }
    }

    pub fn build(&self) -> Result<Box<dyn Logger>> {
        match self {
            SinkConfig::Log { level } => Ok(Box::new(LogSink::new(*level))),
            SinkConfig::JsonLines { path } => {
                if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                    fs::create_dir_all(dir).context("Failed to create sink directory")?;
                }
                let file = fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .with_context(|| format!("Failed to open sink file {}", path.display()))?;
                Ok(Box::new(JsonLinesSink::new(file)))
            }
            SinkConfig::Discard => Ok(Box::new(Discard)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_compact_forms() {
        assert_eq!(SinkConfig::parse("log").unwrap(), SinkConfig::default());
        assert_eq!(
            SinkConfig::parse("log:INFO").unwrap(),
            SinkConfig::Log { level: Level::Info }
        );
        assert_eq!(
            SinkConfig::parse("jsonl:/tmp/x.jsonl").unwrap(),
            SinkConfig::JsonLines {
                path: PathBuf::from("/tmp/x.jsonl")
            }
        );
        assert_eq!(SinkConfig::parse(" discard ").unwrap(), SinkConfig::Discard);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(SinkConfig::parse("jsonl").is_err());
        assert!(SinkConfig::parse("jsonl:").is_err());
        assert!(SinkConfig::parse("log:loud").is_err());
        assert!(SinkConfig::parse("syslog").is_err());
    }

    #[test]
    fn test_levels_accept_every_log_name() {
        for level in [Level::Error, Level::Warn, Level::Info, Level::Debug, Level::Trace] {
            let lower = level.as_str().to_ascii_lowercase();
            assert_eq!(
                SinkConfig::parse(&format!("log:{}", lower)).unwrap(),
                SinkConfig::Log { level }
            );
        }
        let err = SinkConfig::parse("log:off").unwrap_err();
        assert!(format!("{:#}", err).contains("unknown log level: off"));
    }

    #[test]
    fn test_from_env() {
        std::env::set_var(SINK_ENV_VAR, "discard");
        assert_eq!(SinkConfig::from_env().unwrap(), SinkConfig::Discard);
        std::env::set_var(SINK_ENV_VAR, "bogus");
        assert!(SinkConfig::from_env().is_err());
        std::env::remove_var(SINK_ENV_VAR);
        assert_eq!(SinkConfig::from_env().unwrap(), SinkConfig::default());
    }

    #[test]
    fn test_build_in_memory_sinks() {
        assert!(SinkConfig::default().build().is_ok());
        assert!(SinkConfig::Discard.build().is_ok());
    }

    #[test]
    fn test_json_shape() {
        let config: SinkConfig =
            serde_json::from_str(r#"{"kind":"log","level":"warn"}"#).unwrap();
        assert_eq!(config, SinkConfig::Log { level: Level::Warn });

        let json = serde_json::to_string(&SinkConfig::Log { level: Level::Trace }).unwrap();
        let back: SinkConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, SinkConfig::Log { level: Level::Trace });

        let config: SinkConfig = serde_json::from_str(r#"{"kind":"discard"}"#).unwrap();
        assert_eq!(config, SinkConfig::Discard);

        let json = serde_json::to_string(&SinkConfig::JsonLines {
            path: PathBuf::from("a.jsonl"),
        })
        .unwrap();
        assert_eq!(json, r#"{"kind":"json_lines","path":"a.jsonl"}"#);
    }
}
