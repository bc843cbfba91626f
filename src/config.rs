use std::{net::SocketAddr, path::PathBuf};

pub const DEFAULT_MODEL_PATH: &str = "best_hydroponic_model.pt";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("invalid {var}={value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub model_path: PathBuf,
    pub meta_path: Option<PathBuf>,
    pub host: String,
    pub port: u16,
    pub log_predictions: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            meta_path: None,
            host: "127.0.0.1".into(),
            port: 8080,
            log_predictions: false,
        }
    }
}

impl Settings {
    /// Read settings from the process environment (after `.env`, if any).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut s = Self::default();
        if let Some(p) = get("MODEL_PATH").filter(|p| !p.is_empty()) {
            s.model_path = PathBuf::from(p);
        }
        s.meta_path = get("META_PATH").filter(|p| !p.is_empty()).map(PathBuf::from);
        if let Some(h) = get("HOST").filter(|h| !h.is_empty()) {
            s.host = h;
        }
        if let Some(p) = get("PORT").filter(|p| !p.trim().is_empty()) {
            s.port = p.trim().parse().map_err(|e: std::num::ParseIntError| ConfigError::Invalid {
                var: "PORT",
                value: p.clone(),
                reason: e.to_string(),
            })?;
        }
        s.log_predictions = get("LOG_PRED").as_deref() == Some("1");
        Ok(s)
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let raw = format!("{}:{}", self.host, self.port);
        raw.parse().map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
            var: "HOST",
            value: self.host.clone(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(pairs: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|k| env.get(k).cloned())
    }

    #[test]
    fn defaults() {
        let s = settings(&[]).unwrap();
        assert_eq!(s.model_path, PathBuf::from(DEFAULT_MODEL_PATH));
        assert_eq!(s.meta_path, None);
        assert_eq!(s.bind_addr().unwrap().to_string(), "127.0.0.1:8080");
        assert!(!s.log_predictions);
    }

    #[test]
    fn overrides() {
        let s = settings(&[
            ("MODEL_PATH", "/models/ph.json"),
            ("META_PATH", "/models/meta.json"),
            ("HOST", "0.0.0.0"),
            ("PORT", "9000"),
            ("LOG_PRED", "1"),
        ])
        .unwrap();
        assert_eq!(s.model_path, PathBuf::from("/models/ph.json"));
        assert_eq!(s.meta_path, Some(PathBuf::from("/models/meta.json")));
        assert_eq!(s.bind_addr().unwrap().port(), 9000);
        assert!(s.log_predictions);
    }

    #[test]
    fn empty_values_fall_back_to_defaults() {
        let s = settings(&[("PORT", ""), ("HOST", ""), ("MODEL_PATH", ""), ("META_PATH", "")])
            .unwrap();
        assert_eq!(s.port, 8080);
        assert_eq!(s.host, "127.0.0.1");
        assert_eq!(s.model_path, PathBuf::from(DEFAULT_MODEL_PATH));
        assert_eq!(s.meta_path, None);
    }

    #[test]
    fn bad_port_is_an_error() {
        let err = settings(&[("PORT", "eighty")]).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn bad_host_is_an_error() {
        let s = settings(&[("HOST", "not a host")]).unwrap();
        assert!(s.bind_addr().is_err());
    }
}
