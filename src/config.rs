//! Server settings read from the command line and the environment.

use crate::error::{DashboardError, Result};
use crate::graph::{GraphOptions, MAX_IMAGE_SIDE};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_ADDR: &str = "127.0.0.1:3000";
const DEFAULT_MAX_UPLOAD_MB: usize = 200;
const DEFAULT_SESSION_TTL: u64 = 24 * 60 * 60; // 24 hours in seconds

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the HTTP server listens on
    pub addr: SocketAddr,

    /// Largest accepted request body, in bytes
    pub max_upload_bytes: usize,

    /// Size of downloaded chart images
    pub graph: GraphOptions,

    /// Idle time after which a session is dropped
    pub session_ttl: Duration,

    /// TrueType font used for chart text; system fonts are tried when unset
    pub font: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
            graph: GraphOptions::default(),
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL),
            font: None,
        }
    }
}

impl ServerConfig {
    /// Settings from the process environment and arguments
    ///
    /// The first positional argument, if present, overrides `DASHBOARD_ADDR`.
    pub fn from_env(args: impl IntoIterator<Item = String>) -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok(), args)
    }

    /// Settings from an arbitrary variable lookup, so tests need not touch
    /// the real environment.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        args: impl IntoIterator<Item = String>,
    ) -> Result<Self> {
        let mut config = ServerConfig::default();

        let addr = args
            .into_iter()
            .next()
            .or_else(|| lookup("DASHBOARD_ADDR"))
            .unwrap_or_else(|| DEFAULT_ADDR.to_string());
        config.addr = parse("address", &addr)?;

        if let Some(mb) = lookup("DASHBOARD_MAX_UPLOAD_MB") {
            let mb: usize = parse("DASHBOARD_MAX_UPLOAD_MB", &mb)?;
            config.max_upload_bytes = mb.checked_mul(1024 * 1024).ok_or_else(|| {
                DashboardError::Config(format!("DASHBOARD_MAX_UPLOAD_MB {} is too large", mb))
            })?;
        }
        if let Some(width) = lookup("DASHBOARD_CHART_WIDTH") {
            config.graph.width = parse("DASHBOARD_CHART_WIDTH", &width)?;
        }
        if let Some(height) = lookup("DASHBOARD_CHART_HEIGHT") {
            config.graph.height = parse("DASHBOARD_CHART_HEIGHT", &height)?;
        }
        if let Some(ttl) = lookup("DASHBOARD_SESSION_TTL_SECS") {
            config.session_ttl = Duration::from_secs(parse("DASHBOARD_SESSION_TTL_SECS", &ttl)?);
        }
        config.font = lookup("DASHBOARD_FONT")
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let sides = 64..=MAX_IMAGE_SIDE;
        if !sides.contains(&self.graph.width) || !sides.contains(&self.graph.height) {
            return Err(DashboardError::Config(format!(
                "chart size {}x{} is outside 64x64 to {}x{}",
                self.graph.width, self.graph.height, MAX_IMAGE_SIDE, MAX_IMAGE_SIDE
            )));
        }
        if self.max_upload_bytes == 0 {
            return Err(DashboardError::Config(
                "DASHBOARD_MAX_UPLOAD_MB must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| DashboardError::Config(format!("{} has an invalid value '{}'", name, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = ServerConfig::from_lookup(lookup(&[]), Vec::new()).unwrap();
        assert_eq!(config.addr.to_string(), "127.0.0.1:3000");
        assert_eq!(config.max_upload_bytes, 200 * 1024 * 1024);
        assert_eq!((config.graph.width, config.graph.height), (800, 600));
        assert_eq!(config.session_ttl, Duration::from_secs(86400));
        assert!(config.font.is_none());
    }

    #[test]
    fn environment_overrides() {
        let config = ServerConfig::from_lookup(
            lookup(&[
                ("DASHBOARD_ADDR", "0.0.0.0:8080"),
                ("DASHBOARD_MAX_UPLOAD_MB", "5"),
                ("DASHBOARD_CHART_WIDTH", "1024"),
                ("DASHBOARD_SESSION_TTL_SECS", "60"),
                ("DASHBOARD_FONT", "/fonts/a.ttf"),
            ]),
            Vec::new(),
        )
        .unwrap();
        assert_eq!(config.addr.port(), 8080);
        assert_eq!(config.max_upload_bytes, 5 * 1024 * 1024);
        assert_eq!(config.graph.width, 1024);
        assert_eq!(config.session_ttl, Duration::from_secs(60));
        assert_eq!(config.font, Some(PathBuf::from("/fonts/a.ttf")));
    }

    #[test]
    fn positional_address_wins() {
        let config = ServerConfig::from_lookup(
            lookup(&[("DASHBOARD_ADDR", "0.0.0.0:8080")]),
            vec!["127.0.0.1:9000".to_string()],
        )
        .unwrap();
        assert_eq!(config.addr.port(), 9000);
    }

    #[test]
    fn invalid_values_are_rejected() {
        for vars in [
            [("DASHBOARD_CHART_HEIGHT", "tall")],
            [("DASHBOARD_CHART_WIDTH", "10")],
            [("DASHBOARD_CHART_WIDTH", "100000")],
            [("DASHBOARD_MAX_UPLOAD_MB", "18446744073709551615")],
            [("DASHBOARD_MAX_UPLOAD_MB", "0")],
        ] {
            let err = ServerConfig::from_lookup(lookup(&vars), Vec::new()).unwrap_err();
            assert!(matches!(err, DashboardError::Config(_)), "{:?}", vars);
        }
    }

    #[test]
    fn largest_chart_size_is_accepted() {
        let config = ServerConfig::from_lookup(
            lookup(&[("DASHBOARD_CHART_WIDTH", "8192"), ("DASHBOARD_CHART_HEIGHT", "8192")]),
            Vec::new(),
        )
        .unwrap();
        assert_eq!((config.graph.width, config.graph.height), (8192, 8192));
    }
}
