use std::path::Path;

use serde::Deserialize;

use roster_engine::limits::ServerTier;

/// Service configuration, loaded from a TOML file with environment
/// overrides for the deployment-specific values.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub port: u16,
    pub redis_url: String,
    /// Seconds a completed job's result stays retrievable.
    pub result_ttl_seconds: u64,
    pub server_tier: ServerTier,
    /// Number of job-processing workers.
    pub worker_count: usize,
    /// Ceiling on the solver's in-process parallel workers.
    pub max_solver_workers: usize,
    /// Ceiling on the per-request solver time limit.
    pub max_time_limit_seconds: u64,
    /// Extra wall-clock slack before a running job is declared failed.
    pub hard_timeout_margin_seconds: u64,
    pub ratio_cache_path: String,
    /// Seconds between expiry-cleanup sweeps.
    pub cleanup_interval_seconds: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            result_ttl_seconds: 3600,
            server_tier: ServerTier::Medium,
            worker_count: 2,
            max_solver_workers: 4,
            max_time_limit_seconds: 300,
            hard_timeout_margin_seconds: 60,
            ratio_cache_path: "config/ratio_cache.json".to_string(),
            cleanup_interval_seconds: 300,
        }
    }
}

impl ServiceConfig {
    /// Loads the TOML file when present, then applies env overrides
    /// (`SERVER_PORT`, `REDIS_URL`, `RESULT_TTL_SECONDS`, `SERVER_TIER`).
    pub fn load(path: &str) -> Result<Self, String> {
        let mut config = if Path::new(path).exists() {
            let raw = std::fs::read_to_string(path)
                .map_err(|e| format!("failed to read {path}: {e}"))?;
            toml::from_str(&raw).map_err(|e| format!("failed to parse {path}: {e}"))?
        } else {
            tracing::info!(path, "config file not found, using defaults");
            Self::default()
        };

        if let Ok(port) = std::env::var("SERVER_PORT") {
            config.port = port
                .parse()
                .map_err(|_| format!("SERVER_PORT '{port}' is not a port number"))?;
        }
        if let Ok(url) = std::env::var("REDIS_URL") {
            config.redis_url = url;
        }
        if let Ok(ttl) = std::env::var("RESULT_TTL_SECONDS") {
            config.result_ttl_seconds = ttl
                .parse()
                .map_err(|_| format!("RESULT_TTL_SECONDS '{ttl}' is not a number"))?;
        }
        if let Ok(tier) = std::env::var("SERVER_TIER") {
            config.server_tier = match tier.to_ascii_lowercase().as_str() {
                "small" => ServerTier::Small,
                "medium" => ServerTier::Medium,
                "large" => ServerTier::Large,
                other => return Err(format!("SERVER_TIER '{other}' is not small/medium/large")),
            };
        }
        Ok(config)
    }

    pub fn solve_options(&self) -> roster_engine::engine::SolveOptions {
        roster_engine::engine::SolveOptions {
            tier: self.server_tier,
            max_workers: self.max_solver_workers,
            max_time_seconds: self.max_time_limit_seconds,
            seed: 42,
        }
    }
}
