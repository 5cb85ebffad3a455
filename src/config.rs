//! Runtime configuration, loaded from environment variables with hard-coded
//! fallback defaults — the same pattern the teacher crate uses for its own
//! server binary (`std::env::var(..).ok().and_then(|s| s.parse().ok())
//! .unwrap_or(default)`), rather than pulling in a config-file crate.

use std::net::SocketAddr;
use std::time::Duration;

/// Tunable knobs for the dispatcher and solver. Constructed once at startup
/// and shared read-only (`Arc<Config>`) across jobs.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server binds to.
    pub addr: SocketAddr,
    /// Worker pool capacity `K` (§4.6). Default 4.
    pub max_concurrent_jobs: usize,
    /// Minimum free RAM, in MiB, below which the admission probe warns.
    /// Default 500.0. Advisory only — never blocks admission (§9).
    pub min_free_mb: f64,
    /// How long a request may wait for a worker slot before the dispatcher
    /// answers `503` (§4.6 backpressure).
    pub admission_timeout: Duration,
    /// Solver `max_iter` default (§4.4).
    pub max_iter: usize,
    /// Solver `tol` default (§4.4).
    pub tol: f64,
    /// Regularization factor multiplying `‖Hᵀg‖∞` (§4.3). Hard-coded to 0.10
    /// in the spec; exposed here as an operational override only.
    pub reg_factor: f64,
    /// Directory rendered rasters are written to.
    pub output_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            max_concurrent_jobs: 4,
            min_free_mb: 500.0,
            admission_timeout: Duration::from_millis(2000),
            max_iter: 10,
            tol: 1e-4,
            reg_factor: 0.10,
            output_dir: ".".to_string(),
        }
    }
}

impl Config {
    /// Build a `Config` by overlaying environment variables onto the
    /// defaults. Malformed values silently fall back to the default, mirroring
    /// the teacher's `std::env::var(..).ok().and_then(|s| s.parse().ok())
    /// .unwrap_or(default)` idiom.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            addr: env_parse("RECON_ADDR", d.addr),
            max_concurrent_jobs: env_parse("RECON_MAX_CONCURRENT_JOBS", d.max_concurrent_jobs),
            min_free_mb: env_parse("RECON_MIN_FREE_MB", d.min_free_mb),
            admission_timeout: Duration::from_millis(env_parse(
                "RECON_ADMISSION_TIMEOUT_MS",
                d.admission_timeout.as_millis() as u64,
            )),
            max_iter: env_parse("RECON_MAX_ITER", d.max_iter),
            tol: env_parse("RECON_TOL", d.tol),
            reg_factor: env_parse("RECON_REG_FACTOR", d.reg_factor),
            output_dir: std::env::var("RECON_OUTPUT_DIR").unwrap_or(d.output_dir),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let c = Config::default();
        assert_eq!(c.max_concurrent_jobs, 4);
        assert_eq!(c.min_free_mb, 500.0);
        assert_eq!(c.max_iter, 10);
        assert_eq!(c.tol, 1e-4);
        assert_eq!(c.reg_factor, 0.10);
    }
}
