//! One-time `tracing` subscriber initialization: an `OnceLock`-guarded
//! `init()` driven by the `REPO_LOG` env var.

use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;

static INIT: OnceLock<()> = OnceLock::new();

/// Initialize the global `tracing` subscriber. Safe to call from multiple
/// call sites (tests, `main`, embedders) — only the first call takes
/// effect. Verbosity is controlled by the `REPO_LOG` environment variable
/// (falls back to `info` when unset).
pub fn init() {
    INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_env("REPO_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init();
        init();
    }
}
