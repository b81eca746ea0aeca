//! Tracing initialization and configuration.

use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::constants::LOG_ENV_VAR;

static INIT: Once = Once::new();

/// Initialize logging for the toolchain.
///
/// Reads the `DIH_LOG` environment variable for per-module levels, e.g.
/// `DIH_LOG=dih_book::render=debug,dih_params=warn`.
///
/// Falls back to `info` for the `dih_*` crates when `DIH_LOG` is unset or
/// invalid. Logs go to stderr so stdout stays clean for reports.
/// Idempotent.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| {
            EnvFilter::new("dih_core=info,dih_params=info,dih_book=info,dih=info")
        });

        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_line_number(true),
            )
            .with(filter)
            .init();
    });
}
