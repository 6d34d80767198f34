//! Chat App: composition root.
//!
//! This crate is the DI wiring layer: it opens the configured adapters from
//! `chat-platform` and hands them to the `chat-core` orchestrator.

mod app;

pub use app::{App, AppBuilder};

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a fmt subscriber. `RUST_LOG` wins over `filter`.
/// `log` records from the library crates are bridged into it.
/// Returns false if a global subscriber was already set.
pub fn init_logging(filter: &str) -> bool {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false))
        .try_init()
        .is_ok()
}
