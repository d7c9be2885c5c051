//! Brew POS core: order lifecycle, shift lifecycle, cashier shift closure,
//! and cash handover workflows for a cafe point of sale.
//!
//! The domain layer is pure: aggregates expose operations that validate and
//! return new values, and the thin service functions in each module wire
//! those operations to SQLite document storage. State machine rules live in
//! exhaustive transition tables; undefined (state, event) pairs always
//! surface as explicit errors.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod audit;
pub mod cashier_shift;
pub mod db;
pub mod error;
pub mod handover;
pub mod order_state;
pub mod orders;
pub mod repository;
pub mod shifts;
pub mod state_machine;
pub mod values;

pub use error::DomainError;
pub use state_machine::StateMachineManager;

/// Initialize structured logging (console + daily rolling file).
///
/// Honors `RUST_LOG` when set; defaults to info with debug for this crate.
/// Call once at process startup.
pub fn init_tracing(log_dir: &std::path::Path) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,brew_pos=debug"));

    std::fs::create_dir_all(log_dir).ok();

    let file_appender = tracing_appender::rolling::daily(log_dir, "brew-pos");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true);
    let console_layer = fmt::layer().with_target(true);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    // Keep the guard alive for the lifetime of the process — dropping it
    // flushes and stops the file writer.
    std::mem::forget(guard);
}
