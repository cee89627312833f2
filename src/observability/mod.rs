//! Observability for fieldseal
//!
//! Structured logging through `tracing`. Each event carries an `event`
//! field from [`Event`]:
//!
//! ```ignore
//! use fieldseal::observability::Event;
//!
//! tracing::info!(event = %Event::SchemasLoaded, count = 3, "schemas loaded");
//! ```
//!
//! Observability is read-only: a failure to log never changes the outcome
//! of validation or encryption.

mod events;
mod logger;

pub use events::Event;
pub use logger::{init_logging, LogConfig, LogFormat};

use thiserror::Error;

/// Observability error. Never fatal.
#[derive(Debug, Error)]
#[error("[ERROR] FIELDSEAL_OBSERVABILITY_FAILED: {message}")]
pub struct ObservabilityError {
    message: String,
}

impl ObservabilityError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Result type for observability operations
pub type ObservabilityResult<T> = Result<T, ObservabilityError>;

/// Emits `event` at its own level with a free-form detail message.
pub fn log_event(event: Event, detail: &str) {
    let level = event.level();
    if level == tracing::Level::WARN {
        tracing::warn!(event = %event, "{}", detail);
    } else if level == tracing::Level::DEBUG {
        tracing::debug!(event = %event, "{}", detail);
    } else {
        tracing::info!(event = %event, "{}", detail);
    }
}
