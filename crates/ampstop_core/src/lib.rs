//! Charging-session domain for the venue's EV stations.
//!
//! Holds the data model, the availability resolver, the billing calculator,
//! the injected clock and the storage port the engine runs against.

mod availability;
mod billing;
mod clock;
mod memory;
mod models;
mod storage;

pub use crate::availability::*;
pub use crate::billing::*;
pub use crate::clock::*;
pub use crate::memory::InMemoryStorage;
pub use crate::models::*;
pub use crate::storage::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChargingError {
    #[error("{0}")]
    Validation(String),
    #[error("Cannot {attempted} {entity} {id}: it is currently {actual}")]
    InvalidTransition {
        entity: &'static str,
        id: String,
        actual: String,
        attempted: &'static str,
    },
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ChargingError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        ChargingError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn invalid_transition(
        entity: &'static str,
        id: impl ToString,
        actual: impl ToString,
        attempted: &'static str,
    ) -> Self {
        ChargingError::InvalidTransition {
            entity,
            id: id.to_string(),
            actual: actual.to_string(),
            attempted,
        }
    }

    /// Current state carried by an invalid-transition failure.
    pub fn actual_state(&self) -> Option<&str> {
        match self {
            ChargingError::InvalidTransition { actual, .. } => Some(actual),
            _ => None,
        }
    }
}

pub type ChargingResult<T> = Result<T, ChargingError>;
