//! Database repositories
//!
//! Each repository owns a clone of the pool and exposes the queries for one
//! aggregate. Errors are per-repository `thiserror` enums.

use sha2::{Digest, Sha256};

pub mod password_reset;
pub mod property;
pub mod session;
pub mod unit;
pub mod user;

pub use password_reset::{PasswordResetRepository, PasswordResetRepositoryError};
pub use property::{PropertyRepository, PropertyRepositoryError};
pub use session::{
    SESSION_SWEEP_INTERVAL, SessionRepository, SessionRepositoryError, SessionSweeper,
};
pub use unit::{UnitRepository, UnitRepositoryError};
pub use user::{UserRepository, UserRepositoryError};

/// SHA-256 hex digest used to store bearer secrets (refresh tokens, reset codes)
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}
