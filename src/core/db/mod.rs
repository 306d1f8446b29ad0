//! Database module
//!
//! Connectivity, models and repositories for the PostgreSQL store.

pub mod models;
pub mod pool;
pub mod repositories;

pub use models::*;
pub use pool::{
    DbConfig, DbError, create_lazy_pool, create_pool, create_pool_with_migrations, health_check,
};
pub use repositories::{
    PasswordResetRepository, PasswordResetRepositoryError, PropertyRepository,
    PropertyRepositoryError, SESSION_SWEEP_INTERVAL, SessionRepository, SessionRepositoryError,
    SessionSweeper, UnitRepository, UnitRepositoryError, UserRepository, UserRepositoryError,
};

pub use sqlx::PgPool;
