//! Common library for the municipal dashboard services
//!
//! This crate provides shared functionality used by the dashboard's backend
//! services: PostgreSQL connectivity and the error types that go with it.

pub mod database;
pub mod error;

/// Example usage of the database module
///
/// ```rust,no_run
/// use common::database::{DatabaseConfig, close_pool, health_check, init_pool};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = DatabaseConfig::from_env()?;
///     let pool = init_pool(&config).await?;
///     let is_healthy = health_check(&pool).await?;
///     println!("Database health check: {}", is_healthy);
///     close_pool(pool).await;
///     Ok(())
/// }
/// ```
pub fn example_usage() {}
