//! COMETA API - Optimized Projects Service
//!
//! Serves projects with their progress over HTTP. Reads go through a
//! tag-invalidated cache; misses run the tiered query executor, which tries
//! the database RPC first, then a single joined query, then a two-step
//! query assembled in process.

pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod macros;
pub mod openapi;
pub mod routes;
pub mod sources;
pub mod state;
pub mod telemetry;

// Re-export commonly used types
pub use config::ApiConfig;
pub use db::{DbClient, DbConfig};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use openapi::ApiDoc;
pub use routes::create_api_router;
pub use sources::{
    postgres_executor, OptimizedProjectSource, RpcProjectSource, SuperOptimizedProjectSource,
};
pub use state::{AppState, ProjectsCache};
