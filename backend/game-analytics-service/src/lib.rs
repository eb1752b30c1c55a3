pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;
pub mod store;

pub use config::Config;
pub use handlers::AppState;
pub use store::{TableName, TableSources, TableStore};
