pub mod aggregate;
pub mod cache;
pub mod clock;
pub mod config;
pub mod credentials;
pub mod dashboard;
pub mod error;
pub mod github;
pub mod models;
pub mod settings;
pub mod snapshot;
pub mod store;
pub mod sync;
pub mod tracked;
pub mod types;

pub use dashboard::Dashboard;
pub use error::{DashboardError, Result};
