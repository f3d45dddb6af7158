pub mod app;
pub mod charts;
pub mod config;
pub mod errors;
pub mod filter;
pub mod handlers;
pub mod loader;
pub mod models;
pub mod render;
pub mod session;
pub mod state;
pub mod ui;

pub use app::router;
pub use config::DashboardConfig;
pub use render::render;
pub use state::AppState;
