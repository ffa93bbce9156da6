//! HTTP server surface: the `/metrics` scrape endpoint and a landing page.

pub mod handlers;
pub mod routes;
pub mod state;

pub use routes::build_router;
pub use state::AppState;
