//! Application state shared across HTTP handlers.

use std::sync::Arc;

use crate::scrape::Scraper;

/// Application state shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Scraper executing the configured endpoints on each request.
    pub scraper: Arc<Scraper>,
}

impl AppState {
    /// Create new application state.
    ///
    /// # Parameters
    ///
    /// - `scraper` - Scraper built from the compiled configuration
    ///
    /// # Returns
    ///
    /// Returns a new `AppState` instance.
    pub fn new(scraper: Scraper) -> Self {
        Self { scraper: Arc::new(scraper) }
    }
}
