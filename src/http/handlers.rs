//! Request handlers for the exporter's HTTP surface.

use axum::{
    extract::State,
    http::header,
    response::{Html, IntoResponse},
};

use crate::exposition;
use crate::http::state::AppState;

/// Landing page linking to the metrics endpoint.
pub async fn landing() -> Html<&'static str> {
    Html(
        r#"<!DOCTYPE html>
<html>
  <head>
    <meta charset="utf-8">
    <title>JSON Exporter</title>
  </head>
  <body>
    <p>To the <a href="/metrics">metrics page</a></p>
  </body>
</html>
"#,
    )
}

/// Health check endpoint.
///
/// # Returns
///
/// Returns "ok" if the server is healthy.
pub async fn healthz() -> &'static str {
    "ok"
}

/// Scrape endpoint.
///
/// Runs a full scrape and returns the exposition body. Partial data is
/// still a success; only process-level failures surface as errors, and
/// those abort the server rather than this handler.
///
/// # Parameters
///
/// - `state` - Application state containing the scraper
///
/// # Returns
///
/// Returns the Prometheus text format body with its content type.
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let body = state.scraper.scrape().await;
    ([(header::CONTENT_TYPE, exposition::CONTENT_TYPE)], body)
}
