//! Tracker Page
//!
//! GET / - the single HTML page. Scripts and styles it references are
//! served from the static directory.

use axum::{extract::State, response::Html};
use std::sync::Arc;

use crate::api::state::AppState;

const INDEX_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>{{title}}</title>
  <link rel="stylesheet" href="/css/style.css">
</head>
<body>
  <h1>{{title}}</h1>
  <form id="join">
    <input id="user-id" placeholder="Your user id" required>
    <button type="submit">Start sharing</button>
  </form>
  <p id="status">Not connected</p>
  <ul id="users"></ul>
  <script src="/js/tracker.js"></script>
</body>
</html>
"#;

/// GET /
pub async fn index(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(render_index(&state.config.page_title))
}

pub fn render_index(title: &str) -> String {
    INDEX_TEMPLATE.replace("{{title}}", &escape_html(title))
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
