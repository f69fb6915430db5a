//! HTML pages shown instead of the backend while it is not serving.

use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};

use flywheel_core::State;

/// Seconds a browser should wait before retrying a holding page.
pub const RETRY_AFTER_SECS: u64 = 5;

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn document(title: &str, head_extra: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
{head_extra}<style>
body {{ font-family: sans-serif; margin: 4em auto; max-width: 40em; color: #333; }}
h1 {{ font-size: 1.5em; }}
a.button {{ display: inline-block; padding: 0.6em 1.2em; background: #2a6; color: #fff; text-decoration: none; border-radius: 4px; }}
</style>
</head>
<body>
{body}
</body>
</html>
"#
    )
}

/// Prompt shown while stopped, linking to `start_url`.
#[must_use]
pub fn stopped(start_url: &str) -> Response {
    let body = format!(
        r#"<h1>This environment is asleep</h1>
<p>It was stopped to save resources. Starting it takes a few minutes.</p>
<p><a class="button" href="{}">Start it up</a></p>"#,
        escape(start_url)
    );
    Html(document("Stopped", "", &body)).into_response()
}

/// Holding page for a pool that is changing state or unhealthy.
#[must_use]
pub fn holding(state: State) -> Response {
    let (title, message) = match state {
        State::Starting => (
            "Starting",
            "The environment is starting up. This page will refresh until it is ready.",
        ),
        State::Stopping => (
            "Stopping",
            "The environment is shutting down. You can start it again once it has stopped.",
        ),
        State::Unhealthy => (
            "Unhealthy",
            "The environment is running but not responding correctly. Retrying shortly.",
        ),
        State::Stopped | State::Started => ("Please wait", "Please wait."),
    };

    let refresh = format!(r#"<meta http-equiv="refresh" content="{RETRY_AFTER_SECS}">"#) + "\n";
    let body = format!("<h1>{title}</h1>\n<p>{message}</p>");

    (
        StatusCode::SERVICE_UNAVAILABLE,
        [(header::RETRY_AFTER, RETRY_AFTER_SECS.to_string())],
        Html(document(title, &refresh, &body)),
    )
        .into_response()
}

/// Page reporting a failed lifecycle sequence.
#[must_use]
pub fn error(message: &str) -> Response {
    let body = format!(
        "<h1>Something went wrong</h1>\n<p>The environment could not change state:</p>\n<pre>{}</pre>",
        escape(message)
    );
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Html(document("Error", "", &body)),
    )
        .into_response()
}
