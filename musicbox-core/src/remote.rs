//! Remote control protocol: one `GET` request line in, one `200 OK` out.
//!
//! Paths map onto the same [`Command`] vocabulary the buttons use. Unknown
//! paths still get a `200` with `OK`.

use crate::catalog::SourceMode;
use crate::commands::{Command, EventCode};
use crate::session::SessionSnapshot;

/// Largest request the daemon reads from one connection
pub const MAX_REQUEST: usize = 1024;

const CONTROL_PAGE: &str = "<html><body><h1>Music Box Remote</h1>\
<button onclick='fetch(\"/play\")'>Play/Pause</button><br>\
<button onclick='fetch(\"/next\")'>Next</button><br>\
<button onclick='fetch(\"/prev\")'>Prev</button><br>\
<button onclick='fetch(\"/vol_up\")'>Vol +</button><br>\
<button onclick='fetch(\"/vol_down\")'>Vol -</button><br>\
<button onclick='fetch(\"/mute\")'>Mute</button><br>\
<button onclick='fetch(\"/mode\")'>Toggle Local/Cloud</button><br>\
</body></html>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteRequest {
    /// `/test` connectivity check
    Ping,
    /// Exact `/`: the HTML control page
    Index,
    /// `/status`: plain-text snapshot
    Status,
    /// A command for the session
    Command(Command),
    /// Anything else; answered with `OK`
    Unknown,
}

/// Parse the request line of a raw HTTP request.
///
/// Matching is by path prefix, the way small embedded HTTP handlers do it:
/// `/playlist` is treated as `/play`.
pub fn parse_request(raw: &str) -> RemoteRequest {
    let line = raw.lines().next().unwrap_or("");
    let mut parts = line.split_whitespace();
    let (Some("GET"), Some(target)) = (parts.next(), parts.next()) else {
        return RemoteRequest::Unknown;
    };

    if target == "/" {
        return RemoteRequest::Index;
    }

    let (path, query) = match target.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (target, None),
    };

    if path.starts_with("/test") {
        return RemoteRequest::Ping;
    }
    if path.starts_with("/status") {
        return RemoteRequest::Status;
    }

    let routes: [(&str, EventCode); 8] = [
        ("/play", EventCode::PlayPause),
        ("/pause", EventCode::PlayPause),
        ("/next", EventCode::Next),
        ("/prev", EventCode::Prev),
        ("/vol_up", EventCode::VolumeUp),
        ("/vol_down", EventCode::VolumeDown),
        ("/mute", EventCode::MuteToggle),
        ("/mode", EventCode::ModeToggle),
    ];
    if let Some((_, code)) = routes.iter().find(|(prefix, _)| path.starts_with(prefix)) {
        return RemoteRequest::Command(Command::Event(*code));
    }

    let mode = if path.starts_with("/local") {
        SourceMode::Local
    } else if path.starts_with("/cloud") {
        SourceMode::Cloud
    } else {
        return RemoteRequest::Unknown;
    };
    RemoteRequest::Command(Command::Select {
        mode,
        index: song_index(query),
    })
}

/// `song=N` from a query string. Missing or malformed values select track 0.
fn song_index(query: Option<&str>) -> usize {
    query
        .into_iter()
        .flat_map(|q| q.split('&'))
        .find_map(|pair| pair.strip_prefix("song="))
        .and_then(|value| value.parse().ok())
        .unwrap_or(0)
}

/// A complete `200 OK` response with CORS open to any origin
pub fn response(content_type: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 200 OK\r\n\
         Content-Type: {}\r\n\
         Access-Control-Allow-Origin: *\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\r\n{}",
        content_type,
        body.len(),
        body
    )
}

pub fn text_response(body: &str) -> String {
    response("text/plain", body)
}

pub fn html_response() -> String {
    response("text/html", CONTROL_PAGE)
}

/// Plain-text body for `/status`
pub fn status_text(snapshot: &SessionSnapshot) -> String {
    format!(
        "state={}\nmode={}\nindex={}\ntitle={}\nartist={}\nvolume={}\nmuted={}\n",
        snapshot.state,
        snapshot.mode,
        snapshot.index,
        snapshot.title.as_deref().unwrap_or(""),
        snapshot.artist.as_deref().unwrap_or(""),
        snapshot.volume,
        snapshot.muted
    )
}
