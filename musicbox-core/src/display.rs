use std::fmt::Write as _;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

use crate::commands::EventCode;
use crate::session::{RunState, SessionSnapshot};

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";
const RULE: &str = "=============================================";
const THIN_RULE: &str = "---------------------------------------------";

/// Control legend, one line per physical control
const LEGEND: [(EventCode, &str); 7] = [
    (EventCode::PlayPause, "Play/Pause"),
    (EventCode::Next, "Next Song"),
    (EventCode::Prev, "Previous Song"),
    (EventCode::VolumeUp, "Volume Up"),
    (EventCode::VolumeDown, "Volume Down"),
    (EventCode::MuteToggle, "Mute Toggle"),
    (EventCode::ModeToggle, "Cloud/Local Toggle"),
];

/// Render the full status screen for a snapshot. Pure: same input, same text.
pub fn render_status(snapshot: &SessionSnapshot, info: &str, remote_port: Option<u16>) -> String {
    let mut out = String::with_capacity(1024);
    let title = snapshot.title.as_deref().unwrap_or("-");
    let artist = snapshot.artist.as_deref().unwrap_or("-");
    let number = if snapshot.catalog_len == 0 { 0 } else { snapshot.index + 1 };
    let volume = if snapshot.muted {
        "MUTED".to_string()
    } else {
        format!("{}%", snapshot.volume)
    };
    let status = match snapshot.state {
        RunState::Stopped => "Stopped",
        RunState::Playing => "Playing",
        RunState::Paused => "Paused",
    };

    // Writing into a String cannot fail
    let _ = writeln!(out, "{CLEAR_SCREEN}{RULE}");
    let _ = writeln!(out, "              MUSIC BOX PLAYER");
    let _ = writeln!(out, "{RULE}\n");
    let _ = writeln!(out, "  SONG      : {}", title);
    let _ = writeln!(out, "  NUMBER    : {} / {}", number, snapshot.catalog_len);
    let _ = writeln!(out, "  MODE      : {}", snapshot.mode);
    let _ = writeln!(out, "  STATUS    : {}", status);
    let _ = writeln!(out, "  VOLUME    : {}", volume);
    let _ = writeln!(out, "  ARTIST    : {}", artist);
    let _ = writeln!(out, "\n  INFO      : {}\n", info);
    let _ = writeln!(out, "{THIN_RULE}");
    let _ = writeln!(out, "  CONTROLS");
    for (code, label) in LEGEND {
        let _ = writeln!(out, "   {} = {}", code.as_byte() as char, label);
    }
    let _ = writeln!(out, "{THIN_RULE}");
    match remote_port {
        Some(port) => {
            let _ = writeln!(out, "  REMOTE:  http://<device-ip>:{}", port);
        }
        None => {
            let _ = writeln!(out, "  REMOTE:  disabled");
        }
    }
    let _ = writeln!(out, "{THIN_RULE}");
    out
}

/// Writes a fresh status screen after every transition
pub struct StatusDisplay<W: Write> {
    out: W,
    remote_port: Option<u16>,
}

impl<W: Write> StatusDisplay<W> {
    pub fn new(out: W, remote_port: Option<u16>) -> Self {
        Self { out, remote_port }
    }

    pub fn set_remote_port(&mut self, port: Option<u16>) {
        self.remote_port = port;
    }

    /// Display problems never stop playback; they are only logged
    pub fn show(&mut self, snapshot: &SessionSnapshot, info: &str) {
        let text = render_status(snapshot, info, self.remote_port);
        if let Err(e) = self.out.write_all(text.as_bytes()).and_then(|_| self.out.flush()) {
            log::warn!("display write failed: {}", e);
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl StatusDisplay<Box<dyn Write + Send>> {
    /// Open the text console, falling back to stdout
    pub fn open_tty(path: &Path, remote_port: Option<u16>) -> Self {
        let out: Box<dyn Write + Send> = match OpenOptions::new().write(true).open(path) {
            Ok(file) => Box::new(file),
            Err(e) => {
                log::warn!("cannot open {}: {}, using stdout", path.display(), e);
                Box::new(io::stdout())
            }
        };
        Self::new(out, remote_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SourceMode;

    fn snapshot() -> SessionSnapshot {
        SessionSnapshot {
            state: RunState::Playing,
            mode: SourceMode::Cloud,
            index: 1,
            catalog_len: 5,
            title: Some("FEIN".to_string()),
            artist: Some("Travis Scott".to_string()),
            volume: 60,
            muted: false,
            pid: Some(42),
        }
    }

    #[test]
    fn test_render_contains_fields() {
        let text = render_status(&snapshot(), "Playing", Some(8888));
        assert!(text.starts_with(CLEAR_SCREEN));
        assert!(text.contains("SONG      : FEIN"));
        assert!(text.contains("NUMBER    : 2 / 5"));
        assert!(text.contains("MODE      : Cloud Mode"));
        assert!(text.contains("VOLUME    : 60%"));
        assert!(text.contains("ARTIST    : Travis Scott"));
        assert!(text.contains("   P = Play/Pause"));
        assert!(text.contains("http://<device-ip>:8888"));
    }

    #[test]
    fn test_render_shows_muted() {
        let mut snap = snapshot();
        snap.muted = true;
        let text = render_status(&snap, "Muted", None);
        assert!(text.contains("VOLUME    : MUTED"));
        assert!(text.contains("REMOTE:  disabled"));
    }

    #[test]
    fn test_render_is_pure() {
        let snap = snapshot();
        assert_eq!(
            render_status(&snap, "x", Some(1)),
            render_status(&snap, "x", Some(1))
        );
    }

    #[test]
    fn test_display_writes_to_sink() {
        let mut display = StatusDisplay::new(Vec::new(), Some(8888));
        display.show(&snapshot(), "Idle");
        let written = String::from_utf8(display.into_inner()).expect("utf8");
        assert!(written.contains("INFO      : Idle"));
    }

    #[test]
    fn test_open_tty_falls_back_to_stdout() {
        let mut display = StatusDisplay::open_tty(Path::new("/nonexistent/tty9"), None);
        display.show(&snapshot(), "fallback");
    }
}
