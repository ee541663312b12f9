//! Control of the external audio player process.
//!
//! The session never builds a shell command line: the player is spawned
//! directly with an argument list. Cloud tracks are a two-process pipeline
//! (fetcher stdout into decoder stdin) owned by one [`SystemProcess`].

use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;

use crate::catalog::PlaybackTarget;
use crate::error::PlayerError;

/// How often `terminate` re-checks a child during the grace period
const REAP_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Lifecycle operations on one running player
pub trait PlayerProcess {
    /// OS process id of the decoder
    fn id(&self) -> u32;

    /// Suspend in place without terminating
    fn pause(&mut self) -> Result<(), PlayerError>;

    /// Continue a suspended process
    fn resume(&mut self) -> Result<(), PlayerError>;

    /// Non-blocking liveness check; reaps the process if it has exited
    fn has_exited(&mut self) -> bool;

    /// Ask the process to exit, escalate after `grace`, and reap it
    fn terminate(&mut self, grace: Duration) -> Result<(), PlayerError>;
}

/// Something that can start a player bound to a target
pub trait PlayerBackend {
    type Process: PlayerProcess;

    fn spawn(&mut self, target: &PlaybackTarget) -> Result<Self::Process, PlayerError>;
}

/// Program plus fixed leading arguments
#[derive(Debug, Clone)]
pub struct ProgramSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl ProgramSpec {
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }
}

/// Spawns real child processes (mpg123 and friends)
#[derive(Debug, Clone)]
pub struct SystemPlayer {
    decoder: ProgramSpec,
    fetcher: ProgramSpec,
}

impl SystemPlayer {
    pub fn new(decoder: ProgramSpec, fetcher: ProgramSpec) -> Self {
        Self { decoder, fetcher }
    }

    fn spawn_file(&self, path: &std::path::Path) -> Result<SystemProcess, PlayerError> {
        let child = self
            .decoder
            .command()
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| PlayerError::Spawn {
                program: self.decoder.program.clone(),
                source,
            })?;
        Ok(SystemProcess {
            decoder: child,
            fetcher: None,
        })
    }

    fn spawn_stream(&self, url: &str) -> Result<SystemProcess, PlayerError> {
        let mut fetcher = self
            .fetcher
            .command()
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| PlayerError::Spawn {
                program: self.fetcher.program.clone(),
                source,
            })?;

        let Some(stream) = fetcher.stdout.take() else {
            let _ = fetcher.kill();
            let _ = fetcher.wait();
            return Err(PlayerError::Spawn {
                program: self.fetcher.program.clone(),
                source: std::io::Error::other("fetcher stdout not captured"),
            });
        };

        let decoder = self
            .decoder
            .command()
            .arg("-")
            .stdin(Stdio::from(stream))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();

        match decoder {
            Ok(decoder) => Ok(SystemProcess {
                decoder,
                fetcher: Some(fetcher),
            }),
            Err(source) => {
                let _ = fetcher.kill();
                let _ = fetcher.wait();
                Err(PlayerError::Spawn {
                    program: self.decoder.program.clone(),
                    source,
                })
            }
        }
    }
}

impl PlayerBackend for SystemPlayer {
    type Process = SystemProcess;

    fn spawn(&mut self, target: &PlaybackTarget) -> Result<SystemProcess, PlayerError> {
        let process = match target {
            PlaybackTarget::File(path) => self.spawn_file(path)?,
            PlaybackTarget::Stream(url) => self.spawn_stream(url)?,
        };
        log::debug!("spawned player pid {} for {:?}", process.id(), target);
        Ok(process)
    }
}

/// A running decoder, plus its fetcher for streamed tracks
#[derive(Debug)]
pub struct SystemProcess {
    decoder: Child,
    fetcher: Option<Child>,
}

impl SystemProcess {
    fn signal(&self, signal: Signal) -> Result<(), PlayerError> {
        send_signal(self.decoder.id(), signal)
    }
}

impl PlayerProcess for SystemProcess {
    fn id(&self) -> u32 {
        self.decoder.id()
    }

    fn pause(&mut self) -> Result<(), PlayerError> {
        self.signal(Signal::SIGSTOP)
    }

    fn resume(&mut self) -> Result<(), PlayerError> {
        self.signal(Signal::SIGCONT)
    }

    fn has_exited(&mut self) -> bool {
        // An error from try_wait means the child is no longer ours to wait on
        !matches!(self.decoder.try_wait(), Ok(None))
    }

    fn terminate(&mut self, grace: Duration) -> Result<(), PlayerError> {
        let result = stop_child(&mut self.decoder, grace);
        if let Some(fetcher) = self.fetcher.as_mut() {
            if let Err(e) = stop_child(fetcher, grace) {
                log::warn!("fetcher cleanup failed: {}", e);
            }
        }
        result
    }
}

fn send_signal(pid: u32, signal: Signal) -> Result<(), PlayerError> {
    let raw = i32::try_from(pid).map_err(|_| PlayerError::Signal {
        pid,
        source: nix::errno::Errno::ESRCH,
    })?;
    kill(Pid::from_raw(raw), signal).map_err(|source| PlayerError::Signal { pid, source })
}

/// SIGTERM, then SIGCONT so a suspended child can act on it, then wait up to
/// `grace` before SIGKILL. Always reaps.
fn stop_child(child: &mut Child, grace: Duration) -> Result<(), PlayerError> {
    let pid = child.id();
    if let Ok(Some(_)) = child.try_wait() {
        return Ok(());
    }

    // ESRCH here means it exited between the check and the signal
    let _ = send_signal(pid, Signal::SIGTERM);
    let _ = send_signal(pid, Signal::SIGCONT);

    let deadline = Instant::now() + grace;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                log::debug!("player {} exited: {}", pid, status);
                return Ok(());
            }
            Ok(None) if Instant::now() < deadline => thread::sleep(REAP_POLL_INTERVAL),
            Ok(None) => break,
            Err(source) => return Err(PlayerError::Wait { pid, source }),
        }
    }

    log::warn!("player {} ignored SIGTERM for {:?}, killing", pid, grace);
    let _ = child.kill();
    child
        .wait()
        .map(|_| ())
        .map_err(|source| PlayerError::Wait { pid, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn sleeper() -> SystemPlayer {
        // `sleep <path>` stands in for a decoder that runs until told otherwise
        SystemPlayer::new(ProgramSpec::new("sleep", &[]), ProgramSpec::new("true", &[]))
    }

    #[test]
    fn test_missing_binary_reports_spawn_error() {
        let mut player = SystemPlayer::new(
            ProgramSpec::new("/nonexistent/mpg123", &["-q"]),
            ProgramSpec::new("/nonexistent/wget", &["-qO-"]),
        );
        let err = player.spawn(&PlaybackTarget::File(PathBuf::from("/music/a.mp3")));
        assert!(matches!(err, Err(PlayerError::Spawn { .. })));
        let err = player.spawn(&PlaybackTarget::Stream("https://example.org/a.mp3".to_string()));
        assert!(matches!(err, Err(PlayerError::Spawn { .. })));
    }

    #[test]
    fn test_pause_resume_terminate_real_process() {
        let mut player = sleeper();
        let mut process = player
            .spawn(&PlaybackTarget::File(PathBuf::from("30")))
            .expect("spawn sleep");
        assert!(!process.has_exited());
        process.pause().expect("pause");
        process.resume().expect("resume");
        process.pause().expect("pause again");
        // Terminating a stopped process must still reap it
        process.terminate(Duration::from_secs(1)).expect("terminate");
        assert!(process.has_exited());
    }

    #[test]
    fn test_signal_after_exit_fails() {
        let mut player = SystemPlayer::new(ProgramSpec::new("true", &[]), ProgramSpec::new("true", &[]));
        let mut process = player
            .spawn(&PlaybackTarget::File(PathBuf::from("ignored")))
            .expect("spawn true");
        let deadline = Instant::now() + Duration::from_secs(5);
        while !process.has_exited() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert!(process.has_exited());
        // Reaped pid: signalling it is an error the session must recover from
        assert!(process.pause().is_err());
    }

    /// Children of this test process left as zombies, by command name
    fn zombie_children(comm: &str) -> Vec<String> {
        let me = std::process::id().to_string();
        let Ok(entries) = std::fs::read_dir("/proc") else {
            return Vec::new();
        };
        entries
            .filter_map(|entry| std::fs::read_to_string(entry.ok()?.path().join("stat")).ok())
            .filter(|stat| {
                // pid (comm) state ppid ...
                let Some((name, rest)) = stat.split_once(") ") else {
                    return false;
                };
                let mut fields = rest.split_whitespace();
                name.ends_with(&format!("({comm}"))
                    && fields.next() == Some("Z")
                    && fields.next() == Some(me.as_str())
            })
            .collect()
    }

    #[test]
    fn test_stream_that_ends_leaves_no_children() {
        use crate::catalog::{Catalog, Catalogs, SourceMode, Track};
        use crate::mocks::RecordingMixer;
        use crate::session::{Notice, PlaybackSession, SessionSettings};

        // `printf <url>` feeds a few bytes into `cat -`, then both exit
        let player = SystemPlayer::new(ProgramSpec::new("cat", &[]), ProgramSpec::new("printf", &[]));
        let cloud = Catalog::new(vec![Track::new("a", "x", "https://example.org/a.mp3")]);
        let mut session = PlaybackSession::new(
            player,
            RecordingMixer::new(),
            Catalogs::new(Catalog::new(Vec::new()), cloud),
            SessionSettings {
                auto_advance: false,
                ..SessionSettings::default()
            },
        );
        assert_eq!(
            session.select(SourceMode::Cloud, 0),
            Notice::TrackSelected {
                mode: SourceMode::Cloud,
                index: 0
            }
        );

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut finished = None;
        while finished.is_none() && Instant::now() < deadline {
            finished = session.poll_player();
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(finished, Some(Notice::TrackFinished));
        assert!(zombie_children("printf").is_empty(), "fetcher left unreaped");
    }
}
