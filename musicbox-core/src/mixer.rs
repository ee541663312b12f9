use std::process::{Command, Stdio};

/// Output level control. Fire-and-forget: failures are logged, never returned.
pub trait Mixer {
    fn set_level(&mut self, percent: u8);
}

/// Drives the ALSA mixer through `amixer -c <card> sset <control> <N>%`
#[derive(Debug, Clone)]
pub struct Amixer {
    program: String,
    card: u32,
    control: String,
}

impl Amixer {
    pub fn new(program: &str, card: u32, control: &str) -> Self {
        Self {
            program: program.to_string(),
            card,
            control: control.to_string(),
        }
    }

    fn args(&self, percent: u8) -> Vec<String> {
        vec![
            "-c".to_string(),
            self.card.to_string(),
            "sset".to_string(),
            self.control.clone(),
            format!("{}%", percent.min(100)),
        ]
    }
}

impl Mixer for Amixer {
    fn set_level(&mut self, percent: u8) {
        let result = Command::new(&self.program)
            .args(self.args(percent))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        match result {
            Ok(status) if status.success() => log::debug!("mixer set to {}%", percent),
            Ok(status) => log::warn!("{} exited with {}", self.program, status),
            Err(e) => log::warn!("failed to run {}: {}", self.program, e),
        }
    }
}
