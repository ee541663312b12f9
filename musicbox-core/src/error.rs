use std::path::PathBuf;

use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Failures while controlling the external player process.
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("Failed to signal process {pid}: {source}")]
    Signal { pid: u32, source: nix::errno::Errno },

    #[error("Failed to reap process {pid}: {source}")]
    Wait { pid: u32, source: std::io::Error },
}

/// Failures of the input producers.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("Failed to open input {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Input I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to poll inputs: {0}")]
    Poll(nix::errno::Errno),

    #[error("Failed to start input thread: {0}")]
    Spawn(std::io::Error),
}
