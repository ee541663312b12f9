use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use strum::EnumIter;

/// Which catalog the session plays from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumIter, strum::Display)]
pub enum SourceMode {
    #[default]
    #[strum(serialize = "Local Mode")]
    Local,
    #[strum(serialize = "Cloud Mode")]
    Cloud,
}

impl SourceMode {
    pub fn toggled(self) -> SourceMode {
        match self {
            SourceMode::Local => SourceMode::Cloud,
            SourceMode::Cloud => SourceMode::Local,
        }
    }
}

/// A single playable entry with its display metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub title: String,
    pub artist: String,
    /// File path for local tracks, URL for cloud tracks
    pub location: String,
}

impl Track {
    pub fn new(title: &str, artist: &str, location: &str) -> Self {
        Self {
            title: title.to_string(),
            artist: artist.to_string(),
            location: location.to_string(),
        }
    }
}

/// What the player process has to be bound to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackTarget {
    /// A file on local storage
    File(PathBuf),
    /// A remote locator streamed through the fetcher
    Stream(String),
}

/// A fixed, read-only list of tracks for one source mode
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    tracks: Vec<Track>,
}

impl Catalog {
    pub fn new(tracks: Vec<Track>) -> Self {
        Self { tracks }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Get track by index, wrapping modulo the catalog length
    pub fn get(&self, index: usize) -> Option<&Track> {
        if self.tracks.is_empty() {
            return None;
        }
        self.tracks.get(index % self.tracks.len())
    }

    /// Index after `current`, wrapping to the start
    pub fn next_index(&self, current: usize) -> usize {
        if self.tracks.is_empty() {
            return 0;
        }
        (current + 1) % self.tracks.len()
    }

    /// Index before `current`, wrapping to the last entry
    pub fn prev_index(&self, current: usize) -> usize {
        if self.tracks.is_empty() {
            return 0;
        }
        if current == 0 || current > self.tracks.len() {
            self.tracks.len() - 1
        } else {
            current - 1
        }
    }

    /// Re-clamp an index from another catalog into this one's range
    pub fn clamp_index(&self, index: usize) -> usize {
        if self.tracks.is_empty() {
            0
        } else {
            index % self.tracks.len()
        }
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }
}

/// The two parallel catalogs
#[derive(Debug, Clone, Default)]
pub struct Catalogs {
    pub local: Catalog,
    pub cloud: Catalog,
}

impl Catalogs {
    pub fn new(local: Catalog, cloud: Catalog) -> Self {
        Self { local, cloud }
    }

    pub fn for_mode(&self, mode: SourceMode) -> &Catalog {
        match mode {
            SourceMode::Local => &self.local,
            SourceMode::Cloud => &self.cloud,
        }
    }

    /// Build the player target for a track in the given mode
    pub fn target(&self, mode: SourceMode, index: usize) -> Option<PlaybackTarget> {
        let track = self.for_mode(mode).get(index)?;
        Some(match mode {
            SourceMode::Local => PlaybackTarget::File(PathBuf::from(&track.location)),
            SourceMode::Cloud => PlaybackTarget::Stream(track.location.clone()),
        })
    }
}
