//! Store configuration.
//!
//! Loadable from JSON:
//!
//! ```json
//! {
//!   "data_dir": "/data/sdoml-lite",
//!   "channels": ["hmi_m", "aia_0171"],
//!   "date_start": "2022-11-01T00:00:00",
//!   "date_exclusions": [{ "start": "2022-11-05T00:00:00", "end": "2022-11-06T00:00:00" }]
//! }
//! ```

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::core::{
    ExclusionWindow, TemporalParams, DEFAULT_CADENCE_MINUTES, DEFAULT_MEMO_CAPACITY, MANIFEST_NAME, NAME_SEPARATOR,
};
use crate::decode::ChannelFormat;
use crate::util::{Error, Result};

/// Channels used when none are configured.
pub const DEFAULT_CHANNELS: &[&str] = &["hmi_m", "aia_0131", "aia_0171", "aia_0193", "aia_0211", "aia_1600"];

/// A requested channel and the member postfix it is stored under.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Channel {
    /// Name as configured, e.g. `hmi_m`.
    pub name: String,
    /// Member postfix, e.g. `hmi_m.npy`.
    pub postfix: String,
}

impl Channel {
    /// Names without an extension are stored as `.npy` members.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let postfix = if name.contains(NAME_SEPARATOR) {
            name.clone()
        } else {
            format!("{}{}{}", name, NAME_SEPARATOR, ChannelFormat::Npy.extension())
        };
        Self { name, postfix }
    }
}

/// Everything needed to open a [`SampleStore`](super::SampleStore).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct StoreConfig {
    /// Directory holding the tar containers.
    pub data_dir: PathBuf,
    /// Channels stacked into every sample, in order.
    pub channels: Vec<String>,
    pub date_start: Option<NaiveDateTime>,
    /// Exclusive.
    pub date_end: Option<NaiveDateTime>,
    pub date_exclusions: Vec<ExclusionWindow>,
    pub cadence_minutes: u32,
    /// Memory-map containers while indexing.
    pub use_mmap: bool,
    /// Capacity of each prefix memo table.
    pub memo_capacity: usize,
    /// Decoded channels kept in memory; 0 disables the cache.
    pub channel_cache_entries: usize,
    pub manifest_name: String,
    /// Where index artifacts are written. Defaults to `data_dir`.
    pub cache_dir: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::new(),
            channels: DEFAULT_CHANNELS.iter().map(|c| c.to_string()).collect(),
            date_start: None,
            date_end: None,
            date_exclusions: Vec::new(),
            cadence_minutes: DEFAULT_CADENCE_MINUTES,
            use_mmap: true,
            memo_capacity: DEFAULT_MEMO_CAPACITY,
            channel_cache_entries: 0,
            manifest_name: MANIFEST_NAME.to_string(),
            cache_dir: None,
        }
    }
}

impl StoreConfig {
    /// Default configuration for a data directory.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Parse a JSON configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::from_open(path, e))?;
        serde_json::from_str(&text).map_err(|e| Error::InvalidConfig(format!("{}: {}", path.display(), e)))
    }

    pub fn with_channels<S: Into<String>>(mut self, channels: impl IntoIterator<Item = S>) -> Self {
        self.channels = channels.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_date_start(mut self, start: NaiveDateTime) -> Self {
        self.date_start = Some(start);
        self
    }

    pub fn with_date_end(mut self, end: NaiveDateTime) -> Self {
        self.date_end = Some(end);
        self
    }

    /// Add an exclusion window `[start, end)`.
    pub fn with_exclusion(mut self, window: ExclusionWindow) -> Self {
        self.date_exclusions.push(window);
        self
    }

    pub fn with_cadence_minutes(mut self, minutes: u32) -> Self {
        self.cadence_minutes = minutes;
        self
    }

    pub fn with_mmap(mut self, use_mmap: bool) -> Self {
        self.use_mmap = use_mmap;
        self
    }

    pub fn with_memo_capacity(mut self, capacity: usize) -> Self {
        self.memo_capacity = capacity;
        self
    }

    pub fn with_channel_cache_entries(mut self, entries: usize) -> Self {
        self.channel_cache_entries = entries;
        self
    }

    pub fn with_manifest_name(mut self, name: impl Into<String>) -> Self {
        self.manifest_name = name.into();
        self
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    /// Directory for index artifacts.
    pub fn artifact_dir(&self) -> &Path {
        self.cache_dir.as_deref().unwrap_or(&self.data_dir)
    }

    /// Configured channels with their member postfixes.
    pub fn resolved_channels(&self) -> Vec<Channel> {
        self.channels.iter().map(Channel::new).collect()
    }

    /// Parameters for building the temporal index.
    pub fn temporal_params(&self) -> TemporalParams {
        let mut params = TemporalParams::new(self.resolved_channels().into_iter().map(|c| c.postfix))
            .with_cadence_minutes(self.cadence_minutes)
            .with_exclusions(self.date_exclusions.clone())
            .with_memo_capacity(self.memo_capacity);
        params.start = self.date_start;
        params.end = self.date_end;
        params
    }

    /// Reject configurations that cannot produce a store.
    pub fn validate(&self) -> Result<()> {
        if self.channels.is_empty() {
            return Err(Error::InvalidConfig("at least one channel is required".into()));
        }
        if let Some(name) = self.channels.iter().find(|c| c.is_empty()) {
            return Err(Error::InvalidConfig(format!("empty channel name in {:?} ({name:?})", self.channels)));
        }
        if self.cadence_minutes == 0 {
            return Err(Error::InvalidConfig("cadence_minutes must be at least 1".into()));
        }
        for w in &self.date_exclusions {
            ExclusionWindow::new(w.start, w.end)?;
        }
        if !self.data_dir.is_dir() {
            return Err(Error::FileNotFound(self.data_dir.clone()));
        }
        Ok(())
    }
}
