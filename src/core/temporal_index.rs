//! Temporal index: the sorted list of dated, channel-complete samples.
//!
//! The theoretical timeline is every `cadence` step in `[start, end)`. A slot
//! survives when its prefix exists in the [`SampleIndex`], carries every
//! requested channel, and lies outside all exclusion windows. The surviving
//! list is cached on disk under a name derived from the channels, bounds
//! and exclusion windows.

use std::collections::HashSet;
use std::path::Path;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::cache::BoundedCache;
use super::sample_index::SampleIndex;
use crate::util::{load_artifact, save_artifact, Error, Result};

/// Prefix token format, e.g. `2022/11/01/0015`.
pub const PREFIX_FORMAT: &str = "%Y/%m/%d/%H%M";

/// Canonical timestamp format returned with every sample.
pub const CANONICAL_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Timestamp format used inside cache artifact names.
const CACHE_KEY_FORMAT: &str = "%Y%m%dT%H%M%S";

/// Default slot spacing.
pub const DEFAULT_CADENCE_MINUTES: u32 = 15;

/// Default capacity of each prefix memo table.
pub const DEFAULT_MEMO_CAPACITY: usize = 100_000;

/// Accepted textual timestamp forms, tried in order.
const TEXT_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    PREFIX_FORMAT,
];

/// Parse a user supplied timestamp (`2022-11-01T00:15[:00[.000]]`, space
/// separated variants, `2022-11-01`, or a prefix token).
pub fn parse_timestamp(text: &str) -> Result<NaiveDateTime> {
    let text = text.trim();
    for fmt in TEXT_FORMATS {
        if let Ok(t) = NaiveDateTime::parse_from_str(text, fmt) {
            return Ok(t);
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| Error::InvalidTimestamp(text.to_string()))
}

/// Canonical string form of a timestamp.
pub fn canonical(date: &NaiveDateTime) -> String {
    date.format(CANONICAL_FORMAT).to_string()
}

/// Timestamp <-> prefix conversion with bounded memo tables.
pub struct PrefixCodec {
    to_prefix: BoundedCache<NaiveDateTime, String>,
    to_date: BoundedCache<String, Option<NaiveDateTime>>,
}

impl PrefixCodec {
    /// Codec whose memo tables hold at most `capacity` entries each.
    pub fn new(capacity: usize) -> Self {
        Self {
            to_prefix: BoundedCache::new(capacity),
            to_date: BoundedCache::new(capacity),
        }
    }

    /// Prefix token of a timestamp.
    pub fn prefix(&self, date: NaiveDateTime) -> String {
        self.to_prefix
            .get_or_insert_with(date, || date.format(PREFIX_FORMAT).to_string())
    }

    /// Timestamp of a prefix token, `None` if it does not parse.
    pub fn date(&self, prefix: &str) -> Option<NaiveDateTime> {
        if let Some(hit) = self.to_date.get(&prefix.to_string()) {
            return hit;
        }
        let parsed = NaiveDateTime::parse_from_str(prefix, PREFIX_FORMAT).ok();
        self.to_date.insert(prefix.to_string(), parsed);
        parsed
    }
}

impl Default for PrefixCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MEMO_CAPACITY)
    }
}

/// Half-open interval `[start, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl DateRange {
    /// True when `start <= date < end`.
    #[inline]
    pub fn contains(&self, date: &NaiveDateTime) -> bool {
        *date >= self.start && *date < self.end
    }
}

/// Window whose timestamps are removed from the index regardless of data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExclusionWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl ExclusionWindow {
    /// Create a window; `end` before `start` is rejected.
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self> {
        if end < start {
            return Err(Error::InvalidConfig(format!(
                "exclusion window ends before it starts: {} - {}",
                canonical(&start),
                canonical(&end)
            )));
        }
        Ok(Self { start, end })
    }

    /// Parse both bounds with [`parse_timestamp`].
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        Self::new(parse_timestamp(start)?, parse_timestamp(end)?)
    }

    /// True when `start <= date < end`.
    #[inline]
    pub fn contains(&self, date: &NaiveDateTime) -> bool {
        *date >= self.start && *date < self.end
    }
}

/// Construction parameters of a [`TemporalIndex`].
#[derive(Clone, Debug, PartialEq)]
pub struct TemporalParams {
    /// Required postfixes; order defines channel stacking order.
    pub channels: Vec<String>,
    /// Requested first slot, defaults to the earliest prefix.
    pub start: Option<NaiveDateTime>,
    /// Requested exclusive end, defaults to one cadence past the latest prefix.
    pub end: Option<NaiveDateTime>,
    pub cadence_minutes: u32,
    pub exclusions: Vec<ExclusionWindow>,
    /// Capacity of each prefix memo table.
    pub memo_capacity: usize,
}

impl TemporalParams {
    /// Parameters for the given channel postfixes with default cadence and no bounds.
    pub fn new<S: Into<String>>(channels: impl IntoIterator<Item = S>) -> Self {
        Self {
            channels: channels.into_iter().map(Into::into).collect(),
            start: None,
            end: None,
            cadence_minutes: DEFAULT_CADENCE_MINUTES,
            exclusions: Vec::new(),
            memo_capacity: DEFAULT_MEMO_CAPACITY,
        }
    }

    pub fn with_start(mut self, start: NaiveDateTime) -> Self {
        self.start = Some(start);
        self
    }

    pub fn with_end(mut self, end: NaiveDateTime) -> Self {
        self.end = Some(end);
        self
    }

    pub fn with_cadence_minutes(mut self, minutes: u32) -> Self {
        self.cadence_minutes = minutes;
        self
    }

    pub fn with_exclusions(mut self, exclusions: Vec<ExclusionWindow>) -> Self {
        self.exclusions = exclusions;
        self
    }

    pub fn with_memo_capacity(mut self, capacity: usize) -> Self {
        self.memo_capacity = capacity;
        self
    }

    fn cadence(&self) -> Result<Duration> {
        if self.cadence_minutes == 0 {
            return Err(Error::InvalidConfig("cadence must be at least one minute".into()));
        }
        Ok(Duration::minutes(self.cadence_minutes as i64))
    }
}

/// Earliest and latest parseable prefix, as `[earliest, latest + cadence)`.
pub fn discover_range(samples: &SampleIndex, codec: &PrefixCodec, cadence: Duration) -> Option<DateRange> {
    let mut bounds: Option<(NaiveDateTime, NaiveDateTime)> = None;
    for prefix in samples.prefixes() {
        let Some(date) = codec.date(prefix) else {
            continue;
        };
        bounds = Some(match bounds {
            Some((lo, hi)) => (lo.min(date), hi.max(date)),
            None => (date, date),
        });
    }
    bounds.map(|(lo, hi)| DateRange {
        start: lo,
        end: hi + cadence,
    })
}

/// Apply requested bounds to the discovered range.
///
/// A requested start must lie in `[lo, hi)` and a requested end in
/// `(start, hi]`; anything else falls back to the discovered bound.
pub fn resolve_range(discovered: DateRange, start: Option<NaiveDateTime>, end: Option<NaiveDateTime>) -> DateRange {
    let mut range = discovered;
    if let Some(start) = start {
        if start >= discovered.start && start < discovered.end {
            range.start = start;
        } else {
            warn!("Start date {} out of range, using default {}", canonical(&start), canonical(&discovered.start));
        }
    }
    if let Some(end) = end {
        if end > range.start && end <= discovered.end {
            range.end = end;
        } else {
            warn!("End date {} out of range, using default {}", canonical(&end), canonical(&discovered.end));
        }
    }
    range
}

/// Artifact file name for a parameter set. Order sensitive in channels and windows.
pub fn cache_key(channels: &[String], range: &DateRange, cadence_minutes: u32, exclusions: &[ExclusionWindow]) -> String {
    let mut key = format!(
        "dates_index_{}_{}_{}_{}min",
        channels.join("_"),
        range.start.format(CACHE_KEY_FORMAT),
        range.end.format(CACHE_KEY_FORMAT),
        cadence_minutes
    );
    if !exclusions.is_empty() {
        key.push_str("_exclusions");
        for w in exclusions {
            key.push_str(&format!("__{}_{}", w.start.format(CACHE_KEY_FORMAT), w.end.format(CACHE_KEY_FORMAT)));
        }
    }
    key
}

#[derive(Serialize, Deserialize)]
struct DatesArtifact {
    dates: Vec<NaiveDateTime>,
}

/// Sorted, duplicate-free list of dated sample timestamps.
pub struct TemporalIndex {
    dates: Vec<NaiveDateTime>,
    date_set: HashSet<NaiveDateTime>,
    range: DateRange,
    cadence: Duration,
    total_slots: usize,
    channels: Vec<String>,
    exclusions: Vec<ExclusionWindow>,
    codec: PrefixCodec,
}

impl TemporalIndex {
    /// Build the index, reading and writing the date-list artifact in
    /// `cache_dir` when given.
    ///
    /// Fails with [`Error::NoDatedSamples`] when no slot survives.
    pub fn build(samples: &SampleIndex, params: &TemporalParams, cache_dir: Option<&Path>) -> Result<Self> {
        let cadence = params.cadence()?;
        let codec = PrefixCodec::new(params.memo_capacity);
        let no_samples = || Error::NoDatedSamples(params.channels.join(", "));

        let discovered = discover_range(samples, &codec, cadence).ok_or_else(no_samples)?;
        let range = resolve_range(discovered, params.start, params.end);
        let total_slots = ((range.end - range.start).num_minutes() / cadence.num_minutes()).max(0) as usize;

        info!("Start date : {}", canonical(&range.start));
        info!("End date   : {}", canonical(&range.end));
        info!("Delta      : {} minutes", params.cadence_minutes);
        info!("Channels   : {}", params.channels.join(", "));
        for w in &params.exclusions {
            info!("Exclusion  : {} - {}", canonical(&w.start), canonical(&w.end));
        }

        let compute = || Self::scan(samples, params, &codec, range, cadence, total_slots);
        let dates = match cache_dir {
            Some(dir) => {
                let path = dir.join(cache_key(&params.channels, &range, params.cadence_minutes, &params.exclusions));
                if path.exists() {
                    info!("Loading dates from cache: {}", path.display());
                    load_artifact::<DatesArtifact>(&path)?.dates
                } else {
                    let dates = compute();
                    info!("Saving dates to cache: {}", path.display());
                    save_artifact(&path, &DatesArtifact { dates: dates.clone() })?;
                    dates
                }
            }
            None => compute(),
        };

        if dates.is_empty() {
            return Err(no_samples());
        }

        info!("Frames total    : {}", total_slots);
        info!("Frames available: {}", dates.len());
        info!("Frames dropped  : {}", total_slots.saturating_sub(dates.len()));

        let date_set = dates.iter().copied().collect();
        Ok(Self {
            dates,
            date_set,
            range,
            cadence,
            total_slots,
            channels: params.channels.clone(),
            exclusions: params.exclusions.clone(),
            codec,
        })
    }

    fn scan(
        samples: &SampleIndex,
        params: &TemporalParams,
        codec: &PrefixCodec,
        range: DateRange,
        cadence: Duration,
        total_slots: usize,
    ) -> Vec<NaiveDateTime> {
        debug!("Checking complete channels over {} slots", total_slots);
        let step = cadence.num_minutes();
        let mut dates = Vec::new();
        for i in 0..total_slots as i64 {
            let date = range.start + Duration::minutes(step * i);
            if params.exclusions.iter().any(|w| w.contains(&date)) {
                continue;
            }
            let prefix = codec.prefix(date);
            if samples.has_channels(&prefix, &params.channels) {
                dates.push(date);
            }
        }
        dates
    }

    /// Number of dated samples.
    #[inline]
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    /// Check if the index is empty (never true for a built index).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Dated samples in ascending order.
    pub fn dates(&self) -> &[NaiveDateTime] {
        &self.dates
    }

    /// Timestamp at an ordinal.
    pub fn get(&self, ordinal: usize) -> Option<NaiveDateTime> {
        self.dates.get(ordinal).copied()
    }

    /// Check if a timestamp is a dated sample.
    #[inline]
    pub fn contains(&self, date: &NaiveDateTime) -> bool {
        self.date_set.contains(date)
    }

    /// Ordinal of a timestamp.
    pub fn position(&self, date: &NaiveDateTime) -> Option<usize> {
        self.dates.binary_search(date).ok()
    }

    /// True when any exclusion window covers `date`.
    pub fn is_excluded(&self, date: &NaiveDateTime) -> bool {
        self.exclusions.iter().any(|w| w.contains(date))
    }

    /// Effective `[start, end)` range after clamping.
    #[inline]
    pub fn range(&self) -> DateRange {
        self.range
    }

    #[inline]
    pub fn cadence(&self) -> Duration {
        self.cadence
    }

    /// Number of theoretical slots in the range.
    #[inline]
    pub fn total_slots(&self) -> usize {
        self.total_slots
    }

    /// Required channel postfixes.
    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    pub fn exclusions(&self) -> &[ExclusionWindow] {
        &self.exclusions
    }

    /// Prefix token of a timestamp.
    pub fn prefix_of(&self, date: NaiveDateTime) -> String {
        self.codec.prefix(date)
    }

    /// Timestamp of a prefix token.
    pub fn date_of(&self, prefix: &str) -> Option<NaiveDateTime> {
        self.codec.date(prefix)
    }
}
