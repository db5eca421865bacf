//! Core layer - the three indexes behind the sample store.
//!
//! This module provides:
//! - [`MemberIndex`] - Member name -> container location, persisted
//! - [`SampleIndex`] - Members grouped by timestamp prefix
//! - [`TemporalIndex`] - Cadence-aligned, channel-complete timestamps, persisted
//! - [`Manifest`] - Optional shard list for container discovery
//! - [`BoundedCache`] - Memo and decoded-channel caches

mod cache;
mod manifest;
mod member_index;
mod sample_index;
mod temporal_index;

pub use cache::BoundedCache;
pub use manifest::{Manifest, ShardEntry, MANIFEST_NAME};
pub use member_index::{ContainerLocation, MemberIndex, CONTAINER_EXTENSION, MEMBER_INDEX_CACHE};
pub use sample_index::{SampleIndex, NAME_SEPARATOR};
pub use temporal_index::{
    cache_key, canonical, discover_range, parse_timestamp, resolve_range, DateRange, ExclusionWindow,
    PrefixCodec, TemporalIndex, TemporalParams, CANONICAL_FORMAT, DEFAULT_CADENCE_MINUTES,
    DEFAULT_MEMO_CAPACITY, PREFIX_FORMAT,
};
