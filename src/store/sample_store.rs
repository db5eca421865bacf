//! Ready store: random access to stacked multi-channel samples by time.

use std::sync::Arc;

use chrono::NaiveDateTime;
use rayon::prelude::*;
use tracing::{debug, info};

use super::config::{Channel, StoreConfig};
use super::dataset::IndexedDataset;
use super::key::SampleKey;
use crate::core::{canonical, BoundedCache, DateRange, TemporalIndex};
use crate::decode::{ChannelArray, ChannelDecoder, SampleTensor};
use crate::util::{Error, Result};

/// One retrieved sample.
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    /// Channels stacked as `[C, H, W]` in configured order.
    pub tensor: SampleTensor,
    /// Canonical `YYYY-MM-DDTHH:MM:SS` timestamp.
    pub timestamp: String,
}

/// Random-access, time-addressed sample store.
///
/// Indexes are immutable once opened; `get` may be called from any number
/// of threads.
pub struct SampleStore {
    dataset: IndexedDataset,
    temporal: TemporalIndex,
    channels: Vec<Channel>,
    channel_cache: BoundedCache<(NaiveDateTime, usize), Arc<ChannelArray>>,
}

impl SampleStore {
    /// Index `config.data_dir` and build the temporal index.
    pub fn open(config: StoreConfig) -> Result<Self> {
        IndexedDataset::open(config)?.into_store()
    }

    /// [`open`](Self::open) with a custom channel decoder.
    pub fn open_with_decoder(config: StoreConfig, decoder: Arc<dyn ChannelDecoder>) -> Result<Self> {
        IndexedDataset::open_with_decoder(config, decoder)?.into_store()
    }

    pub(super) fn from_dataset(dataset: IndexedDataset) -> Result<Self> {
        let config = dataset.config();
        let temporal = TemporalIndex::build(dataset.samples(), &config.temporal_params(), Some(config.artifact_dir()))?;
        let channels = config.resolved_channels();
        let channel_cache = BoundedCache::new(config.channel_cache_entries);

        Ok(Self {
            dataset,
            temporal,
            channels,
            channel_cache,
        })
    }

    /// Number of dated samples.
    #[inline]
    pub fn len(&self) -> usize {
        self.temporal.len()
    }

    /// Always false for an opened store.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.temporal.is_empty()
    }

    /// Dated sample timestamps, ascending.
    pub fn dates(&self) -> &[NaiveDateTime] {
        self.temporal.dates()
    }

    /// Effective `[start, end)` after clamping.
    pub fn date_range(&self) -> DateRange {
        self.temporal.range()
    }

    /// Stacked channels in order.
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn temporal(&self) -> &TemporalIndex {
        &self.temporal
    }

    pub fn dataset(&self) -> &IndexedDataset {
        &self.dataset
    }

    /// Fetch one sample.
    ///
    /// A timestamp without a dated sample gives `Ok(None)`.
    pub fn get(&self, key: impl Into<SampleKey>) -> Result<Option<Sample>> {
        let date = key.into().resolve(&self.temporal)?;

        if !self.temporal.contains(&date) {
            info!("Date not found: {}", canonical(&date));
            return Ok(None);
        }
        if self.temporal.is_excluded(&date) {
            return Err(Error::InvariantViolation(format!(
                "dated sample {} lies inside an exclusion window",
                canonical(&date)
            )));
        }

        let prefix = self.temporal.prefix_of(date);
        let mut arrays = Vec::with_capacity(self.channels.len());
        for (slot, channel) in self.channels.iter().enumerate() {
            let array = self
                .channel_cache
                .get_or_try_insert_with((date, slot), || self.load_channel(&prefix, channel).map(Arc::new))?;
            arrays.push((channel.name.clone(), ChannelArray::clone(&array)));
        }

        Ok(Some(Sample {
            tensor: SampleTensor::stack(arrays)?,
            timestamp: canonical(&date),
        }))
    }

    /// Fetch many samples in parallel, in key order. The first error fails the batch.
    pub fn get_batch<K>(&self, keys: &[K]) -> Result<Vec<Option<Sample>>>
    where
        K: Clone + Into<SampleKey> + Sync,
    {
        keys.par_iter().map(|k| self.get(k.clone())).collect()
    }

    /// `(hits, misses)` of the decoded-channel cache.
    pub fn cache_stats(&self) -> (u64, u64) {
        self.channel_cache.stats()
    }

    fn load_channel(&self, prefix: &str, channel: &Channel) -> Result<ChannelArray> {
        debug!("Reading {}.{}", prefix, channel.postfix);
        let raw = self
            .dataset
            .samples()
            .get_raw(prefix, &channel.postfix)?
            .ok_or_else(|| {
                Error::InvariantViolation(format!("dated sample {prefix} has no member {}", channel.postfix))
            })?;
        self.dataset.decoder().decode(&channel.postfix, &raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_store_is_send_sync() {
        assert_send_sync::<SampleStore>();
        assert_send_sync::<Sample>();
    }
}
