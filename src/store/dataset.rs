//! Indexed dataset: containers scanned and grouped, timeline not yet built.

use std::sync::Arc;

use tracing::info;

use super::config::StoreConfig;
use super::sample_store::SampleStore;
use crate::core::{discover_range, DateRange, MemberIndex, PrefixCodec, SampleIndex, MEMBER_INDEX_CACHE};
use crate::decode::{ChannelArray, ChannelDecoder, ExtensionDecoder};
use crate::util::{Error, Result};

/// Every decoded member under one prefix.
#[derive(Clone, Debug)]
pub struct PrefixSample {
    pub prefix: String,
    /// `(postfix, array)` in member order.
    pub members: Vec<(String, ChannelArray)>,
}

impl PrefixSample {
    /// Array stored under a postfix.
    pub fn get(&self, postfix: &str) -> Option<&ChannelArray> {
        self.members.iter().find(|(p, _)| p == postfix).map(|(_, a)| a)
    }
}

/// Member and sample indexes over a data directory.
pub struct IndexedDataset {
    config: StoreConfig,
    samples: SampleIndex,
    decoder: Arc<dyn ChannelDecoder>,
}

impl IndexedDataset {
    /// Index a data directory with the default decoder.
    pub fn open(config: StoreConfig) -> Result<Self> {
        Self::open_with_decoder(config, Arc::new(ExtensionDecoder))
    }

    /// Discover containers, then load or build the member index and group
    /// it by prefix.
    pub fn open_with_decoder(config: StoreConfig, decoder: Arc<dyn ChannelDecoder>) -> Result<Self> {
        config.validate()?;
        info!("Directory  : {}", config.data_dir.display());

        let artifact_dir = config.artifact_dir();
        if !artifact_dir.is_dir() {
            std::fs::create_dir_all(artifact_dir).map_err(|e| Error::cache(artifact_dir, e))?;
        }

        let containers = MemberIndex::discover(&config.data_dir, &config.manifest_name)?;
        let members = MemberIndex::build_or_load_opts(
            &containers,
            &artifact_dir.join(MEMBER_INDEX_CACHE),
            config.use_mmap,
        )?;
        info!("Members    : {} in {} tar files", members.len(), members.containers().len());

        let samples = SampleIndex::new(Arc::new(members));
        info!("Prefixes   : {}", samples.len());

        Ok(Self {
            config,
            samples,
            decoder,
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn members(&self) -> &MemberIndex {
        self.samples.members()
    }

    pub fn samples(&self) -> &SampleIndex {
        &self.samples
    }

    pub fn decoder(&self) -> &Arc<dyn ChannelDecoder> {
        &self.decoder
    }

    /// `[earliest, latest + cadence)` over all parseable prefixes.
    pub fn discovered_range(&self) -> Option<DateRange> {
        let codec = PrefixCodec::new(self.config.memo_capacity);
        let cadence = chrono::Duration::minutes(self.config.cadence_minutes as i64);
        discover_range(&self.samples, &codec, cadence)
    }

    /// Decode every member under `prefix`, `Ok(None)` if the prefix is unknown.
    ///
    /// Unlike [`SampleStore::get`] this needs no temporal index and ignores
    /// the configured channel list.
    pub fn get_prefix(&self, prefix: &str) -> Result<Option<PrefixSample>> {
        let Some(postfixes) = self.samples.postfixes(prefix) else {
            return Ok(None);
        };
        let mut members = Vec::with_capacity(postfixes.len());
        for postfix in postfixes {
            let raw = self.samples.get_raw(prefix, postfix)?.ok_or_else(|| {
                Error::InvariantViolation(format!("member {prefix}.{postfix} grouped but not indexed"))
            })?;
            members.push((postfix.clone(), self.decoder.decode(postfix, &raw)?));
        }
        Ok(Some(PrefixSample {
            prefix: prefix.to_string(),
            members,
        }))
    }

    /// [`get_prefix`](Self::get_prefix) by prefix ordinal.
    pub fn get_prefix_at(&self, ordinal: usize) -> Result<Option<PrefixSample>> {
        match self.samples.prefix_at(ordinal) {
            Some(prefix) => self.get_prefix(prefix),
            None => Err(Error::SampleOutOfBounds {
                index: ordinal,
                count: self.samples.len(),
            }),
        }
    }

    /// Build the temporal index and become a ready store.
    pub fn into_store(self) -> Result<SampleStore> {
        SampleStore::from_dataset(self)
    }
}
