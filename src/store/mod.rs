//! Sample store façade.
//!
//! Opening goes through two states, each its own type:
//!
//! ```text
//! StoreConfig --IndexedDataset::open--> IndexedDataset --into_store--> SampleStore
//!   (paths, channels)        (member + sample index)          (temporal index, get)
//! ```
//!
//! ```ignore
//! use sdoml::store::{SampleStore, StoreConfig};
//!
//! let store = SampleStore::open(StoreConfig::new("/data/sdoml-lite").with_channels(["hmi_m", "aia_0171"]))?;
//! if let Some(sample) = store.get("2022-11-01T00:15:00")? {
//!     println!("{} {}", sample.timestamp, sample.tensor.shape());
//! }
//! ```

mod config;
mod dataset;
mod key;
mod sample_store;

pub use config::{Channel, StoreConfig, DEFAULT_CHANNELS};
pub use dataset::{IndexedDataset, PrefixSample};
pub use key::SampleKey;
pub use sample_store::{Sample, SampleStore};
