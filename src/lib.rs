//! # SDOML
//!
//! Archive-backed random-access store for time-indexed solar imagery.
//!
//! Observations are packed as members of plain tar containers, named
//! `YYYY/MM/DD/HHMM.<channel>.npy`. The store indexes the containers once,
//! groups members by timestamp prefix, enumerates the fixed-cadence
//! timeline and serves stacked `[C, H, W]` samples by ordinal or time
//! without unpacking the corpus. Both indexes are persisted next to the
//! data and reused on the next open.
//!
//! ## Modules
//!
//! - [`util`] - Element types, shapes, errors, atomic artifact files
//! - [`container`] - Tar container reading and writing
//! - [`core`] - Member, sample and temporal indexes
//! - [`decode`] - Channel decoding (`.npy`) and tensor stacking
//! - [`store`] - Configuration and the [`SampleStore`](store::SampleStore) façade
//! - [`pack`] - Packing a dated file tree into containers
//!
//! ## Example
//!
//! ```ignore
//! use sdoml::prelude::*;
//!
//! let config = StoreConfig::new("/data/sdoml-lite").with_channels(["hmi_m", "aia_0171"]);
//! let store = SampleStore::open(config)?;
//!
//! println!("{} samples", store.len());
//! let sample = store.get(0)?.expect("ordinal keys always resolve");
//! println!("{} {}", sample.timestamp, sample.tensor.shape());
//! ```

pub mod util;
pub mod container;
pub mod core;
pub mod decode;
pub mod store;
pub mod pack;

// Re-export commonly used types
pub use util::{Error, Result};
pub use store::{SampleStore, StoreConfig};

/// Build time of this library, `YYYY-MM-DD HH:MM`.
pub const BUILD_STAMP: &str = env!("SDOML_BUILD_STAMP");

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::util::{ElementType, Error, Result, Shape};
    pub use crate::core::{ExclusionWindow, TemporalIndex, TemporalParams};
    pub use crate::decode::{ChannelDecoder, SampleTensor};
    pub use crate::store::{IndexedDataset, Sample, SampleKey, SampleStore, StoreConfig};
}
