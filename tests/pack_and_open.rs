//! Packing a dated tree and opening the result through its manifest.

use std::fs;
use std::path::Path;

use sdoml::core::{parse_timestamp, Manifest, MANIFEST_NAME};
use sdoml::decode::{encode_npy, ChannelArray};
use sdoml::pack::{pack_directory, PackOptions};
use sdoml::store::{SampleStore, StoreConfig};
use sdoml::Error;

fn write_npy(root: &Path, name: &str, fill: u16) {
    let path = root.join(name);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let array = ChannelArray::from_vec((2, 2), vec![fill; 4]).unwrap();
    fs::write(path, encode_npy(&array)).unwrap();
}

/// Three days; hmi everywhere, aia missing at 2022/11/02/0015.
fn source_tree() -> tempfile::TempDir {
    let src = tempfile::tempdir().unwrap();
    for day in ["01", "02", "03"] {
        for slot in ["0000", "0015", "0030"] {
            write_npy(src.path(), &format!("2022/11/{day}/{slot}.hmi_m.npy"), 1);
            if !(day == "02" && slot == "0015") {
                write_npy(src.path(), &format!("2022/11/{day}/{slot}.aia_0171.npy"), 2);
            }
        }
    }
    src
}

#[test]
fn packed_tree_opens_through_manifest() {
    let src = source_tree();
    let out = tempfile::tempdir().unwrap();
    let options = PackOptions {
        days_per_archive: 1,
        prefix: Some("sdoml-lite".into()),
    };
    let manifest = pack_directory(src.path(), out.path(), &options).unwrap();
    assert_eq!(manifest.shards.len(), 3);
    assert_eq!(Manifest::load(&out.path().join(MANIFEST_NAME)).unwrap(), manifest);

    let store = SampleStore::open(StoreConfig::new(out.path()).with_channels(["hmi_m", "aia_0171"])).unwrap();
    // [2022-11-01T00:00, 2022-11-03T00:45) at 15 minutes
    assert_eq!(store.temporal().total_slots(), 2 * 96 + 3);
    assert_eq!(store.len(), 8);
    assert!(store.get("2022-11-02T00:15").unwrap().is_none());

    let sample = store.get("2022-11-03T00:30").unwrap().unwrap();
    assert_eq!(sample.tensor.channel::<u16>(0), Some(&[1u16; 4][..]));
    assert_eq!(sample.tensor.channel::<u16>(1), Some(&[2u16; 4][..]));
}

#[test]
fn fewer_channels_never_shrink_the_index() {
    let src = source_tree();
    let out = tempfile::tempdir().unwrap();
    pack_directory(src.path(), out.path(), &PackOptions::default()).unwrap();

    let both = SampleStore::open(StoreConfig::new(out.path()).with_channels(["hmi_m", "aia_0171"])).unwrap();
    let hmi = SampleStore::open(StoreConfig::new(out.path()).with_channels(["hmi_m"])).unwrap();
    assert_eq!(hmi.len(), 9);
    for date in both.dates() {
        assert!(hmi.temporal().contains(date));
    }
}

#[test]
fn missing_manifest_shard_is_fatal() {
    let src = source_tree();
    let out = tempfile::tempdir().unwrap();
    let manifest = pack_directory(src.path(), out.path(), &PackOptions::default()).unwrap();
    fs::remove_file(out.path().join(&manifest.shards[1].name)).unwrap();

    let result = SampleStore::open(StoreConfig::new(out.path()).with_channels(["hmi_m"]));
    assert!(matches!(result, Err(Error::FileNotFound(_))));
}

#[test]
fn exclusions_only_remove_covered_dates() {
    let src = source_tree();
    let out = tempfile::tempdir().unwrap();
    pack_directory(src.path(), out.path(), &PackOptions::default()).unwrap();

    let config = StoreConfig::new(out.path()).with_channels(["hmi_m"]);
    let all = SampleStore::open(config.clone()).unwrap();
    let window = sdoml::core::ExclusionWindow::parse("2022-11-02", "2022-11-03").unwrap();
    let fewer = SampleStore::open(config.with_exclusion(window)).unwrap();

    assert_eq!(fewer.len(), all.len() - 3);
    for date in all.dates() {
        assert_eq!(fewer.temporal().contains(date), !window.contains(date));
    }
    assert!(fewer.dates().iter().all(|d| *d < parse_timestamp("2022-11-02").unwrap()
        || *d >= parse_timestamp("2022-11-03").unwrap()));
}
