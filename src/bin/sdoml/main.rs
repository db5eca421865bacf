//! SDOML CLI - inspect, query and pack tar-backed solar sample stores.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Arg, ArgAction, ArgMatches, Command};
use tracing::error;
use tracing_subscriber::EnvFilter;

use sdoml::core::{canonical, parse_timestamp, ExclusionWindow, MemberIndex};
use sdoml::pack::{pack_directory, PackOptions};
use sdoml::store::{IndexedDataset, SampleKey, SampleStore, StoreConfig};
use sdoml::{Error, Result};

fn cli() -> Command {
    let dir = Arg::new("dir").help("Data directory holding the tar files").required(true);

    Command::new("sdoml")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(concat!(env!("CARGO_PKG_VERSION"), " (built ", env!("SDOML_BUILD_STAMP"), ")"))
        .about("Random-access store for time-indexed solar imagery in tar containers")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Debug logging")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .help("Only warnings and errors")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(
            store_args(Command::new("info").about("Summarize containers, members and prefixes"))
                .arg(dir.clone()),
        )
        .subcommand(
            store_args(Command::new("dates").about("Build or load the temporal index and report it"))
                .arg(dir.clone())
                .arg(
                    Arg::new("list")
                        .long("list")
                        .help("Print every dated sample")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            store_args(Command::new("get").about("Fetch one sample and print its statistics"))
                .arg(dir.clone())
                .arg(
                    Arg::new("key")
                        .help("Ordinal or timestamp, e.g. 0 or 2022-11-01T00:15:00")
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("check")
                .about("Report members smaller than a threshold")
                .arg(dir)
                .arg(
                    Arg::new("min-size")
                        .long("min-size")
                        .help("Minimum member size in bytes")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("1000000"),
                )
                .arg(
                    Arg::new("manifest")
                        .long("manifest")
                        .help("Manifest file name inside the data directory")
                        .default_value(sdoml::core::MANIFEST_NAME),
                ),
        )
        .subcommand(
            Command::new("pack")
                .about("Pack a YYYY/MM/DD/HHMM.<channel>.npy tree into day-partitioned tar files")
                .arg(Arg::new("source").help("Source directory").required(true))
                .arg(Arg::new("target").help("Destination directory").required(true))
                .arg(
                    Arg::new("days-per-archive")
                        .long("days-per-archive")
                        .help("Number of days per archive")
                        .value_parser(clap::value_parser!(u32))
                        .default_value("1"),
                )
                .arg(
                    Arg::new("prefix")
                        .long("prefix")
                        .help("Prefix for tar files (default: target directory name)"),
                ),
        )
}

/// Options shared by every command that opens a store.
fn store_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("config")
            .short('c')
            .long("config")
            .help("JSON store configuration; command-line options override it"),
    )
    .arg(
        Arg::new("channels")
            .long("channels")
            .help("Comma-separated channels, e.g. hmi_m,aia_0171")
            .value_delimiter(','),
    )
    .arg(Arg::new("start").long("start").help("First timestamp (inclusive)"))
    .arg(Arg::new("end").long("end").help("Last timestamp (exclusive)"))
    .arg(
        Arg::new("exclude")
            .long("exclude")
            .help("Exclusion window START,END (repeatable)")
            .action(ArgAction::Append),
    )
    .arg(
        Arg::new("cadence")
            .long("cadence")
            .help("Slot spacing in minutes")
            .value_parser(clap::value_parser!(u32)),
    )
    .arg(
        Arg::new("cache-dir")
            .long("cache-dir")
            .help("Directory for index artifacts (default: data directory)"),
    )
    .arg(
        Arg::new("no-mmap")
            .long("no-mmap")
            .help("Read containers without memory mapping")
            .action(ArgAction::SetTrue),
    )
}

fn store_config(matches: &ArgMatches) -> Result<StoreConfig> {
    let dir = PathBuf::from(required(matches, "dir")?);
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => StoreConfig::load(Path::new(path))?,
        None => StoreConfig::default(),
    };
    config.data_dir = dir;

    if let Some(channels) = matches.get_many::<String>("channels") {
        config = config.with_channels(channels.cloned());
    }
    if let Some(start) = matches.get_one::<String>("start") {
        config = config.with_date_start(parse_timestamp(start)?);
    }
    if let Some(end) = matches.get_one::<String>("end") {
        config = config.with_date_end(parse_timestamp(end)?);
    }
    if let Some(windows) = matches.get_many::<String>("exclude") {
        for window in windows {
            let (start, end) = window
                .split_once(',')
                .ok_or_else(|| Error::InvalidConfig(format!("exclusion window must be START,END: {window}")))?;
            config = config.with_exclusion(ExclusionWindow::parse(start, end)?);
        }
    }
    if let Some(&cadence) = matches.get_one::<u32>("cadence") {
        config = config.with_cadence_minutes(cadence);
    }
    if let Some(dir) = matches.get_one::<String>("cache-dir") {
        config = config.with_cache_dir(dir);
    }
    if matches.get_flag("no-mmap") {
        config = config.with_mmap(false);
    }
    Ok(config)
}

fn required<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a String> {
    matches
        .get_one::<String>(name)
        .ok_or_else(|| Error::InvalidConfig(format!("missing argument <{name}>")))
}

fn cmd_info(matches: &ArgMatches) -> Result<()> {
    let dataset = IndexedDataset::open(store_config(matches)?)?;
    let members = dataset.members();
    let samples = dataset.samples();

    println!("Containers : {}", members.containers().len());
    for path in members.containers() {
        println!("  {}", path.display());
    }
    println!("Members    : {}", members.len());
    println!("Collisions : {}", members.collisions());
    println!("Prefixes   : {}", samples.len());
    println!("Ignored    : {}", samples.ignored());
    if let Some(range) = dataset.discovered_range() {
        println!("Range      : {} - {}", canonical(&range.start), canonical(&range.end));
    }
    Ok(())
}

fn cmd_dates(matches: &ArgMatches) -> Result<()> {
    let store = SampleStore::open(store_config(matches)?)?;
    let range = store.date_range();
    let temporal = store.temporal();

    println!("Range      : {} - {}", canonical(&range.start), canonical(&range.end));
    println!("Slots      : {}", temporal.total_slots());
    println!("Available  : {}", store.len());
    println!("Dropped    : {}", temporal.total_slots().saturating_sub(store.len()));
    if let (Some(first), Some(last)) = (store.dates().first(), store.dates().last()) {
        println!("First      : {}", canonical(first));
        println!("Last       : {}", canonical(last));
    }
    if matches.get_flag("list") {
        for date in store.dates() {
            println!("{}", canonical(date));
        }
    }
    Ok(())
}

fn cmd_get(matches: &ArgMatches) -> Result<()> {
    let store = SampleStore::open(store_config(matches)?)?;
    let raw = required(matches, "key")?;
    let key = match raw.parse::<usize>() {
        Ok(ordinal) => SampleKey::Ordinal(ordinal),
        Err(_) => SampleKey::Text(raw.clone()),
    };

    let Some(sample) = store.get(key)? else {
        println!("Date not found: {raw}");
        return Ok(());
    };

    let tensor = &sample.tensor;
    println!("Timestamp  : {}", sample.timestamp);
    println!("Shape      : {}", tensor.shape());
    println!("Type       : {}", tensor.element_type());

    let values = tensor.to_f32_vec();
    let plane = values.len() / tensor.num_channels().max(1);
    for (name, chunk) in tensor.channel_names().iter().zip(values.chunks(plane.max(1))) {
        let (min, max, sum) = chunk
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY, 0f64), |(lo, hi, s), &v| (lo.min(v), hi.max(v), s + v as f64));
        println!(
            "  {:<12} min {:>12.4} max {:>12.4} mean {:>12.4}",
            name,
            min,
            max,
            sum / chunk.len().max(1) as f64
        );
    }
    Ok(())
}

fn cmd_check(matches: &ArgMatches) -> Result<()> {
    let dir = PathBuf::from(required(matches, "dir")?);
    let min_size = matches.get_one::<u64>("min-size").copied().unwrap_or(1_000_000);
    let manifest = required(matches, "manifest")?;

    let containers = MemberIndex::discover(&dir, manifest)?;
    let index = MemberIndex::build(&containers)?;

    println!("Members smaller than {min_size}:");
    let mut reported = 0usize;
    for (name, location) in index.iter() {
        if location.span.size < min_size {
            let container = index
                .container_path(location)
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            println!("  {name} ({} bytes, {container})", location.span.size);
            reported += 1;
        }
    }
    println!("Members processed: {}", index.len());
    println!("Members reported : {reported}");
    Ok(())
}

fn cmd_pack(matches: &ArgMatches) -> Result<()> {
    let source = PathBuf::from(required(matches, "source")?);
    let target = PathBuf::from(required(matches, "target")?);
    let options = PackOptions {
        days_per_archive: matches.get_one::<u32>("days-per-archive").copied().unwrap_or(1),
        prefix: matches.get_one::<String>("prefix").cloned(),
    };

    let manifest = pack_directory(&source, &target, &options)?;
    let members: u64 = manifest.shards.iter().filter_map(|s| s.members).sum();
    println!("Archives created: {} ({} members)", manifest.shards.len(), members);
    Ok(())
}

fn init_tracing(matches: &ArgMatches) {
    let filter = if matches.get_flag("verbose") {
        EnvFilter::new("debug")
    } else if matches.get_flag("quiet") {
        EnvFilter::new("warn")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn main() -> ExitCode {
    let matches = cli().get_matches();
    init_tracing(&matches);

    let result = match matches.subcommand() {
        Some(("info", sub)) => cmd_info(sub),
        Some(("dates", sub)) => cmd_dates(sub),
        Some(("get", sub)) => cmd_get(sub),
        Some(("check", sub)) => cmd_check(sub),
        Some(("pack", sub)) => cmd_pack(sub),
        _ => Err(Error::other("unknown command")),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        cli().debug_assert();
    }

    #[test]
    fn test_store_config_from_args() {
        let matches = cli()
            .try_get_matches_from([
                "sdoml",
                "dates",
                "/data",
                "--channels",
                "hmi_m,aia_0171",
                "--start",
                "2022-11-01T00:00",
                "--exclude",
                "2022-11-02,2022-11-03",
                "--no-mmap",
            ])
            .unwrap();
        let (_, sub) = matches.subcommand().unwrap();
        let config = store_config(sub).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/data"));
        assert_eq!(config.channels, vec!["hmi_m", "aia_0171"]);
        assert_eq!(config.date_start, Some(parse_timestamp("2022-11-01").unwrap()));
        assert_eq!(config.date_exclusions.len(), 1);
        assert!(!config.use_mmap);
    }
}
