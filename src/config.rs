//! Provides the CLI option parser
//!
//! Used to parse the argv/config file into a struct that
//! the daemon can consume and use as configuration data.

use clap::{App, Arg};
use regex::Regex;
use serde::de;
use std::error::Error;
use std::fmt;
use std::fs::File;
use std::io;
use std::io::Read;
use toml;

const VERSION: Option<&'static str> = option_env!("CARGO_PKG_VERSION");

fn default_version() -> String {
    VERSION.unwrap().to_string()
}

/// Histogram bins for one family of timers.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct HistogramConfig {
    /// Pattern matched against timer names; the first matching entry wins.
    pub metric: String,
    /// Ascending bin upper bounds. Values above the last bound land in an
    /// implicit `inf` bin.
    pub bins: Vec<f64>,
}

/// Key layout options for the graphite sink, the `[graphite]` table.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct NamespaceConfig {
    /// Drop the per-type hierarchy and prefix every key with `prefix_stats`
    /// instead.
    pub legacy_namespace: bool,
    /// Leading segment for every non-legacy key.
    pub global_prefix: String,
    /// Name segment under which counters are published.
    pub prefix_counter: String,
    /// Name segment under which timers are published.
    pub prefix_timer: String,
    /// Name segment under which gauges are published.
    pub prefix_gauge: String,
    /// Name segment under which sets are published.
    pub prefix_set: String,
}

impl Default for NamespaceConfig {
    fn default() -> NamespaceConfig {
        NamespaceConfig {
            legacy_namespace: false,
            global_prefix: "stats".to_string(),
            prefix_counter: "counters".to_string(),
            prefix_timer: "timers".to_string(),
            prefix_gauge: "gauges".to_string(),
            prefix_set: "sets".to_string(),
        }
    }
}

/// Big configuration struct for the tallyd executable.
///
/// This struct is what we construct from parsing the tallyd configuration
/// file. Every field has a documented default; unknown keys in the file are
/// ignored.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Args {
    /// The address the UDP listener binds. Default: `0.0.0.0`.
    pub host: String,
    /// The port the UDP listener binds. Default: `8125`.
    pub port: u16,
    /// The graphite collector host. The graphite sink is only enabled when
    /// this is set.
    pub graphite_host: Option<String>,
    /// The graphite collector port. Default: `2003`.
    pub graphite_port: u16,
    /// The flush window length in milliseconds. Default: `10_000`.
    pub flush_interval: u64,
    /// Timer percentile thresholds, a single value or a list, each in
    /// `(0, 100]`. Default: `[90.0]`.
    #[serde(deserialize_with = "de_percent_threshold")]
    pub percent_threshold: Vec<f64>,
    /// Histogram bins, matched per timer name. Default: none.
    pub histogram: Vec<HistogramConfig>,
    /// The name segment for the daemon's own statistics. Default: `statsd`.
    pub prefix_stats: String,
    /// Graphite key layout options.
    pub graphite: NamespaceConfig,
    /// Delete counter keys on flush instead of retaining them at zero.
    /// Default: `true`.
    pub delete_counters: bool,
    /// Force debug-level logging regardless of `-v`. Default: `false`.
    pub debug: bool,
    /// Log every received line. Default: `false`.
    pub dump_messages: bool,
    /// Depth of the ingest event channel. When the engine lags this far
    /// behind, senders block and the OS sheds datagrams. Default: `1_000`.
    pub batch: usize,
    /// Enable the console sink. Default: `false`.
    pub console: bool,
    /// Enable the null sink. Default: `false`.
    pub null: bool,
    /// The verbosity setting of tallyd, from the command line. The higher
    /// the value the more chatty tallyd gets.
    #[serde(skip)]
    pub verbose: u64,
    /// Tallyd version string. This is set automatically.
    #[serde(skip)]
    pub version: String,
}

impl Default for Args {
    fn default() -> Args {
        Args {
            host: "0.0.0.0".to_string(),
            port: 8125,
            graphite_host: None,
            graphite_port: 2003,
            flush_interval: 10_000,
            percent_threshold: vec![90.0],
            histogram: Vec::new(),
            prefix_stats: "statsd".to_string(),
            graphite: NamespaceConfig::default(),
            delete_counters: true,
            debug: false,
            dump_messages: false,
            batch: 1_000,
            console: false,
            null: false,
            verbose: 0,
            version: default_version(),
        }
    }
}

/// `percent_threshold = 90` and `percent_threshold = [90, 99]` both work.
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(f64),
    Many(Vec<f64>),
}

fn de_percent_threshold<'de, D>(deserializer: D) -> Result<Vec<f64>, D::Error>
where
    D: de::Deserializer<'de>,
{
    match de::Deserialize::deserialize(deserializer)? {
        OneOrMany::One(pct) => Ok(vec![pct]),
        OneOrMany::Many(pcts) => Ok(pcts),
    }
}

/// An invalid or unreadable configuration. All of these are fatal at
/// startup; none can occur once the daemon is running.
#[derive(Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    Io(io::Error),
    /// The config file is not valid TOML.
    Parse(toml::de::Error),
    /// A value the engine cannot honor.
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ConfigError::Io(ref e) => write!(f, "unable to read config file: {}", e),
            ConfigError::Parse(ref e) => write!(f, "unable to parse config file: {}", e),
            ConfigError::Invalid(ref what) => write!(f, "{}", what),
        }
    }
}

impl Error for ConfigError {}

impl From<io::Error> for ConfigError {
    fn from(e: io::Error) -> ConfigError {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> ConfigError {
        ConfigError::Parse(e)
    }
}

/// Parse the tallyd configuration arguments.
///
/// Command line flags select the config file and verbosity; everything else
/// lives in the file. The returned `Args` is validated: an `Err` here should
/// stop the process before any thread spawns.
pub fn parse_args() -> Result<Args, ConfigError> {
    let args = App::new("tallyd")
        .version(VERSION.unwrap_or("unknown"))
        .arg(
            Arg::with_name("config-file")
                .long("config")
                .short("C")
                .value_name("config")
                .help("The config file to feed in.")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .multiple(true)
                .help("Turn on verbose output."),
        )
        .get_matches();

    let mut config = match args.value_of("config-file") {
        Some(filename) => parse_config_file(filename)?,
        None => Args::default(),
    };
    config.verbose = args.occurrences_of("verbose");
    validate(&config)?;
    Ok(config)
}

/// Load `Args` from a TOML file on disk.
pub fn parse_config_file(filename: &str) -> Result<Args, ConfigError> {
    let mut buffer = String::new();
    File::open(filename)?.read_to_string(&mut buffer)?;
    parse_config(&buffer)
}

/// Parse `Args` out of a TOML string.
pub fn parse_config(buffer: &str) -> Result<Args, ConfigError> {
    let args: Args = toml::from_str(buffer)?;
    Ok(args)
}

/// Reject configurations the engine cannot honor.
pub fn validate(args: &Args) -> Result<(), ConfigError> {
    if args.flush_interval == 0 {
        return Err(ConfigError::Invalid(
            "flush_interval must be greater than zero".to_string(),
        ));
    }
    if args.batch == 0 {
        return Err(ConfigError::Invalid(
            "batch must be greater than zero".to_string(),
        ));
    }
    if args.percent_threshold.is_empty() {
        return Err(ConfigError::Invalid(
            "percent_threshold must name at least one percentile".to_string(),
        ));
    }
    for pct in &args.percent_threshold {
        if !(*pct > 0.0 && *pct <= 100.0) {
            return Err(ConfigError::Invalid(format!(
                "percent_threshold {} is outside (0, 100]",
                pct
            )));
        }
    }
    for hist in &args.histogram {
        if let Err(e) = Regex::new(&hist.metric) {
            return Err(ConfigError::Invalid(format!(
                "histogram pattern {:?} will not compile: {}",
                hist.metric, e
            )));
        }
        if hist.bins.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "histogram for {:?} names no bins",
                hist.metric
            )));
        }
        for bin in &hist.bins {
            if !bin.is_finite() {
                return Err(ConfigError::Invalid(format!(
                    "histogram bin for {:?} is not finite; the inf bin is implicit",
                    hist.metric
                )));
            }
        }
        for pair in hist.bins.windows(2) {
            if pair[0] >= pair[1] {
                return Err(ConfigError::Invalid(format!(
                    "histogram bins for {:?} must be strictly ascending",
                    hist.metric
                )));
            }
        }
    }
    Ok(())
}
