use clap_derive::{Args, Parser, Subcommand};
use jiff::{SignedDuration, Timestamp};

use crate::config::DEFAULT_CONFIG_PATH;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// RON config file, missing is fine
    #[arg(long, short, default_value = DEFAULT_CONFIG_PATH)]
    pub config: String,
    #[command(subcommand)]
    pub command: CliCommands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CliCommands {
    /// Preload configured devices and serve the query API
    Serve,
    /// Print the presence / config-change timeline
    Timeline(DeviceRangeArgs),
    /// Print every reading id in the range
    #[command(alias = "ls")]
    Readings(DeviceRangeArgs),
    /// Print values of one or more readings
    Series(SeriesArgs),
    /// Keep appending new data up to now
    Follow(FollowArgs),
}

#[derive(Args, Debug, Clone)]
pub struct DeviceRangeArgs {
    /// device serial number
    pub serial: String,
    #[command(flatten)]
    pub range: RangeArgs,
}

#[derive(Args, Debug, Clone)]
pub struct SeriesArgs {
    /// device serial number
    pub serial: String,
    #[arg(required = true)]
    pub readings: Vec<String>,
    #[command(flatten)]
    pub range: RangeArgs,
}

#[derive(Args, Debug, Clone)]
pub struct FollowArgs {
    /// device serial number
    pub serial: String,
    /// how far back to start, ex. `2h`
    #[arg(long, default_value = "1h")]
    pub since: SignedDuration,
    /// seconds between refreshes
    #[arg(long, default_value_t = 10)]
    pub every: u64,
}

#[derive(Args, Debug, Clone)]
pub struct RangeArgs {
    /// load from now minus this, ex. `30m` (ignored when --from is given)
    #[arg(long, default_value = "1h")]
    pub since: SignedDuration,
    /// RFC 3339 start, ex. `2024-05-01T00:00:00Z`
    #[arg(long)]
    pub from: Option<Timestamp>,
    /// RFC 3339 end, defaults to now
    #[arg(long)]
    pub to: Option<Timestamp>,
}

impl RangeArgs {
    /// (start, end) in epoch ms
    pub fn resolve(&self, now: Timestamp) -> (i64, i64) {
        let end = self.to.unwrap_or(now);
        let start = match self.from {
            Some(from) => from,
            None => end.checked_sub(self.since).unwrap_or(Timestamp::UNIX_EPOCH),
        };
        (start.as_millisecond(), end.as_millisecond())
    }
}
