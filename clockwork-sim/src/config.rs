use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Virtual-memory manager simulator with second-chance paging")]
pub struct Args {
    /// Total number of workers to launch over the run.
    #[arg(short = 'n', long, default_value_t = 1)]
    pub workers: u32,

    /// Maximum simultaneously active workers (registry capacity).
    #[arg(short = 's', long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..=20))]
    pub simultaneous: u32,

    /// Minimum virtual time between worker launches, in nanoseconds.
    #[arg(short = 'i', long, default_value_t = 100_000_000)]
    pub launch_interval_nanos: u64,

    /// Destination for table snapshots and the final report.
    #[arg(short = 'f', long, default_value = "clockwork.log")]
    pub logfile: PathBuf,

    /// Wall-clock safety ceiling for the whole run, in seconds.
    #[arg(short = 't', long, default_value_t = 5)]
    pub time_limit: u64,
}
