use std::process::ExitCode;

use clap::Parser;
use log::{error, info, LevelFilter};

mod args;
mod auth;
mod gnmi;
mod notification;
mod path;
mod proto;
mod sampler;
mod security;
mod stats;
mod subscribe;
mod time;

use args::Args;
use gnmi::Gnmi;
use notification::NotificationBuilder;
use security::SecurityContext;
use stats::{FileStats, Stats};

#[tokio::main]
async fn main() -> ExitCode {
    pretty_env_logger::formatted_builder()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let args = Args::parse();

    let addr = match args.addr() {
        Ok(addr) => addr,
        Err(e) => {
            error!("invalid listen address: {e}");
            return ExitCode::FAILURE;
        }
    };

    let security = match SecurityContext::from_args(&args) {
        Ok(security) => security,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    info!("reading counters from {:?}", args.stats_file());
    let stats = match Stats::spawn(FileStats::new(args.stats_file().clone())) {
        Ok(stats) => stats,
        Err(e) => {
            error!("couldn't start stats thread: {e}");
            return ExitCode::FAILURE;
        }
    };

    let builder = NotificationBuilder::new(stats, args.measurement().map(Into::into));

    match gnmi::serve(Gnmi::new(builder), security, addr).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("server failed: {e}");
            ExitCode::FAILURE
        }
    }
}
