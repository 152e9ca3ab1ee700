mod dto;
mod position_source;
mod position_store;
mod processor;
mod sampling_policy;
mod speed;
mod util;

use position_source::HttpPositionSource;
use sampling_policy::{RunError, RunOutcome, SamplingSettings};
use std::{env, process::exit, time::Duration};
use tracing::{error, info};
use util::{config::get_config, setup_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    setup_tracing();

    if let Some(build_timestamp) = option_env!("VERGEN_BUILD_TIMESTAMP") {
        info!(
            "iss-speed {} ({})",
            env!("CARGO_PKG_VERSION"),
            build_timestamp
        );
    }

    let ref args: Vec<String> = env::args().collect();

    let choice = args.get(1).cloned().unwrap_or("run".into());

    let config = get_config()?;
    let database_url = config.get_string("database_url")?;

    match choice.as_str() {
        "run" => {
            let source = HttpPositionSource::from_config(config)?;
            let settings = SamplingSettings::from_config(config)?;
            handle_result(processor::run_once(&database_url, &source, &settings).await)
        }
        "watch" => {
            let source = HttpPositionSource::from_config(config)?;
            let settings = SamplingSettings::from_config(config)?;
            let every = Duration::from_secs(config.get_int("watch_interval_secs")?.try_into()?);
            processor::start_watch(&database_url, &source, &settings, every).await?
        }
        "show" => {
            let count = match args.get(2) {
                Some(count) => count.parse()?,
                None => config.get_int("show_count")?,
            };

            for position in processor::show(&database_url, count).await? {
                println!(
                    "{:>6}  {} {}  {:>9} {:>10}  {}",
                    position.id,
                    position.date,
                    position.time,
                    position.sample.latitude,
                    position.sample.longitude,
                    position
                        .speed
                        .map(|speed| format!("{} km/h", speed))
                        .unwrap_or_else(|| "-".to_string())
                );
            }
        }
        _ => println!("Make a valid choice (run, watch, show [count])"),
    }

    Ok(())
}

fn handle_result(res: Result<RunOutcome, RunError>) {
    match res {
        Ok(outcome) => info!("Run finished: {}", outcome),
        Err(err) => {
            error!("Run failed in {} stage: {:?}", err.stage(), err);
            exit(err.exit_code())
        }
    }
}
