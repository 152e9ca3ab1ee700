use std::time::Duration;
use tokio::time::{self, MissedTickBehavior};
use tokio_stream::{wrappers::IntervalStream, StreamExt};
use tracing::{error, info};

use crate::{
    dto::PositionSelectResult,
    position_source::PositionSource,
    position_store::{PositionStore, SqlitePositionStore, StoreError},
    sampling_policy::{RunError, RunOutcome, SamplingPolicy, SamplingSettings},
    util::connect_to_db,
};

// The pool is closed whether or not the run succeeded.
pub async fn run_once<S: PositionSource>(
    database_url: &str,
    source: &S,
    settings: &SamplingSettings,
) -> Result<RunOutcome, RunError> {
    let pool = connect_to_db(database_url).await?;
    let store = SqlitePositionStore::new(pool.clone());

    let result = SamplingPolicy::new(source, &store, settings.clone())
        .run()
        .await;

    pool.close().await;
    result
}

pub async fn start_watch<S: PositionSource>(
    database_url: &str,
    source: &S,
    settings: &SamplingSettings,
    every: Duration,
) -> anyhow::Result<()> {
    info!("Sampling ISS position every {:?}", every);

    let mut interval = time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut stream = IntervalStream::new(interval);

    while stream.next().await.is_some() {
        match run_once(database_url, source, settings).await {
            Ok(outcome) => info!("Run finished: {}", outcome),
            Err(err) => error!("Run failed in {} stage: {}", err.stage(), err),
        }
    }

    Ok(())
}

pub async fn show(database_url: &str, count: i64) -> Result<Vec<PositionSelectResult>, StoreError> {
    let pool = connect_to_db(database_url).await?;
    let result = SqlitePositionStore::new(pool.clone()).recent(0, count).await;

    pool.close().await;
    result
}
