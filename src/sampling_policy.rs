use config::Config;
use std::{fmt, str::FromStr, time::Duration};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::{
    dto::{IssSample, PositionSelectResult},
    position_source::{FetchError, PositionSource},
    position_store::{PositionStore, RowId, StoreError},
    speed::{self, SpeedError},
};

pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_secs(20);
pub const DEFAULT_FRESHNESS_THRESHOLD_SECS: i64 = 1800;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pairing {
    /// Pair the two newest stored rows; the live reading is only kept when a
    /// fresh pair has to be collected.
    Stored,
    Live,
}

#[derive(Debug, Error)]
#[error("unknown pairing mode {0:?}, expected \"stored\" or \"live\"")]
pub struct UnknownPairing(String);

impl FromStr for Pairing {
    type Err = UnknownPairing;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stored" => Ok(Pairing::Stored),
            "live" => Ok(Pairing::Live),
            _ => Err(UnknownPairing(s.to_string())),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SamplingSettings {
    pub sample_interval: Duration,
    pub freshness_threshold_secs: i64,
    pub pairing: Pairing,
}

impl Default for SamplingSettings {
    fn default() -> Self {
        SamplingSettings {
            sample_interval: DEFAULT_SAMPLE_INTERVAL,
            freshness_threshold_secs: DEFAULT_FRESHNESS_THRESHOLD_SECS,
            pairing: Pairing::Stored,
        }
    }
}

impl SamplingSettings {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(SamplingSettings {
            sample_interval: Duration::from_secs(
                config.get_int("sample_interval_secs")?.try_into()?,
            ),
            freshness_threshold_secs: config.get_int("freshness_threshold_secs")?,
            pairing: config.get_string("pairing")?.parse()?,
        })
    }

    pub fn is_fresh(&self, gap_secs: i64) -> bool {
        gap_secs <= self.freshness_threshold_secs
    }
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("fetch stage failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("store stage failed: {0}")]
    Store(#[from] StoreError),
    #[error("data integrity violated: {0}")]
    DataIntegrity(&'static str),
    #[error("compute stage failed: {0}")]
    Compute(#[from] SpeedError),
}

impl RunError {
    pub fn stage(&self) -> &'static str {
        match self {
            RunError::Fetch(_) => "fetch",
            RunError::Store(_) => "store",
            RunError::DataIntegrity(_) => "integrity",
            RunError::Compute(_) => "compute",
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            RunError::Fetch(_) => 2,
            RunError::Store(_) => 3,
            RunError::DataIntegrity(_) => 4,
            RunError::Compute(_) => 5,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    ColdStart { row_ids: [RowId; 2], speed: i64 },
    Fresh { row_id: RowId, speed: i64 },
    Stale { row_ids: [RowId; 2], speed: i64 },
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::ColdStart { row_ids, speed } => write!(
                f,
                "cold start, {} km/h on rows {} and {}",
                speed, row_ids[0], row_ids[1]
            ),
            RunOutcome::Fresh { row_id, speed } => {
                write!(f, "fresh pair, {} km/h on row {}", speed, row_id)
            }
            RunOutcome::Stale { row_ids, speed } => write!(
                f,
                "stale data resampled, {} km/h on rows {} and {}",
                speed, row_ids[0], row_ids[1]
            ),
        }
    }
}

pub struct SamplingPolicy<'a, S, P> {
    source: &'a S,
    store: &'a P,
    settings: SamplingSettings,
}

impl<'a, S, P> SamplingPolicy<'a, S, P>
where
    S: PositionSource,
    P: PositionStore,
{
    pub fn new(source: &'a S, store: &'a P, settings: SamplingSettings) -> Self {
        SamplingPolicy {
            source,
            store,
            settings,
        }
    }

    // Rows written before a failure stay in the store.
    pub async fn run(&self) -> Result<RunOutcome, RunError> {
        if !self.store.has_any_row().await? {
            info!("No ISS positions stored yet, collecting an initial pair");
            let first = self.source.fetch().await?;
            let first_id = self.store.insert(&first).await?;
            let (row_ids, speed) = self.complete_pair(first_id, &first).await?;

            return Ok(RunOutcome::ColdStart { row_ids, speed });
        }

        let latest = self.store.latest().await?.ok_or(RunError::DataIntegrity(
            "store reported rows but returned no latest position",
        ))?;
        let live = self.source.fetch().await?;

        match self.settings.pairing {
            Pairing::Stored => self.pair_stored(latest, live).await,
            Pairing::Live => self.pair_live(latest, live).await,
        }
    }

    async fn pair_stored(
        &self,
        latest: PositionSelectResult,
        live: IssSample,
    ) -> Result<RunOutcome, RunError> {
        let previous = self.store.second_latest().await?.ok_or(RunError::DataIntegrity(
            "stored pairing needs two positions but only one is stored",
        ))?;

        let gap = latest.sample.timestamp - previous.sample.timestamp;
        if !self.settings.is_fresh(gap) {
            info!("Stored positions are {}s apart, collecting a fresh pair", gap);
            return self.resample(live).await;
        }

        let speed = speed::estimate(&previous.sample, &latest.sample)?;
        self.store.set_speed(latest.id, speed).await?;
        debug!("Live position at {} not stored", live.timestamp);

        Ok(RunOutcome::Fresh {
            row_id: latest.id,
            speed,
        })
    }

    async fn pair_live(
        &self,
        latest: PositionSelectResult,
        live: IssSample,
    ) -> Result<RunOutcome, RunError> {
        let live_id = self.store.insert(&live).await?;

        let gap = live.timestamp - latest.sample.timestamp;
        if !self.settings.is_fresh(gap) {
            info!("Last stored position is {}s old, collecting a fresh pair", gap);
            let (row_ids, speed) = self.complete_pair(live_id, &live).await?;
            return Ok(RunOutcome::Stale { row_ids, speed });
        }

        let speed = speed::estimate(&latest.sample, &live)?;
        self.store.set_speed(live_id, speed).await?;

        Ok(RunOutcome::Fresh {
            row_id: live_id,
            speed,
        })
    }

    async fn resample(&self, live: IssSample) -> Result<RunOutcome, RunError> {
        let live_id = self.store.insert(&live).await?;
        let (row_ids, speed) = self.complete_pair(live_id, &live).await?;

        Ok(RunOutcome::Stale { row_ids, speed })
    }

    async fn complete_pair(
        &self,
        first_id: RowId,
        first: &IssSample,
    ) -> Result<([RowId; 2], i64), RunError> {
        debug!(
            "Waiting {:?} before collecting the second sample",
            self.settings.sample_interval
        );
        sleep(self.settings.sample_interval).await;

        let second = self.source.fetch().await?;
        let second_id = self.store.insert(&second).await?;

        let speed = speed::estimate(first, &second)?;
        let row_ids = [first_id, second_id];
        self.store.set_speed_for_rows(&row_ids, speed).await?;

        Ok((row_ids, speed))
    }
}
