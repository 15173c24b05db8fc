use chrono::{DateTime, Utc};

use crate::error::DashboardError;
use crate::models::asset::AssetResponse;
use crate::models::market::MarketStatsResponse;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Loading,
    Ready,
    Refreshing,
    Error,
}

/// One successful pair of responses
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardData {
    pub assets: Vec<AssetResponse>,
    pub stats: MarketStatsResponse,
}

#[derive(Debug, Clone)]
pub struct DashboardState {
    pub phase: Phase,
    /// Last successful data. Kept while refreshing and after a failure.
    pub data: Option<DashboardData>,
    pub error: Option<String>,
    pub last_refreshed: Option<DateTime<Utc>>,
    generation: u64,
}

impl Default for DashboardState {
    fn default() -> Self {
        Self::new()
    }
}

impl DashboardState {
    pub fn new() -> Self {
        Self {
            phase: Phase::Loading,
            data: None,
            error: None,
            last_refreshed: None,
            generation: 0,
        }
    }

    /// Generation of the most recently issued fetch
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Register a new fetch and return its generation. Earlier in-flight
    /// fetches become stale.
    pub fn begin_fetch(&mut self) -> u64 {
        self.generation += 1;
        if self.phase != Phase::Loading {
            self.phase = Phase::Refreshing;
        }
        self.generation
    }

    /// Apply the outcome of fetch `generation`. Returns `false` when the
    /// result was superseded and ignored.
    pub fn complete(
        &mut self,
        generation: u64,
        result: Result<DashboardData, DashboardError>,
    ) -> bool {
        if generation != self.generation {
            return false;
        }

        match result {
            Ok(data) => {
                self.phase = Phase::Ready;
                self.data = Some(data);
                self.error = None;
                self.last_refreshed = Some(Utc::now());
            }
            Err(e) => {
                self.phase = Phase::Error;
                self.error = Some(e.to_string());
            }
        }
        true
    }

    pub fn can_retry(&self) -> bool {
        self.phase == Phase::Error
    }
}
