//! Memoizing, rate-limited terrain elevation lookups.
//!
//! Lookups are keyed by coordinates rounded to 3 decimals (~110 m). Remote
//! requests are spaced at least [`REMOTE_COOLDOWN`] apart; a miss during the
//! cool-down shares the in-flight request if there is one, even when it was
//! issued for a different cell, and otherwise falls back to
//! [`approximate_elevation`]. A miss for the cell already in flight always
//! shares that request. Callers never see a lookup failure.

use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

use crate::config::PlannerConfig;

/// Minimum spacing between initiated remote requests.
pub const REMOTE_COOLDOWN: Duration = Duration::from_millis(1000);

/// Floor of the local approximation.
pub const MIN_ELEVATION_M: f64 = 90.0;

const CELL_SCALE: f64 = 1000.0;

/// Cache key: coordinates rounded to 3 decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct CellKey {
    lat_milli: i64,
    lon_milli: i64,
}

impl CellKey {
    pub fn from_coords(lat: f64, lon: f64) -> Self {
        Self {
            lat_milli: (lat * CELL_SCALE).round() as i64,
            lon_milli: (lon * CELL_SCALE).round() as i64,
        }
    }

    pub fn lat(&self) -> f64 {
        self.lat_milli as f64 / CELL_SCALE
    }

    pub fn lon(&self) -> f64 {
        self.lon_milli as f64 / CELL_SCALE
    }
}

#[derive(Debug, Error)]
pub enum ElevationError {
    #[error("elevation provider URL is empty")]
    NotConfigured,
    #[error("elevation request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("elevation provider HTTP {0}")]
    Status(StatusCode),
    #[error("elevation provider returned no usable value")]
    MissingValue,
}

/// Remote source of terrain heights.
pub trait ElevationProvider: Send + Sync + 'static {
    fn fetch(&self, lat: f64, lon: f64)
        -> impl Future<Output = Result<f64, ElevationError>> + Send;
}

#[derive(Debug, Deserialize)]
struct OpenMeteoElevationResponse {
    elevation: Option<Vec<f64>>,
}

fn elevation_from_payload(payload: OpenMeteoElevationResponse) -> Result<f64, ElevationError> {
    payload
        .elevation
        .and_then(|values| values.first().copied())
        .filter(|value| value.is_finite())
        .ok_or(ElevationError::MissingValue)
}

fn build_provider_url(base: &str, lat: f64, lon: f64) -> String {
    let separator = if base.contains('?') { "&" } else { "?" };
    format!("{}{}latitude={:.6}&longitude={:.6}", base, separator, lat, lon)
}

/// Open-Meteo style elevation endpoint: `GET {url}?latitude=..&longitude=..`.
#[derive(Debug, Clone)]
pub struct OpenMeteoProvider {
    client: Client,
    url: String,
    timeout: Duration,
}

impl OpenMeteoProvider {
    pub fn new(client: Client, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            url: url.into(),
            timeout,
        }
    }

    pub fn from_config(config: &PlannerConfig) -> Self {
        Self::new(
            Client::new(),
            config.elevation_url.clone(),
            Duration::from_secs(config.elevation_timeout_s.max(1)),
        )
    }
}

impl ElevationProvider for OpenMeteoProvider {
    async fn fetch(&self, lat: f64, lon: f64) -> Result<f64, ElevationError> {
        if self.url.trim().is_empty() {
            return Err(ElevationError::NotConfigured);
        }

        let response = self
            .client
            .get(build_provider_url(&self.url, lat, lon))
            .timeout(self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ElevationError::Status(response.status()));
        }

        let payload: OpenMeteoElevationResponse = response.json().await?;
        elevation_from_payload(payload)
    }
}

/// Smooth pseudo-terrain used whenever no remote value is available.
pub fn approximate_elevation(lat: f64, lon: f64) -> f64 {
    let phi = lat.to_radians();
    let lambda = lon.to_radians();
    let relief = 180.0
        + 60.0 * (phi * 40.0).sin() * (lambda * 35.0).cos()
        + 25.0 * ((phi + lambda) * 120.0).sin()
        + 10.0 * (phi * 250.0).sin() * (lambda * 300.0).cos();
    relief.max(MIN_ELEVATION_M)
}

type SharedRequest = Shared<BoxFuture<'static, Result<f64, String>>>;

struct InFlight {
    generation: u64,
    key: CellKey,
    request: SharedRequest,
}

#[derive(Default)]
struct RemoteSlot {
    last_initiated: Option<Instant>,
    in_flight: Option<InFlight>,
    generation: u64,
}

enum Plan {
    Fetch { generation: u64, request: SharedRequest },
    Share { origin: CellKey, request: SharedRequest },
    Approximate,
}

pub struct ElevationCache<P> {
    provider: Arc<P>,
    cells: DashMap<CellKey, f64>,
    slot: Mutex<RemoteSlot>,
    cooldown: Duration,
}

impl<P: ElevationProvider> ElevationCache<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider: Arc::new(provider),
            cells: DashMap::new(),
            slot: Mutex::new(RemoteSlot::default()),
            cooldown: REMOTE_COOLDOWN,
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Cached value for a coordinate, without any remote activity.
    pub fn cached(&self, lat: f64, lon: f64) -> Option<f64> {
        self.cells
            .get(&CellKey::from_coords(lat, lon))
            .map(|entry| *entry.value())
    }

    /// Elevation in meters for a coordinate. Never fails.
    pub async fn lookup(&self, lat: f64, lon: f64) -> f64 {
        let key = CellKey::from_coords(lat, lon);
        if let Some(hit) = self.cells.get(&key) {
            return *hit.value();
        }

        let value = match self.plan(key) {
            Plan::Fetch {
                generation,
                request,
            } => {
                let outcome = request.await;
                self.release(generation);
                match outcome {
                    Ok(value) => value,
                    Err(err) => {
                        tracing::warn!(
                            "Elevation lookup for ({}, {}) failed, using approximation: {}",
                            key.lat(),
                            key.lon(),
                            err
                        );
                        approximate_elevation(key.lat(), key.lon())
                    }
                }
            }
            Plan::Share { origin, request } => {
                tracing::debug!(
                    "Elevation for ({}, {}) shares in-flight request for ({}, {})",
                    key.lat(),
                    key.lon(),
                    origin.lat(),
                    origin.lon()
                );
                request
                    .await
                    .unwrap_or_else(|_| approximate_elevation(key.lat(), key.lon()))
            }
            Plan::Approximate => {
                tracing::debug!(
                    "Elevation for ({}, {}) approximated during cool-down",
                    key.lat(),
                    key.lon()
                );
                approximate_elevation(key.lat(), key.lon())
            }
        };

        // First write wins so every caller sees the same value for a cell.
        *self.cells.entry(key).or_insert(value)
    }

    fn lock_slot(&self) -> MutexGuard<'_, RemoteSlot> {
        self.slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn plan(&self, key: CellKey) -> Plan {
        let mut slot = self.lock_slot();
        let now = Instant::now();
        let cooling = slot
            .last_initiated
            .is_some_and(|started| now.duration_since(started) < self.cooldown);

        match &slot.in_flight {
            Some(in_flight) if cooling || in_flight.key == key => {
                return Plan::Share {
                    origin: in_flight.key,
                    request: in_flight.request.clone(),
                };
            }
            None if cooling => return Plan::Approximate,
            _ => {}
        }

        slot.generation += 1;
        let generation = slot.generation;
        let provider = Arc::clone(&self.provider);
        let (lat, lon) = (key.lat(), key.lon());
        let request = async move {
            provider
                .fetch(lat, lon)
                .await
                .map_err(|err| err.to_string())
        }
        .boxed()
        .shared();

        slot.last_initiated = Some(now);
        slot.in_flight = Some(InFlight {
            generation,
            key,
            request: request.clone(),
        });
        tracing::debug!("Elevation request initiated for ({}, {})", lat, lon);
        Plan::Fetch {
            generation,
            request,
        }
    }

    fn release(&self, generation: u64) {
        let mut slot = self.lock_slot();
        if slot
            .in_flight
            .as_ref()
            .is_some_and(|in_flight| in_flight.generation == generation)
        {
            slot.in_flight = None;
        }
    }
}
