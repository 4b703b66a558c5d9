//! Early-warning cycle driver
//!
//! `EarlyWarningEngine` owns all state that survives between cycles (Kalman
//! estimate and variance, soil saturation, sensor statuses, alert cooldown)
//! and runs one synchronous inference cycle per call.

use super::status::CycleStatus;
use crate::config::EwsConfig;
use crate::core_types::{SensorFeed, SensorReading, SensorStatus, SourceType};
use crate::error::{Error, Result};
use crate::grid::{FieldData, GridCoords, TerrainGrid};
use crate::preprocess::{estimate_soil_parameters, ResolvedSoil, SoilParameters, TextureFields};
use crate::rainfall::{
    AnomalyFilter, DownscaleMode, FilterReport, IdwFuser, KalmanFuser, RainfallDownscaler,
    SensorHealthMonitor,
};
use crate::risk::{
    find_alert_clusters, top_hotspots, AlertCluster, AlertDispatcher, AlertOutcome, Hotspot,
    RiskSummary,
};
use crate::stability::{SaturationState, StabilityEngine};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use std::time::Instant;
use tracing::{debug, info};

/// Gridded rainfall product used as the prior for sensor fusion
#[derive(Debug, Clone)]
pub enum BackgroundRain {
    /// Already on the terrain grid
    Fine { grid: FieldData, source: SourceType },
    /// Coarse product, downscaled onto the terrain grid first
    Coarse {
        grid: FieldData,
        cell_size: f32,
        source: SourceType,
        mode: DownscaleMode,
    },
}

impl BackgroundRain {
    fn source(&self) -> SourceType {
        match self {
            Self::Fine { source, .. } | Self::Coarse { source, .. } => *source,
        }
    }
}

/// Inputs of a single cycle
#[derive(Debug, Clone)]
pub struct CycleInput {
    pub timestamp: DateTime<Utc>,
    /// Latest reading per sensor
    pub sensors: SensorFeed,
    /// Dry grid when `None`
    pub background: Option<BackgroundRain>,
}

/// Everything a cycle produced
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub status: CycleStatus,
    /// Rain intensity after Kalman fusion (mm/hr)
    pub rainfall: FieldData,
    pub fos: FieldData,
    pub risk: FieldData,
    pub summary: RiskSummary,
    pub clusters: Vec<AlertCluster>,
    pub outcome: AlertOutcome,
    pub hotspots: Vec<Hotspot>,
    pub filter: FilterReport,
    pub sensor_status: FxHashMap<String, SensorStatus>,
}

/// Stateful early-warning session for one terrain
pub struct EarlyWarningEngine {
    config: EwsConfig,
    terrain: TerrainGrid,
    coords: GridCoords,
    soil: ResolvedSoil,
    /// Cells steep enough to be assessed
    susceptible: Vec<bool>,

    anomaly_filter: AnomalyFilter,
    health: SensorHealthMonitor,
    downscaler: RainfallDownscaler,
    idw: IdwFuser,
    stability: StabilityEngine,

    /// Cross-cycle state
    kalman: KalmanFuser,
    saturation: SaturationState,
    dispatcher: AlertDispatcher,
    sensor_status: FxHashMap<String, SensorStatus>,
    cycles: u64,
}

impl EarlyWarningEngine {
    /// Create a session from terrain, cell coordinates and soil parameters.
    ///
    /// # Arguments
    ///
    /// * `terrain` - Elevation with derived slope
    /// * `coords` - Cell locations in sensor coordinate units
    /// * `soil` - Scalar or per-cell soil parameters
    /// * `config` - Component settings; validated here
    pub fn new(
        terrain: TerrainGrid,
        coords: GridCoords,
        soil: &SoilParameters,
        config: EwsConfig,
    ) -> Result<Self> {
        config.validate()?;
        let (width, height) = terrain.dimensions();
        if terrain.is_empty() {
            return Err(Error::EmptyGrid("terrain"));
        }
        let (coord_w, coord_h) = coords.dimensions();
        if (coord_w, coord_h) != (width, height) {
            return Err(Error::ShapeMismatch {
                field: "coords",
                expected_width: width,
                expected_height: height,
                width: coord_w,
                height: coord_h,
            });
        }
        let soil = soil.resolve(width, height)?;
        let susceptible = terrain.susceptibility_mask(config.cycle.min_slope_deg);

        info!(
            "Early-warning session: {}x{} cells, cell_size={:.1}m, risk curve k={} c={}",
            width, height, terrain.cell_size(), config.risk.steepness, config.risk.center
        );
        debug!(
            "Susceptibility mask: {} / {} cells at or above {:.1} deg",
            susceptible.iter().filter(|&&m| m).count(),
            susceptible.len(),
            config.cycle.min_slope_deg
        );

        Ok(Self {
            anomaly_filter: AnomalyFilter::new(config.anomaly)?,
            health: SensorHealthMonitor::new(config.health)?,
            downscaler: RainfallDownscaler::new(config.downscale)?,
            idw: IdwFuser::new(config.idw)?,
            stability: StabilityEngine::new(config.stability)?,
            kalman: KalmanFuser::new(width, height, config.kalman)?,
            saturation: SaturationState::new(width, height, config.saturation)?,
            dispatcher: AlertDispatcher::new(config.alert.clone())?,
            sensor_status: FxHashMap::default(),
            cycles: 0,
            config,
            terrain,
            coords,
            soil,
            susceptible,
        })
    }

    /// Create a session deriving soil parameters from texture and slope.
    pub fn from_texture(
        terrain: TerrainGrid,
        coords: GridCoords,
        texture: &TextureFields,
        config: EwsConfig,
    ) -> Result<Self> {
        let soil = estimate_soil_parameters(texture, terrain.slope(), &config.soil)?;
        Self::new(terrain, coords, &soil, config)
    }

    /// Run one inference cycle.
    ///
    /// Input validation failures (malformed sensor records, background grids
    /// of the wrong shape or with negative or non-finite values) abort the
    /// cycle before any state is touched.
    pub fn run_cycle(&mut self, input: CycleInput) -> Result<CycleReport> {
        let started = Instant::now();
        let (width, height) = self.terrain.dimensions();

        // 1. Screen sensors
        let mut readings: Vec<SensorReading> = input.sensors.into_values().collect();
        readings.sort_by(|a, b| a.id.cmp(&b.id));
        let filter = self.anomaly_filter.filter(&readings)?;
        let statuses = self.health.check(&filter.accepted, &self.sensor_status);
        let active: Vec<SensorReading> = filter
            .accepted
            .iter()
            .filter(|r| {
                !matches!(
                    statuses.get(&r.id),
                    Some(SensorStatus::Suspect | SensorStatus::Fail)
                )
            })
            .cloned()
            .collect();

        // 2. Background rain on the fine grid
        let (background, background_source) = match &input.background {
            Some(bg @ BackgroundRain::Fine { grid, .. }) => {
                grid.ensure_shape("background", width, height)?;
                grid.ensure_range("background", 0.0, f32::MAX)?;
                (grid.clone(), bg.source())
            }
            Some(bg @ BackgroundRain::Coarse {
                grid,
                cell_size,
                mode,
                ..
            }) => (
                self.downscaler
                    .downscale_onto(grid, &self.terrain, *cell_size, *mode)?,
                bg.source(),
            ),
            None => (FieldData::new(width, height), SourceType::Gauge),
        };

        // 3. Sensor fusion
        let fused = self.idw.fuse(
            &active,
            &self.coords,
            &background,
            Some(self.terrain.elevation()),
        )?;
        let source = if active.is_empty() {
            background_source
        } else {
            SourceType::Gauge
        };

        // State changes start here; every input has been validated.
        for (id, status) in &statuses {
            self.sensor_status.insert(id.clone(), *status);
        }
        let rainfall = self.kalman.update(&fused, source)?.clone();

        // 4. Antecedent moisture
        let cycle_hours = self.config.cycle.cycle_hours;
        let mut rain_mm = rainfall.clone();
        rain_mm
            .as_mut_slice()
            .par_iter_mut()
            .for_each(|r| *r *= cycle_hours);
        self.saturation.update(&rain_mm)?;

        // 5. Stability and risk
        let fos = self.stability.compute(
            self.terrain.slope(),
            &self.soil,
            self.saturation.field().as_slice(),
            rainfall.as_slice(),
        )?;
        let mut risk = self.config.risk.apply(&fos);
        risk.as_mut_slice()
            .par_iter_mut()
            .zip(self.susceptible.par_iter())
            .for_each(|(r, &assessed)| {
                if !assessed {
                    *r = 0.0;
                }
            });
        let summary = RiskSummary::compute(&fos, &risk, self.config.alert.primary_threshold);

        // 6. Alerts
        let clusters = find_alert_clusters(
            &risk,
            self.config.alert.secondary_threshold,
            self.config.alert.min_cluster_size,
        )?;
        let outcome = self
            .dispatcher
            .dispatch(&clusters, &self.coords, input.timestamp)?;
        let hotspots = top_hotspots(&risk, &self.coords, self.config.cycle.hotspot_count)?;

        self.cycles += 1;
        let status = CycleStatus::new(
            input.timestamp,
            &summary,
            active.len(),
            &outcome,
            started.elapsed(),
        );
        debug!(
            "Cycle {}: {} sensors active ({} rejected), max risk {:.3}, {} cluster(s), {:.1} ms",
            self.cycles,
            active.len(),
            filter.rejected.len(),
            summary.max_risk,
            clusters.len(),
            status.latency_ms
        );

        Ok(CycleReport {
            status,
            rainfall,
            fos,
            risk,
            summary,
            clusters,
            outcome,
            hotspots,
            filter,
            sensor_status: statuses,
        })
    }

    /// Mark a sensor as failed; it is excluded from fusion until cleared.
    pub fn mark_sensor_failed(&mut self, id: impl Into<String>) {
        self.sensor_status.insert(id.into(), SensorStatus::Fail);
    }

    /// Forget a sensor's status history.
    pub fn clear_sensor_status(&mut self, id: &str) {
        self.sensor_status.remove(id);
    }

    pub fn config(&self) -> &EwsConfig {
        &self.config
    }

    pub fn terrain(&self) -> &TerrainGrid {
        &self.terrain
    }

    pub fn coords(&self) -> &GridCoords {
        &self.coords
    }

    pub fn soil(&self) -> &ResolvedSoil {
        &self.soil
    }

    /// `true` for cells at or above the configured minimum slope
    pub fn susceptibility_mask(&self) -> &[bool] {
        &self.susceptible
    }

    pub fn kalman(&self) -> &KalmanFuser {
        &self.kalman
    }

    pub fn saturation(&self) -> &FieldData {
        self.saturation.field()
    }

    pub fn dispatcher(&self) -> &AlertDispatcher {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut AlertDispatcher {
        &mut self.dispatcher
    }

    pub fn sensor_status(&self) -> &FxHashMap<String, SensorStatus> {
        &self.sensor_status
    }

    /// Completed cycles
    pub fn cycles(&self) -> u64 {
        self.cycles
    }
}
