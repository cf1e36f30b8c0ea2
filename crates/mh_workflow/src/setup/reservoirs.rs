// crates/mh_workflow/src/setup/reservoirs.rs

//! 水库
//!
//! 水库多边形烧录为分布图，出口单元登记六个必需参数：面积、需水、最大下泄、
//! 最大库容、目标满库比例、目标最低比例。每个参数图的有效值数量必须等于出口数。

use super::waterbodies::{self, Waterbodies};
use super::{model_uparea, SetupMethod};
use crate::catalog::DataCatalog;
use crate::methods::{median, DEFAULT_TARGET_FULL_FRAC, DEFAULT_TARGET_MIN_FRAC};
use crate::model::{StagedUpdate, WflowModel};
use crate::tables::{TableFamily, TableKey};
use mh_foundation::error::{MhError, MhResult};
use mh_geo::Feature;
use mh_io::table::Table;
use mh_terrain::Raster;
use serde::{Deserialize, Serialize};

/// 水库开关配置路径
pub const RESERVOIRS_PATH: &str = "model.reservoirs";

/// 必需的参数图
pub const RESERVOIR_PARAMETERS: [&str; 6] = [
    "ResSimpleArea",
    "ResDemand",
    "ResMaxRelease",
    "ResMaxVolume",
    "ResTargetFullFrac",
    "ResTargetMinFrac",
];

/// 面积时序表中的面积列
const AREA_COLUMN: &str = "area";

fn default_reservoirs_fn() -> String {
    "hydro_reservoirs".to_string()
}
fn default_min_area() -> f64 {
    1.0
}

/// 水库装配参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetupReservoirs {
    /// 水库多边形数据源
    #[serde(default = "default_reservoirs_fn")]
    pub reservoirs_fn: String,
    /// 水面面积时序数据源前缀，按 `<前缀>_<水库标识>` 查表
    #[serde(default)]
    pub timeseries_fn: Option<String>,
    /// 最小水库面积 km²
    #[serde(default = "default_min_area")]
    pub min_area: f64,
}

impl Default for SetupReservoirs {
    fn default() -> Self {
        Self {
            reservoirs_fn: default_reservoirs_fn(),
            timeseries_fn: None,
            min_area: default_min_area(),
        }
    }
}

impl SetupReservoirs {
    /// 指定水库数据源
    #[must_use]
    pub fn new(reservoirs_fn: impl Into<String>) -> Self {
        Self {
            reservoirs_fn: reservoirs_fn.into(),
            ..Self::default()
        }
    }

    /// 使用面积时序
    #[must_use]
    pub fn with_timeseries(mut self, timeseries_fn: impl Into<String>) -> Self {
        self.timeseries_fn = Some(timeseries_fn.into());
        self
    }

    /// 设置最小面积
    #[must_use]
    pub fn with_min_area(mut self, min_area: f64) -> Self {
        self.min_area = min_area;
        self
    }

    fn timeseries(&self, catalog: &dyn DataCatalog, feature: &Feature) -> MhResult<Option<(Table, AreaStats)>> {
        let Some(prefix) = &self.timeseries_fn else {
            return Ok(None);
        };
        let id = format!("{prefix}_{}", feature.id);
        if !catalog.contains(&id) {
            tracing::debug!(source = %id, "no surface area time series, using attributes");
            return Ok(None);
        }
        let table = catalog.table(&id)?;
        let stats = AreaStats::from_table(&id, &table)?;
        Ok(Some((table, stats)))
    }
}

// ============================================================
// 参数化
// ============================================================

/// 面积时序统计
#[derive(Debug, Clone, Copy, PartialEq)]
struct AreaStats {
    max: f64,
    median: f64,
    min: f64,
}

impl AreaStats {
    fn from_table(source: &str, table: &Table) -> MhResult<Self> {
        let area: Vec<f64> = table
            .column(AREA_COLUMN)
            .ok_or_else(|| MhError::invalid_input(format!("time series '{source}' has no '{AREA_COLUMN}' column")))?
            .into_iter()
            .filter(|a| a.is_finite())
            .collect();
        let max = area.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = area.iter().copied().fold(f64::INFINITY, f64::min);
        match median(&area) {
            Some(median) if max > 0.0 => Ok(Self { max, median, min }),
            _ => Err(MhError::invalid_input(format!(
                "time series '{source}' has no positive surface area"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ReservoirParams {
    area: f64,
    demand: f64,
    max_release: f64,
    max_volume: f64,
    full_frac: f64,
    min_frac: f64,
}

impl ReservoirParams {
    fn values(&self) -> [f64; 6] {
        [
            self.area,
            self.demand,
            self.max_release,
            self.max_volume,
            self.full_frac,
            self.min_frac,
        ]
    }
}

/// 由要素属性与可选面积时序确定水库参数
///
/// 属性：`Capacity_max`/`Vol_avg`、`Capacity_norm`、`Capacity_min` 单位 m³，
/// `Area_avg` m²，`Dis_avg` m³/s。
fn parameterize(feature: &Feature, covered_area: f64, stats: Option<AreaStats>) -> MhResult<ReservoirParams> {
    let positive = |name: &str| feature.property(name).filter(|v| *v > 0.0);
    let max_volume = positive("Capacity_max").or_else(|| positive("Vol_avg")).ok_or_else(|| {
        MhError::missing_parameterization(&feature.id, "neither Capacity_max nor Vol_avg available")
    })?;
    let dis = feature
        .property("Dis_avg")
        .filter(|q| *q >= 0.0)
        .ok_or_else(|| MhError::missing_parameterization(&feature.id, "Dis_avg unavailable"))?;

    let (area, full_frac, min_frac) = match stats {
        Some(s) => (s.max, s.median / s.max, s.min / s.max),
        None => (
            positive("Area_avg").unwrap_or(covered_area),
            feature
                .property("Capacity_norm")
                .map_or(DEFAULT_TARGET_FULL_FRAC, |v| v / max_volume),
            feature
                .property("Capacity_min")
                .map_or(DEFAULT_TARGET_MIN_FRAC, |v| v / max_volume),
        ),
    };

    Ok(ReservoirParams {
        area,
        demand: 0.5 * dis,
        max_release: 4.0 * dis,
        max_volume,
        full_frac: full_frac.clamp(0.0, 1.0),
        min_frac: min_frac.clamp(0.0, 1.0),
    })
}

impl SetupMethod for SetupReservoirs {
    fn name(&self) -> &'static str {
        "setup_reservoirs"
    }

    fn validate(&self) -> MhResult<()> {
        if self.min_area.is_nan() || self.min_area < 0.0 {
            return Err(MhError::invalid_config(
                "min_area",
                self.min_area.to_string(),
                "must be non-negative",
            ));
        }
        if self.timeseries_fn.as_deref().is_some_and(str::is_empty) {
            return Err(MhError::invalid_config("timeseries_fn", "", "must not be empty"));
        }
        Ok(())
    }

    fn stage(&self, model: &WflowModel, catalog: &dyn DataCatalog) -> MhResult<StagedUpdate> {
        let names = model.translator();
        let grid = model.grid();
        let mut update = StagedUpdate::new();

        let features = catalog.geometries(&self.reservoirs_fn)?;
        let wb: Waterbodies = waterbodies::prepare("reservoir", features, grid, self.min_area, model_uparea(model)?)?;
        if wb.is_empty() {
            tracing::warn!(source = %self.reservoirs_fn, min_area = self.min_area, "no reservoirs of sufficient size in model domain");
            return Ok(update);
        }

        let mut params = Vec::with_capacity(wb.features.len());
        let mut n_series = 0;
        for (feature, &covered) in wb.features.iter().zip(&wb.covered_area) {
            let series = self.timeseries(catalog, feature)?;
            let stats = series.as_ref().map(|(_, s)| *s);
            params.push(parameterize(feature, covered, stats)?);
            if let Some((table, _)) = series {
                update.stage_table(TableKey::new(TableFamily::ReservoirTimeseries, feature.id.clone()), table);
                n_series += 1;
            }
        }

        let k = params.len();
        let maps: Vec<(&str, Raster)> = RESERVOIR_PARAMETERS
            .iter()
            .enumerate()
            .map(|(j, &name)| {
                let values: Vec<f64> = params.iter().map(|p| p.values()[j]).collect();
                (name, wb.point_map(grid, &values))
            })
            .collect();

        let locs_name = names.to_display_name("reslocs")?;
        let fields: Vec<(&str, &Raster)> = maps.iter().map(|(n, r)| (*n, r)).collect();
        waterbodies::check_cardinality(locs_name, &wb.locations, k, &fields)?;

        update.stage_mapped(names, names.to_display_name("resareas")?, wb.areas)?;
        update.stage_mapped(names, locs_name, wb.locations)?;
        for (name, raster) in maps {
            update.stage_mapped(names, name, raster)?;
        }
        update.stage_config(RESERVOIRS_PATH, true);
        tracing::info!(reservoirs = k, timeseries = n_series, "reservoirs parameterized");
        Ok(update)
    }
}
