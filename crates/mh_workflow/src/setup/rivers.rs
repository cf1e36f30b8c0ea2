// crates/mh_workflow/src/setup/rivers.rs

//! 河道几何推导
//!
//! 以上游面积阈值确定河道单元，沿 LDD 推导河长、比降、河宽、水深和糙率，
//! 并生成沿流向单调不增的修正高程（`hydrodem_avg` 或 `hydrodem_subgrid`）。
//! 依赖基础地形图流程已登记的 `wflow_ldd`、`wflow_uparea` 和所选高程图。

use super::{fetch_layers, model_flow_direction, valid_values, LayerRequest, SetupMethod};
use crate::catalog::DataCatalog;
use crate::methods::{powlaw_width, DepthMethod, DEFAULT_RIVER_MANNING, MIN_RIVER_SLOPE};
use crate::model::{StagedUpdate, WflowModel};
use mh_foundation::error::{MhError, MhResult};
use mh_geo::{Geometry, GridSpec};
use mh_terrain::rasterize::{line_cells, polygon_cells};
use mh_terrain::{FlowDirection, Raster, ResampleMethod};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 河道字段的无数据值
pub const RIVER_NODATA: f64 = -9999.0;

/// 局部惯性路由下的平滩高程配置路径
pub const BANKFULL_ELEVATION_PATH: &str = "input.lateral.river.bankfull_elevation";

/// 河道路由格式配置路径
pub const RIVER_ROUTING_PATH: &str = "model.river_routing";

// ============================================================
// 参数
// ============================================================

/// 河道路由格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RiverRouting {
    /// 运动波
    #[default]
    #[serde(rename = "kinematic-wave")]
    KinematicWave,
    /// 局部惯性
    #[serde(rename = "local-inertial")]
    LocalInertial,
}

impl RiverRouting {
    /// 配置中的取值
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            RiverRouting::KinematicWave => "kinematic-wave",
            RiverRouting::LocalInertial => "local-inertial",
        }
    }
}

/// 修正高程所用的高程图
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ElevationMap {
    /// 模型分辨率平均高程
    #[default]
    #[serde(rename = "wflow_dem")]
    WflowDem,
    /// 子网格代表高程
    #[serde(rename = "dem_subgrid")]
    DemSubgrid,
}

impl ElevationMap {
    /// 源高程字段名
    #[must_use]
    pub fn source_name(&self) -> &'static str {
        match self {
            ElevationMap::WflowDem => "wflow_dem",
            ElevationMap::DemSubgrid => "dem_subgrid",
        }
    }

    /// 修正高程字段名
    #[must_use]
    pub fn hydrodem_name(&self) -> &'static str {
        match self {
            ElevationMap::WflowDem => "hydrodem_avg",
            ElevationMap::DemSubgrid => "hydrodem_subgrid",
        }
    }
}

fn default_hydrography_fn() -> String {
    "merit_hydro".to_string()
}
fn default_river_upa() -> f64 {
    30.0
}
fn default_min_rivdph() -> f64 {
    1.0
}
fn default_min_rivwth() -> f64 {
    30.0
}
fn default_slope_len() -> f64 {
    2000.0
}
fn default_smooth_len() -> f64 {
    5000.0
}
fn default_true() -> bool {
    true
}

/// 河道装配参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetupRivers {
    /// 水文数据集（提供 `qbankfull`，可选 `rivwth`）
    #[serde(default = "default_hydrography_fn")]
    pub hydrography_fn: String,
    /// 河道几何矢量（线要素，属性 `rivwth`）
    #[serde(default)]
    pub river_geom_fn: Option<String>,
    /// 河道上游面积阈值 km²
    #[serde(default = "default_river_upa")]
    pub river_upa: f64,
    /// 水深推导方法
    #[serde(default)]
    pub rivdph_method: DepthMethod,
    /// 最小河长与单元尺寸之比
    #[serde(default)]
    pub min_rivlen_ratio: f64,
    /// 最小河深 m
    #[serde(default = "default_min_rivdph")]
    pub min_rivdph: f64,
    /// 最小河宽 m
    #[serde(default = "default_min_rivwth")]
    pub min_rivwth: f64,
    /// 比降计算窗口长度 m
    #[serde(default = "default_slope_len")]
    pub slope_len: f64,
    /// 河宽平滑窗口长度 m，0 表示不平滑
    #[serde(default = "default_smooth_len")]
    pub smooth_len: f64,
    /// 河网等级到糙率的映射表（列 `strord`、`N_River`）
    #[serde(default)]
    pub rivman_mapping: Option<String>,
    /// 路由格式
    #[serde(default)]
    pub river_routing: RiverRouting,
    /// 修正高程所用的高程图
    #[serde(default)]
    pub elevtn_map: ElevationMap,
    /// 保证河网向下游连通
    #[serde(default = "default_true")]
    pub connectivity: bool,
}

impl Default for SetupRivers {
    fn default() -> Self {
        Self {
            hydrography_fn: default_hydrography_fn(),
            river_geom_fn: None,
            river_upa: default_river_upa(),
            rivdph_method: DepthMethod::default(),
            min_rivlen_ratio: 0.0,
            min_rivdph: default_min_rivdph(),
            min_rivwth: default_min_rivwth(),
            slope_len: default_slope_len(),
            smooth_len: default_smooth_len(),
            rivman_mapping: None,
            river_routing: RiverRouting::default(),
            elevtn_map: ElevationMap::default(),
            connectivity: true,
        }
    }
}

impl SetupMethod for SetupRivers {
    fn name(&self) -> &'static str {
        "setup_rivers"
    }

    fn validate(&self) -> MhResult<()> {
        let positive = [("river_upa", self.river_upa), ("slope_len", self.slope_len)];
        for (key, value) in positive {
            if value.is_nan() || value <= 0.0 {
                return Err(MhError::invalid_config(key, value.to_string(), "must be positive"));
            }
        }
        let non_negative = [
            ("min_rivdph", self.min_rivdph),
            ("min_rivwth", self.min_rivwth),
            ("smooth_len", self.smooth_len),
        ];
        for (key, value) in non_negative {
            if value.is_nan() || value < 0.0 {
                return Err(MhError::invalid_config(key, value.to_string(), "must be non-negative"));
            }
        }
        if !(0.0..=1.0).contains(&self.min_rivlen_ratio) {
            return Err(MhError::invalid_config(
                "min_rivlen_ratio",
                self.min_rivlen_ratio.to_string(),
                "must be within [0, 1]",
            ));
        }
        Ok(())
    }

    fn stage(&self, model: &WflowModel, catalog: &dyn DataCatalog) -> MhResult<StagedUpdate> {
        let names = model.translator();
        let maps = model.staticmaps();
        let grid = model.grid();
        let fd = model_flow_direction(model)?;
        let uparea = valid_values(maps.get(names.to_display_name("uparea")?)?);
        let elevation = maps.get(self.elevtn_map.source_name())?;

        let layers = fetch_layers(
            model,
            catalog,
            &self.hydrography_fn,
            &[
                LayerRequest::optional("qbankfull", ResampleMethod::Average),
                LayerRequest::optional("rivwth", ResampleMethod::Average),
            ],
        )?;
        let qbankfull = layers
            .get("qbankfull")
            .map(valid_values)
            .ok_or_else(|| MhError::missing_field(format!("{}.qbankfull", self.hydrography_fn)))?;

        let river = self.river_mask(&fd, &uparea)?;
        let hydrodem = corrected_elevation(&fd, elevation);
        let rivlen = river_length(&fd, grid, &river, self.min_rivlen_ratio);
        let rivslp = river_slope(&fd, grid, &river, &hydrodem, self.slope_len);

        let mut rivwth = vec![None; grid.n_cells()];
        if let Some(id) = &self.river_geom_fn {
            burn_geometry_widths(&catalog.geometries(id)?, grid, &river, &mut rivwth);
        }
        if let Some(layer) = layers.get("rivwth") {
            for (i, w) in rivwth.iter_mut().enumerate() {
                if river[i] && w.is_none() {
                    *w = layer.value_at(i).filter(|&v| v > 0.0);
                }
            }
        }
        let mut rivwth: Vec<f64> = rivwth
            .iter()
            .zip(&uparea)
            .map(|(w, a)| w.unwrap_or_else(|| powlaw_width(a.unwrap_or(0.0))).max(self.min_rivwth))
            .collect();
        if self.smooth_len > 0.0 {
            rivwth = smooth_along_network(&fd, grid, &river, &uparea, &rivwth, self.smooth_len)
                .into_iter()
                .map(|w| w.max(self.min_rivwth))
                .collect();
        }

        let rivman = self.manning_values(model, catalog, &river)?;
        let rivdph: Vec<f64> = (0..grid.n_cells())
            .map(|i| {
                let q = qbankfull[i].unwrap_or(0.0);
                self.rivdph_method
                    .depth(q, rivwth[i], rivslp[i], rivman[i])
                    .max(self.min_rivdph)
            })
            .collect();

        tracing::info!(
            river_cells = river.iter().filter(|&&r| r).count(),
            method = %self.rivdph_method,
            routing = self.river_routing.as_str(),
            hydrodem = self.elevtn_map.hydrodem_name(),
            "river geometry derived"
        );

        let mut update = StagedUpdate::new();
        let river_values: Vec<f64> = river.iter().map(|&r| if r { 1.0 } else { 0.0 }).collect();
        update.stage_mapped(names, names.to_display_name("rivmsk")?, Raster::from_data(grid.clone(), river_values, 0.0)?)?;
        let maps_out = [
            ("rivlen", rivlen),
            ("rivslp", rivslp),
            ("rivwth", rivwth),
            ("rivdph", rivdph),
            ("rivman", rivman),
        ];
        for (key, values) in maps_out {
            let raster = river_raster(grid, &river, &values)?;
            update.stage_mapped(names, names.to_display_name(key)?, raster)?;
        }

        let hydrodem_name = self.elevtn_map.hydrodem_name();
        let hydrodem_data = hydrodem.iter().map(|z| z.unwrap_or(RIVER_NODATA)).collect();
        update.stage_mapped(
            names,
            hydrodem_name,
            Raster::from_data(grid.clone(), hydrodem_data, RIVER_NODATA)?,
        )?;

        update.stage_config(RIVER_ROUTING_PATH, self.river_routing.as_str());
        match self.river_routing {
            RiverRouting::LocalInertial => update.stage_config(BANKFULL_ELEVATION_PATH, hydrodem_name),
            RiverRouting::KinematicWave => update.unset_config(BANKFULL_ELEVATION_PATH),
        }
        Ok(update)
    }
}

impl SetupRivers {
    /// 上游面积不小于阈值的网络单元；连通性开启时向下游补齐
    fn river_mask(&self, fd: &FlowDirection, uparea: &[Option<f64>]) -> MhResult<Vec<bool>> {
        let mut river: Vec<bool> = (0..fd.n_cells())
            .map(|i| fd.is_valid(i) && uparea[i].is_some_and(|a| a >= self.river_upa))
            .collect();
        if self.connectivity {
            let mut added = 0usize;
            for i in fd.topological_order() {
                if let (true, Some(j)) = (river[i], fd.downstream(i)) {
                    if !river[j] {
                        river[j] = true;
                        added += 1;
                    }
                }
            }
            if added > 0 {
                tracing::warn!(cells = added, "river cells added downstream to keep the network connected");
            }
        }
        if !river.iter().any(|&r| r) {
            return Err(MhError::invalid_input(format!(
                "no river cells with upstream area >= {} km2",
                self.river_upa
            )));
        }
        Ok(river)
    }

    /// 按河网等级映射糙率，未映射的等级取缺省值
    fn manning_values(
        &self,
        model: &WflowModel,
        catalog: &dyn DataCatalog,
        river: &[bool],
    ) -> MhResult<Vec<f64>> {
        let n = river.len();
        let Some(id) = &self.rivman_mapping else {
            return Ok(vec![DEFAULT_RIVER_MANNING; n]);
        };
        let table = catalog.table(id)?;
        let (Some(orders), Some(values)) = (table.column("strord"), table.column("N_River")) else {
            return Err(MhError::invalid_input(format!(
                "roughness mapping '{id}' needs columns 'strord' and 'N_River'"
            )));
        };
        let mapping: HashMap<i64, f64> = orders
            .iter()
            .zip(&values)
            .filter(|(o, v)| o.is_finite() && v.is_finite())
            .map(|(o, v)| (o.round() as i64, *v))
            .collect();

        let strord_name = model.translator().to_display_name("strord")?;
        let strord = model.staticmaps().get(strord_name)?;
        let mut unmapped = 0usize;
        let out = (0..n)
            .map(|i| {
                let order = strord.value_at(i).map(|o| o.round() as i64);
                match order.and_then(|o| mapping.get(&o)) {
                    Some(&v) => v,
                    None => {
                        if river[i] {
                            unmapped += 1;
                        }
                        DEFAULT_RIVER_MANNING
                    }
                }
            })
            .collect();
        if unmapped > 0 {
            tracing::warn!(cells = unmapped, mapping = %id, "stream orders without roughness mapping");
        }
        Ok(out)
    }
}

// ============================================================
// 网络运算
// ============================================================

/// 修正高程：沿拓扑顺序把下游单元压到不高于其上游
#[must_use]
pub fn corrected_elevation(fd: &FlowDirection, elevation: &Raster) -> Vec<Option<f64>> {
    let mut z = valid_values(elevation);
    for i in fd.topological_order() {
        if let (Some(zi), Some(j)) = (z[i], fd.downstream(i)) {
            if let Some(zj) = z[j] {
                if zj > zi {
                    z[j] = Some(zi);
                }
            }
        }
    }
    z
}

fn cell_size(grid: &GridSpec, i: usize) -> f64 {
    let (dx, dy) = grid.cell_lengths(i / grid.width);
    (dx + dy) / 2.0
}

/// 河长：到下游单元中心的距离，出口取单元尺寸
fn river_length(fd: &FlowDirection, grid: &GridSpec, river: &[bool], min_ratio: f64) -> Vec<f64> {
    (0..fd.n_cells())
        .map(|i| {
            if !river[i] {
                return RIVER_NODATA;
            }
            let size = cell_size(grid, i);
            let len = fd.downstream(i).map_or(size, |j| grid.cell_distance(i, j));
            len.max(min_ratio * size)
        })
        .collect()
}

/// 河道比降：沿下游累积到 `slope_len` 的高程差除以距离
fn river_slope(
    fd: &FlowDirection,
    grid: &GridSpec,
    river: &[bool],
    hydrodem: &[Option<f64>],
    slope_len: f64,
) -> Vec<f64> {
    (0..fd.n_cells())
        .map(|i| {
            if !river[i] {
                return RIVER_NODATA;
            }
            let Some(z0) = hydrodem[i] else {
                return MIN_RIVER_SLOPE;
            };
            let (mut prev, mut dist, mut z_end) = (i, 0.0, z0);
            for j in fd.downstream_path(i, fd.n_cells()) {
                let Some(zj) = hydrodem[j] else { break };
                dist += grid.cell_distance(prev, j);
                z_end = zj;
                prev = j;
                if dist >= slope_len {
                    break;
                }
            }
            if dist > 0.0 {
                ((z0 - z_end) / dist).max(MIN_RIVER_SLOPE)
            } else {
                MIN_RIVER_SLOPE
            }
        })
        .collect()
}

/// 把河道几何要素的 `rivwth` 属性写到覆盖的河道单元，重叠处取最大值
fn burn_geometry_widths(
    features: &[mh_geo::Feature],
    grid: &GridSpec,
    river: &[bool],
    widths: &mut [Option<f64>],
) {
    for feature in features {
        let Some(w) = feature.property("rivwth").filter(|&w| w > 0.0) else {
            continue;
        };
        let cells = match &feature.geometry {
            Geometry::LineString(line) => line_cells(grid, line),
            Geometry::Polygon(poly) => polygon_cells(grid, poly),
            Geometry::Point(p) => grid.cell_of(p).into_iter().collect(),
        };
        for (r, c) in cells {
            let i = grid.index(r, c);
            if river[i] {
                widths[i] = Some(widths[i].map_or(w, |old: f64| old.max(w)));
            }
        }
    }
}

/// 沿河网滑动平均：下游方向和上游主干（上游面积最大的河道支流）各取半个窗口
fn smooth_along_network(
    fd: &FlowDirection,
    grid: &GridSpec,
    river: &[bool],
    uparea: &[Option<f64>],
    values: &[f64],
    window: f64,
) -> Vec<f64> {
    let half = window / 2.0;
    let main_upstream = |i: usize| -> Option<usize> {
        fd.upstream_neighbors(i)
            .into_iter()
            .filter(|&j| river[j])
            .max_by(|&a, &b| {
                uparea[a]
                    .unwrap_or(0.0)
                    .total_cmp(&uparea[b].unwrap_or(0.0))
                    .then(b.cmp(&a))
            })
    };

    (0..fd.n_cells())
        .map(|i| {
            if !river[i] {
                return values[i];
            }
            let (mut sum, mut count) = (values[i], 1usize);

            let (mut prev, mut dist) = (i, 0.0);
            for j in fd.downstream_path(i, fd.n_cells()) {
                dist += grid.cell_distance(prev, j);
                if dist > half || !river[j] {
                    break;
                }
                sum += values[j];
                count += 1;
                prev = j;
            }

            let (mut cur, mut dist) = (i, 0.0);
            while let Some(j) = main_upstream(cur) {
                dist += grid.cell_distance(cur, j);
                if dist > half {
                    break;
                }
                sum += values[j];
                count += 1;
                cur = j;
            }
            sum / count as f64
        })
        .collect()
}

fn river_raster(grid: &GridSpec, river: &[bool], values: &[f64]) -> MhResult<Raster> {
    let data = river
        .iter()
        .zip(values)
        .map(|(&r, &v)| if r { v } else { RIVER_NODATA })
        .collect();
    Raster::from_data(grid.clone(), data, RIVER_NODATA)
}
