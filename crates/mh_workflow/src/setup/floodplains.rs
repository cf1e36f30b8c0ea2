// crates/mh_workflow/src/setup/floodplains.rs

//! 洪泛区离散
//!
//! 两种互斥的方案，由 [`FloodplainType`] 区分：
//!
//! - 一维：每个河道单元给出各淹没水深下汇入该单元的区域可蓄水量，
//!   登记为带 `flood_depth` 维度的 `floodplain_volume`；
//! - 二维：把修正高程改造为四向连通（对角下游步插入正交绕行单元），
//!   同时用作河道平滩高程和坡面局部惯性路由的地表高程。
//!
//! 两者都要求河道流程已选用局部惯性路由。

use super::rivers::{ElevationMap, BANKFULL_ELEVATION_PATH, RIVER_NODATA, RIVER_ROUTING_PATH};
use super::{fetch_layers, model_flow_direction, valid_values, LayerRequest, SetupMethod};
use crate::catalog::DataCatalog;
use crate::methods::DEFAULT_FLOODPLAIN_MANNING;
use crate::model::{StagedUpdate, WflowModel};
use mh_foundation::error::{MhError, MhResult};
use mh_terrain::{FlowDirection, LayerDim, Raster, ResampleMethod};
use serde::{Deserialize, Serialize};

/// 一维洪泛开关配置路径
pub const FLOODPLAIN_1D_PATH: &str = "model.floodplain_1d";
/// 坡面路由格式配置路径
pub const LAND_ROUTING_PATH: &str = "model.land_routing";
/// 坡面高程配置路径
pub const LAND_ELEVATION_PATH: &str = "input.lateral.land.elevation";
/// 淹没水深维度名
pub const FLOOD_DEPTH_DIM: &str = "flood_depth";

const VOLUME_MAP: &str = "floodplain_volume";
const MANNING_MAP: &str = "floodplain_n";

/// 洪泛区离散方案
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FloodplainType {
    /// 一维库容-水深关系
    #[serde(rename = "1d")]
    OneD,
    /// 二维四向修正高程
    #[serde(rename = "2d")]
    TwoD,
}

fn default_hydrography_fn() -> String {
    "merit_hydro".to_string()
}
fn default_river_upa() -> f64 {
    30.0
}
fn default_flood_depths() -> Vec<f64> {
    vec![0.5, 1.0, 1.5, 2.0, 2.5, 3.0, 4.0, 5.0]
}

/// 洪泛区装配参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetupFloodplains {
    /// 水文数据集（一维方案取其 `elevtn` 计算相对河床高度）
    #[serde(default = "default_hydrography_fn")]
    pub hydrography_fn: String,
    /// 离散方案
    pub floodplain_type: FloodplainType,
    /// 河道上游面积阈值 km²
    #[serde(default = "default_river_upa")]
    pub river_upa: f64,
    /// 一维方案的淹没水深序列 m
    #[serde(default = "default_flood_depths")]
    pub flood_depths: Vec<f64>,
    /// 修正高程所用的高程图
    #[serde(default)]
    pub elevtn_map: ElevationMap,
}

impl SetupFloodplains {
    /// 以缺省参数创建
    #[must_use]
    pub fn new(floodplain_type: FloodplainType) -> Self {
        Self {
            hydrography_fn: default_hydrography_fn(),
            floodplain_type,
            river_upa: default_river_upa(),
            flood_depths: default_flood_depths(),
            elevtn_map: ElevationMap::default(),
        }
    }

    /// 校验淹没水深序列，原样作为 `flood_depth` 坐标
    pub fn depth_levels(&self) -> MhResult<Vec<f64>> {
        let depths = &self.flood_depths;
        if depths.is_empty() {
            return Err(MhError::invalid_config("flood_depths", "[]", "must not be empty"));
        }
        if depths.iter().any(|d| !d.is_finite() || *d < 0.0) {
            return Err(MhError::invalid_config(
                "flood_depths",
                format!("{depths:?}"),
                "depths must be finite and non-negative",
            ));
        }
        if depths.windows(2).any(|w| w[1] <= w[0]) {
            return Err(MhError::invalid_config(
                "flood_depths",
                format!("{depths:?}"),
                "depths must be strictly increasing",
            ));
        }
        Ok(depths.clone())
    }

    fn stage_1d(&self, model: &WflowModel, catalog: &dyn DataCatalog, update: &mut StagedUpdate) -> MhResult<()> {
        let names = model.translator();
        let grid = model.grid();
        let levels = self.depth_levels()?;
        let fd = model_flow_direction(model)?;
        let uparea = valid_values(model.staticmaps().get(names.to_display_name("uparea")?)?);
        let hydrodem_name = self.elevtn_map.hydrodem_name();
        let bed = valid_values(model.staticmaps().get(hydrodem_name)?);
        let mut layers = fetch_layers(
            model,
            catalog,
            &self.hydrography_fn,
            &[LayerRequest::required("elevtn", ResampleMethod::Average)],
        )?;
        let terrain = layers
            .remove("elevtn")
            .ok_or_else(|| MhError::missing_field("elevtn"))?;

        let river: Vec<bool> = (0..fd.n_cells())
            .map(|i| fd.is_valid(i) && uparea[i].is_some_and(|a| a >= self.river_upa))
            .collect();
        let volumes = floodplain_volumes(&fd, model.grid(), &river, &terrain, &bed, &levels);
        let n_river = river.iter().filter(|&&r| r).count();
        tracing::info!(river_cells = n_river, levels = levels.len(), "1D floodplain volumes derived");

        let n = grid.n_cells();
        let mut data = Vec::with_capacity(n * levels.len());
        for k in 0..levels.len() {
            data.extend((0..n).map(|i| if river[i] { volumes[i][k] } else { RIVER_NODATA }));
        }
        let dim = LayerDim {
            name: FLOOD_DEPTH_DIM.to_string(),
            coords: levels,
        };
        let volume = Raster::from_layers(grid.clone(), dim, data, RIVER_NODATA)?;
        let manning_data = river
            .iter()
            .map(|&r| if r { DEFAULT_FLOODPLAIN_MANNING } else { RIVER_NODATA })
            .collect();
        let manning = Raster::from_data(grid.clone(), manning_data, RIVER_NODATA)?;

        update.stage_mapped(names, VOLUME_MAP, volume)?;
        update.stage_mapped(names, MANNING_MAP, manning)?;
        update.stage_config(FLOODPLAIN_1D_PATH, true);
        update.stage_config(LAND_ROUTING_PATH, "kinematic-wave");
        update.stage_config(BANKFULL_ELEVATION_PATH, hydrodem_name);
        update.unset_config(LAND_ELEVATION_PATH);
        Ok(())
    }

    fn stage_2d(&self, model: &WflowModel, update: &mut StagedUpdate) -> MhResult<()> {
        let hydrodem_name = self.elevtn_map.hydrodem_name();
        let hydrodem = model.staticmaps().get(hydrodem_name)?;
        let fd = model_flow_direction(model)?;
        let (d4, dug) = d4_corrected(&fd, hydrodem)?;
        let name = format!("{hydrodem_name}_D4");
        tracing::info!(field = %name, cells_lowered = dug, "4-connected elevation derived");

        update.stage_field(name.as_str(), d4);
        update.stage_config(FLOODPLAIN_1D_PATH, false);
        update.stage_config(LAND_ROUTING_PATH, "local-inertial");
        update.stage_config(BANKFULL_ELEVATION_PATH, name.as_str());
        update.stage_config(LAND_ELEVATION_PATH, name.as_str());
        for map in [VOLUME_MAP, MANNING_MAP] {
            if let Ok(Some(path)) = model.translator().to_config_path(map) {
                update.unset_config(path);
            }
        }
        Ok(())
    }
}

impl SetupMethod for SetupFloodplains {
    fn name(&self) -> &'static str {
        "setup_floodplains"
    }

    fn validate(&self) -> MhResult<()> {
        if self.river_upa.is_nan() || self.river_upa <= 0.0 {
            return Err(MhError::invalid_config(
                "river_upa",
                self.river_upa.to_string(),
                "must be positive",
            ));
        }
        if self.floodplain_type == FloodplainType::OneD {
            self.depth_levels()?;
        }
        Ok(())
    }

    fn stage(&self, model: &WflowModel, catalog: &dyn DataCatalog) -> MhResult<StagedUpdate> {
        let routing = model.get_config(RIVER_ROUTING_PATH).and_then(|v| v.as_str());
        if routing != Some("local-inertial") {
            return Err(MhError::invalid_config(
                RIVER_ROUTING_PATH,
                routing.unwrap_or("<unset>"),
                "floodplains require local-inertial river routing, run setup_rivers with river_routing = \"local-inertial\" first",
            ));
        }

        let mut update = StagedUpdate::new();
        match self.floodplain_type {
            FloodplainType::OneD => self.stage_1d(model, catalog, &mut update)?,
            FloodplainType::TwoD => self.stage_2d(model, &mut update)?,
        }
        Ok(update)
    }
}

/// 每个河道单元在各水深下的蓄水量 (m³)
///
/// 非河道单元沿 LDD 找到第一个下游河道单元；其相对高度为地形高程减河床
/// （修正高程）。水深 d 下单元贡献 `max(0, d - 相对高度) × 单元面积`。
#[must_use]
pub fn floodplain_volumes(
    fd: &FlowDirection,
    grid: &mh_geo::GridSpec,
    river: &[bool],
    terrain: &Raster,
    bed: &[Option<f64>],
    levels: &[f64],
) -> Vec<Vec<f64>> {
    let n = fd.n_cells();
    let mut target: Vec<Option<usize>> = vec![None; n];
    for i in fd.topological_order().into_iter().rev() {
        target[i] = if river[i] {
            Some(i)
        } else {
            fd.downstream(i).and_then(|j| target[j])
        };
    }

    let mut volumes = vec![vec![0.0; levels.len()]; n];
    for i in 0..n {
        let (Some(r), Some(z)) = (target[i], terrain.value_at(i)) else {
            continue;
        };
        let Some(z_bed) = bed[r] else {
            continue;
        };
        let hand = (z - z_bed).max(0.0);
        let area = grid.cell_area(i / grid.width);
        for (k, d) in levels.iter().enumerate() {
            volumes[r][k] += (d - hand).max(0.0) * area;
        }
    }
    volumes
}

/// 四向连通修正
///
/// 对每个对角下游步，在两个正交绕行单元中取较低且有效的一个，把它挖到不高于
/// 上游单元。返回修正后的栅格与被降低的单元数；高程图与流向尺寸不符时报错。
pub fn d4_corrected(fd: &FlowDirection, hydrodem: &Raster) -> MhResult<(Raster, usize)> {
    let grid = hydrodem.grid();
    MhError::check_size("hydrodem cells", fd.n_cells(), grid.n_cells())?;
    let w = grid.width;
    let mut z = valid_values(hydrodem);
    let mut dug = 0usize;
    for i in fd.topological_order() {
        if !fd.is_diagonal(i) {
            continue;
        }
        let (Some(j), Some(zi)) = (fd.downstream(i), z[i]) else {
            continue;
        };
        let (ri, ci) = (i / w, i % w);
        let (rj, cj) = (j / w, j % w);
        let detour = [ri * w + cj, rj * w + ci]
            .into_iter()
            .filter_map(|k| z[k].map(|zk| (k, zk)))
            .min_by(|a, b| a.1.total_cmp(&b.1));
        if let Some((k, zk)) = detour {
            if zk > zi {
                z[k] = Some(zi);
                dug += 1;
            }
        }
    }
    let data = z.iter().map(|v| v.unwrap_or(hydrodem.nodata())).collect();
    let raster = Raster::from_data(grid.clone(), data, hydrodem.nodata())?;
    Ok((raster, dug))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::ModelMode;
    use crate::setup::fixtures;
    use crate::setup::rivers::{RiverRouting, SetupRivers};
    use mh_geo::{CrsDefinition, GridSpec};

    fn rivers(routing: RiverRouting) -> SetupRivers {
        SetupRivers {
            river_upa: 0.12,
            smooth_len: 0.0,
            river_routing: routing,
            ..SetupRivers::default()
        }
    }

    fn floodplains(kind: FloodplainType) -> SetupFloodplains {
        SetupFloodplains {
            river_upa: 0.12,
            flood_depths: vec![1.0, 2.0],
            ..SetupFloodplains::new(kind)
        }
    }

    #[test]
    fn test_depth_levels() {
        let mut step = floodplains(FloodplainType::OneD);
        assert_eq!(step.depth_levels().unwrap(), vec![1.0, 2.0]);
        step.flood_depths = vec![0.5, 1.0, 1.5, 2.0, 2.5];
        assert_eq!(step.depth_levels().unwrap(), vec![0.5, 1.0, 1.5, 2.0, 2.5]);
        step.flood_depths = vec![0.0, 0.5];
        assert_eq!(step.depth_levels().unwrap(), vec![0.0, 0.5]);
        step.flood_depths = vec![1.0, 1.0];
        assert!(step.validate().is_err());
        step.flood_depths = vec![-1.0, 1.0];
        assert!(step.validate().is_err());
        // 二维方案不检查水深序列
        step.floodplain_type = FloodplainType::TwoD;
        assert!(step.validate().is_ok());
    }

    #[test]
    fn test_1d_volumes_at_outlet() {
        let (mut model, catalog) = fixtures::model_with_basemaps(ModelMode::Standard);
        model.run(&rivers(RiverRouting::LocalInertial), &catalog).unwrap();
        model.run(&floodplains(FloodplainType::OneD), &catalog).unwrap();

        let volume = model.staticmaps().get("floodplain_volume").unwrap();
        assert_eq!(volume.layer_dim().unwrap().coords, vec![1.0, 2.0]);
        assert_eq!(volume.n_layers(), 2);
        // 出口 (2,4) 河床 80 m；侧向单元相对高度 2 m 和 4 m
        assert!((volume.layer(0)[14] - 1.0e4).abs() < 1e-6);
        assert!((volume.layer(1)[14] - 2.0e4).abs() < 1e-6);
        assert_eq!(model.config().get_bool(FLOODPLAIN_1D_PATH), Some(true));
        assert_eq!(model.config().get_str(LAND_ROUTING_PATH), Some("kinematic-wave"));
        assert_eq!(
            model.config().get_str("input.lateral.river.floodplain.volume"),
            Some("floodplain_volume")
        );
    }

    #[test]
    fn test_requires_local_inertial() {
        let (mut model, catalog) = fixtures::model_with_basemaps(ModelMode::Standard);
        model.run(&rivers(RiverRouting::KinematicWave), &catalog).unwrap();
        let before = model.staticmaps().len();
        let err = model.run(&floodplains(FloodplainType::TwoD), &catalog).unwrap_err();
        assert!(matches!(err, MhError::InvalidConfig { .. }));
        assert_eq!(model.staticmaps().len(), before);
        assert!(model.get_config(FLOODPLAIN_1D_PATH).is_none());
    }

    #[test]
    fn test_2d_after_1d_is_exclusive() {
        let (mut model, catalog) = fixtures::model_with_basemaps(ModelMode::Standard);
        model.run(&rivers(RiverRouting::LocalInertial), &catalog).unwrap();
        model.run(&floodplains(FloodplainType::OneD), &catalog).unwrap();
        model.run(&floodplains(FloodplainType::TwoD), &catalog).unwrap();

        assert!(model.staticmaps().has("hydrodem_avg_D4"));
        assert_eq!(model.config().get_bool(FLOODPLAIN_1D_PATH), Some(false));
        assert_eq!(model.config().get_str(LAND_ROUTING_PATH), Some("local-inertial"));
        assert_eq!(model.config().get_str(BANKFULL_ELEVATION_PATH), Some("hydrodem_avg_D4"));
        assert_eq!(model.config().get_str(LAND_ELEVATION_PATH), Some("hydrodem_avg_D4"));
        assert!(model.get_config("input.lateral.river.floodplain.volume").is_none());
    }

    #[test]
    fn test_d4_digs_detour_cell() {
        // 2x2：左上对角流向右下出口
        //   3 5
        //   5 5   (只有 0 -> 3 一条对角步)
        let grid = GridSpec::new(CrsDefinition::utm_zone(32, true), 0.0, 200.0, 100.0, -100.0, 2, 2);
        let ldd = Raster::from_data(grid.clone(), vec![3.0, 5.0, 5.0, 5.0], 255.0).unwrap();
        let fd = FlowDirection::from_ldd(&ldd).unwrap();
        let dem = Raster::from_data(grid, vec![10.0, 12.0, 11.0, 9.0], -9999.0).unwrap();
        let (d4, dug) = d4_corrected(&fd, &dem).unwrap();
        assert_eq!(dug, 1);
        // 绕行单元取较低的 (1,0)
        assert_eq!(d4.data(), &[10.0, 12.0, 10.0, 9.0]);
    }

    #[test]
    fn test_d4_rejects_mismatched_surface() {
        let utm = CrsDefinition::utm_zone(32, true);
        let grid = GridSpec::new(utm.clone(), 0.0, 200.0, 100.0, -100.0, 2, 2);
        let ldd = Raster::from_data(grid, vec![3.0, 5.0, 5.0, 5.0], 255.0).unwrap();
        let fd = FlowDirection::from_ldd(&ldd).unwrap();
        let wide = GridSpec::new(utm, 0.0, 200.0, 100.0, -100.0, 3, 2);
        let dem = Raster::filled(wide, 10.0, -9999.0);
        assert!(matches!(d4_corrected(&fd, &dem), Err(MhError::SizeMismatch { .. })));
    }
}
