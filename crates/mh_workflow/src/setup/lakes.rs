// crates/mh_workflow/src/setup/lakes.rs

//! 湖泊
//!
//! 湖泊多边形烧录为分布图，出口单元登记位置与参数。提供外部率定曲线的湖泊
//! 生成库容-水位表 `lake_sh_<id>` 与泄流-水位表 `lake_hq_<id>`，对应的函数代码
//! 切换为查表；其余湖泊使用 `Q = b·(h - threshold)^e` 的解析式。

use super::waterbodies::{self, Waterbodies};
use super::{model_uparea, SetupMethod};
use crate::catalog::DataCatalog;
use crate::methods::{
    lake_b, DEFAULT_LAKE_E, LAKE_OUTFLOWFUNC_CURVE, LAKE_OUTFLOWFUNC_DEFAULT, LAKE_STORFUNC_CURVE,
    LAKE_STORFUNC_DEFAULT,
};
use crate::model::{StagedUpdate, WflowModel};
use crate::tables::{TableFamily, TableKey};
use mh_foundation::error::{MhError, MhResult};
use mh_geo::{Feature, FeatureId};
use mh_io::table::Table;
use mh_terrain::Raster;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 湖泊开关配置路径
pub const LAKES_PATH: &str = "model.lakes";

/// 泄流表按年内日序展开的列数
const DAYS_PER_YEAR: usize = 365;

fn default_lakes_fn() -> String {
    "hydro_lakes".to_string()
}
fn default_min_area() -> f64 {
    10.0
}

/// 湖泊装配参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetupLakes {
    /// 湖泊多边形数据源
    #[serde(default = "default_lakes_fn")]
    pub lakes_fn: String,
    /// 率定曲线数据源，标识以 `_<湖泊标识>` 结尾
    #[serde(default)]
    pub rating_curve_fns: Vec<String>,
    /// 最小湖泊面积 km²
    #[serde(default = "default_min_area")]
    pub min_area: f64,
}

impl Default for SetupLakes {
    fn default() -> Self {
        Self {
            lakes_fn: default_lakes_fn(),
            rating_curve_fns: Vec::new(),
            min_area: default_min_area(),
        }
    }
}

impl SetupLakes {
    /// 指定湖泊数据源
    #[must_use]
    pub fn new(lakes_fn: impl Into<String>) -> Self {
        Self {
            lakes_fn: lakes_fn.into(),
            ..Self::default()
        }
    }

    /// 附加率定曲线数据源
    #[must_use]
    pub fn with_rating_curves<S: Into<String>>(mut self, ids: impl IntoIterator<Item = S>) -> Self {
        self.rating_curve_fns = ids.into_iter().map(Into::into).collect();
        self
    }

    /// 设置最小面积
    #[must_use]
    pub fn with_min_area(mut self, min_area: f64) -> Self {
        self.min_area = min_area;
        self
    }

    /// 读取率定曲线，按湖泊标识索引
    fn rating_curves(
        &self,
        catalog: &dyn DataCatalog,
        wb: &Waterbodies,
    ) -> MhResult<HashMap<FeatureId, RatingCurves>> {
        let mut curves = HashMap::new();
        for source in &self.rating_curve_fns {
            let id = curve_feature_id(source)?;
            if !wb.features.iter().any(|f| f.id == id) {
                tracing::debug!(source = %source, lake = %id, "rating curve for lake outside model domain");
                continue;
            }
            let table = catalog.table(source)?;
            curves.insert(id, RatingCurves::from_table(source, &table)?);
        }
        Ok(curves)
    }
}

/// 由数据源标识末尾的 `_<id>` 得到湖泊标识
fn curve_feature_id(source: &str) -> MhResult<FeatureId> {
    source
        .rsplit_once('_')
        .map(|(_, id)| id)
        .filter(|id| !id.is_empty())
        .map(|id| id.parse::<FeatureId>().unwrap_or_else(|never| match never {}))
        .ok_or_else(|| MhError::invalid_config("rating_curve_fns", source, "source id must end with _<lake id>"))
}

// ============================================================
// 率定曲线
// ============================================================

#[derive(Debug)]
struct RatingCurves {
    sh: Option<Table>,
    hq: Option<Table>,
}

impl RatingCurves {
    /// 由 `elevtn`/`volume`/`discharge` 列派生两张表，每列各自丢弃缺测行
    fn from_table(source: &str, table: &Table) -> MhResult<Self> {
        let h = table.column("elevtn").ok_or_else(|| {
            MhError::invalid_input(format!("rating curve '{source}' has no 'elevtn' column"))
        })?;

        let sh = match table.column("volume").and_then(|s| finite_pairs(&h, &s)) {
            Some((h, s)) => Some(Table::from_columns(vec![("H".to_string(), h), ("S".to_string(), s)])?),
            None => None,
        };
        let hq = match table.column("discharge").and_then(|q| finite_pairs(&h, &q)) {
            Some((h, q)) => {
                let mut columns = Vec::with_capacity(DAYS_PER_YEAR + 1);
                columns.push(("H".to_string(), h));
                columns.extend((1..=DAYS_PER_YEAR).map(|doy| (doy.to_string(), q.clone())));
                Some(Table::from_columns(columns)?)
            }
            None => None,
        };
        if sh.is_none() && hq.is_none() {
            return Err(MhError::invalid_input(format!(
                "rating curve '{source}' has neither 'volume' nor 'discharge' values"
            )));
        }
        Ok(Self { sh, hq })
    }

    /// 曲线水位变幅
    fn level_range(&self) -> Option<f64> {
        let h = self.sh.as_ref().or(self.hq.as_ref())?.column("H")?;
        let max = h.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = h.iter().copied().fold(f64::INFINITY, f64::min);
        Some(max - min)
    }

    fn mean_discharge(&self) -> Option<f64> {
        let q = self.hq.as_ref()?.column("1")?;
        Some(q.iter().sum::<f64>() / q.len() as f64)
    }
}

fn finite_pairs(h: &[f64], v: &[f64]) -> Option<(Vec<f64>, Vec<f64>)> {
    let (h, v): (Vec<f64>, Vec<f64>) = h
        .iter()
        .zip(v)
        .filter(|(a, b)| a.is_finite() && b.is_finite())
        .map(|(a, b)| (*a, *b))
        .unzip();
    (!h.is_empty()).then_some((h, v))
}

// ============================================================
// 参数化
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq)]
struct LakeParams {
    area: f64,
    avg_level: f64,
    avg_out: f64,
    b: f64,
    storfunc: f64,
    outflowfunc: f64,
}

/// 由要素属性与可选曲线确定湖泊参数
///
/// 属性：`Area_avg` m²、`Depth_avg` m、`Dis_avg` m³/s。
fn parameterize(feature: &Feature, covered_area: f64, curves: Option<&RatingCurves>) -> MhResult<LakeParams> {
    let area = feature.property("Area_avg").filter(|a| *a > 0.0).unwrap_or(covered_area);
    let depth = feature.property("Depth_avg").filter(|d| *d > 0.0);
    let dis = feature.property("Dis_avg").filter(|q| *q >= 0.0);
    let analytic_b = dis.zip(depth).and_then(|(q, h)| lake_b(q, h));

    let has_sh = curves.is_some_and(|c| c.sh.is_some());
    let has_hq = curves.is_some_and(|c| c.hq.is_some());

    let (outflowfunc, b) = if has_hq {
        (LAKE_OUTFLOWFUNC_CURVE, analytic_b.unwrap_or(0.0))
    } else {
        let b = analytic_b.ok_or_else(|| {
            MhError::missing_parameterization(
                &feature.id,
                "no discharge rating curve and Dis_avg/Depth_avg unavailable",
            )
        })?;
        (LAKE_OUTFLOWFUNC_DEFAULT, b)
    };
    let storfunc = if has_sh { LAKE_STORFUNC_CURVE } else { LAKE_STORFUNC_DEFAULT };

    let avg_level = depth
        .or_else(|| curves.and_then(RatingCurves::level_range))
        .ok_or_else(|| MhError::missing_parameterization(&feature.id, "average lake level unavailable"))?;
    let avg_out = dis
        .or_else(|| curves.and_then(RatingCurves::mean_discharge))
        .ok_or_else(|| MhError::missing_parameterization(&feature.id, "average outflow unavailable"))?;

    Ok(LakeParams {
        area,
        avg_level,
        avg_out,
        b,
        storfunc,
        outflowfunc,
    })
}

impl SetupMethod for SetupLakes {
    fn name(&self) -> &'static str {
        "setup_lakes"
    }

    fn validate(&self) -> MhResult<()> {
        if self.min_area.is_nan() || self.min_area < 0.0 {
            return Err(MhError::invalid_config(
                "min_area",
                self.min_area.to_string(),
                "must be non-negative",
            ));
        }
        for source in &self.rating_curve_fns {
            curve_feature_id(source)?;
        }
        Ok(())
    }

    fn stage(&self, model: &WflowModel, catalog: &dyn DataCatalog) -> MhResult<StagedUpdate> {
        let names = model.translator();
        let grid = model.grid();
        let mut update = StagedUpdate::new();

        let features = catalog.geometries(&self.lakes_fn)?;
        let wb = waterbodies::prepare("lake", features, grid, self.min_area, model_uparea(model)?)?;
        if wb.is_empty() {
            tracing::warn!(source = %self.lakes_fn, min_area = self.min_area, "no lakes of sufficient size in model domain");
            return Ok(update);
        }

        let mut curves = self.rating_curves(catalog, &wb)?;
        let mut params = Vec::with_capacity(wb.features.len());
        for (feature, &covered) in wb.features.iter().zip(&wb.covered_area) {
            params.push(parameterize(feature, covered, curves.get(&feature.id))?);
        }

        let column = |f: fn(&LakeParams) -> f64| params.iter().map(f).collect::<Vec<_>>();
        let k = params.len();
        let maps = [
            ("LakeArea", wb.point_map(grid, &column(|p| p.area))),
            ("LakeAvgLevel", wb.point_map(grid, &column(|p| p.avg_level))),
            ("LakeAvgOut", wb.point_map(grid, &column(|p| p.avg_out))),
            ("LakeThreshold", wb.point_map(grid, &vec![0.0; k])),
            ("Lake_b", wb.point_map(grid, &column(|p| p.b))),
            ("Lake_e", wb.point_map(grid, &vec![DEFAULT_LAKE_E; k])),
            ("LakeStorFunc", wb.point_map(grid, &column(|p| p.storfunc))),
            ("LakeOutflowFunc", wb.point_map(grid, &column(|p| p.outflowfunc))),
            ("LinkedLakeLocs", wb.point_map(grid, &vec![0.0; k])),
        ];

        let locs_name = names.to_display_name("lakelocs")?;
        let fields: Vec<(&str, &Raster)> = maps.iter().map(|(n, r)| (*n, r)).collect();
        waterbodies::check_cardinality(locs_name, &wb.locations, k, &fields)?;

        let n_curves = curves.len();
        for feature in &wb.features {
            let Some(curve) = curves.remove(&feature.id) else { continue };
            if let Some(sh) = curve.sh {
                update.stage_table(TableKey::new(TableFamily::LakeSh, feature.id.clone()), sh);
            }
            if let Some(hq) = curve.hq {
                update.stage_table(TableKey::new(TableFamily::LakeHq, feature.id.clone()), hq);
            }
        }

        update.stage_mapped(names, names.to_display_name("lakeareas")?, wb.areas)?;
        update.stage_mapped(names, locs_name, wb.locations)?;
        for (name, raster) in maps {
            update.stage_mapped(names, name, raster)?;
        }
        update.stage_config(LAKES_PATH, true);
        tracing::info!(lakes = k, rating_curves = n_curves, "lakes parameterized");
        Ok(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::ModelMode;
    use crate::setup::fixtures::model_with_basemaps;
    use mh_config::ConfigValue;
    use mh_geo::{Geometry, Polygon};

    /// 覆盖左上 2x2 单元的湖泊
    fn lake(id: i64) -> Feature {
        Feature::new(id, Geometry::Polygon(Polygon::rectangle(0.0, 300.0, 200.0, 500.0)))
            .with_property("Area_avg", 4.0e4)
            .with_property("Depth_avg", 2.0)
            .with_property("Dis_avg", 8.0)
    }

    fn curve() -> Table {
        let nan = f64::NAN;
        Table::from_columns(vec![
            ("elevtn".to_string(), vec![10.0, 11.0, 12.0, 13.0]),
            ("volume".to_string(), vec![0.0, 4.0e4, 8.0e4, 1.2e5]),
            ("discharge".to_string(), vec![nan, nan, 1.0, 3.0]),
        ])
        .unwrap()
    }

    #[test]
    fn test_default_parameterization() {
        let (mut model, mut catalog) = model_with_basemaps(ModelMode::Standard);
        catalog.add_geometries("hydro_lakes", vec![lake(1)]);
        model.run(&SetupLakes::default().with_min_area(0.0), &catalog).unwrap();

        let maps = model.staticmaps();
        let locs = maps.get("wflow_lakelocs").unwrap();
        let (cell, id) = locs.valid_cells().next().unwrap();
        assert_eq!(id, 1.0);
        assert_eq!(maps.get("Lake_b").unwrap().value_at(cell), Some(2.0));
        assert_eq!(maps.get("LakeStorFunc").unwrap().value_at(cell), Some(LAKE_STORFUNC_DEFAULT));
        assert_eq!(maps.get("LakeOutflowFunc").unwrap().value_at(cell), Some(LAKE_OUTFLOWFUNC_DEFAULT));
        assert_eq!(maps.get("wflow_lakeareas").unwrap().count_valid(), 4);
        assert_eq!(model.get_config(LAKES_PATH), Some(&ConfigValue::Bool(true)));
        assert!(model.tables().is_empty());
    }

    #[test]
    fn test_rating_curve_switches_function_codes() {
        let (mut model, mut catalog) = model_with_basemaps(ModelMode::Standard);
        catalog.add_geometries("hydro_lakes", vec![lake(7)]);
        catalog.add_table("lake_rating_test_7", curve());
        let method = SetupLakes::default()
            .with_min_area(0.0)
            .with_rating_curves(["lake_rating_test_7"]);
        model.run(&method, &catalog).unwrap();

        let sh = model.tables().get_by_name("lake_sh_7").unwrap();
        assert_eq!(sh.n_rows(), 4);
        let hq = model.tables().get_by_name("lake_hq_7").unwrap();
        assert_eq!(hq.n_rows(), 2);
        assert_eq!(hq.n_cols(), DAYS_PER_YEAR + 1);
        assert_eq!(hq.column("365"), Some(vec![1.0, 3.0]));

        let maps = model.staticmaps();
        let cell = maps.get("wflow_lakelocs").unwrap().valid_cells().next().unwrap().0;
        assert_eq!(maps.get("LakeStorFunc").unwrap().value_at(cell), Some(LAKE_STORFUNC_CURVE));
        assert_eq!(maps.get("LakeOutflowFunc").unwrap().value_at(cell), Some(LAKE_OUTFLOWFUNC_CURVE));
    }

    #[test]
    fn test_curve_fallbacks_without_attributes() {
        let bare = Feature::new(3, Geometry::Polygon(Polygon::rectangle(0.0, 300.0, 200.0, 500.0)));
        let curves = RatingCurves::from_table("rc_3", &curve()).unwrap();
        let p = parameterize(&bare, 4.0e4, Some(&curves)).unwrap();
        assert_eq!(p.b, 0.0);
        assert_eq!(p.avg_level, 3.0);
        assert_eq!(p.avg_out, 2.0);
        assert_eq!(p.area, 4.0e4);
    }

    #[test]
    fn test_missing_parameterization() {
        let bare = Feature::new(3, Geometry::Polygon(Polygon::rectangle(0.0, 300.0, 200.0, 500.0)));
        let err = parameterize(&bare, 4.0e4, None).unwrap_err();
        assert!(matches!(err, MhError::MissingParameterization { .. }));
    }

    #[test]
    fn test_curve_source_id_suffix() {
        assert_eq!(curve_feature_id("rating_curve_42").unwrap(), FeatureId::Int(42));
        assert!(SetupLakes::default().with_rating_curves(["nosuffix"]).validate().is_err());
    }

    #[test]
    fn test_small_lakes_filtered_out() {
        let (mut model, mut catalog) = model_with_basemaps(ModelMode::Standard);
        catalog.add_geometries("hydro_lakes", vec![lake(1)]);
        model.run(&SetupLakes::default(), &catalog).unwrap();
        assert!(!model.staticmaps().has("wflow_lakelocs"));
        assert!(model.get_config(LAKES_PATH).is_none());
    }
}
