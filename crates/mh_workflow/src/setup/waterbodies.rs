// crates/mh_workflow/src/setup/waterbodies.rs

//! 湖泊与水库共用的要素栅格化
//!
//! 面积过滤、多边形烧录、出口单元定位，以及参数图与出口单元数量的一致性检查。

use mh_foundation::error::{MhError, MhResult};
use mh_geo::{Feature, GridSpec};
use mh_terrain::{rasterize_features, Raster};
use std::collections::HashMap;

/// 要素标识图的无数据值
pub(crate) const ID_NODATA: f64 = -999.0;

/// 参数图的无数据值
pub(crate) const PARAM_NODATA: f64 = -9999.0;

/// 栅格化后的水体要素
#[derive(Debug)]
pub(crate) struct Waterbodies {
    /// 保留的要素（过滤后且至少覆盖一个单元）
    pub features: Vec<Feature>,
    /// 每个要素的出口单元
    pub outlets: Vec<usize>,
    /// 每个要素覆盖的单元面积之和 m²
    pub covered_area: Vec<f64>,
    /// 要素分布图
    pub areas: Raster,
    /// 出口位置图
    pub locations: Raster,
}

impl Waterbodies {
    pub(crate) fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// 在出口单元写入每个要素的值
    pub(crate) fn point_map(&self, grid: &GridSpec, values: &[f64]) -> Raster {
        let mut raster = Raster::new(grid.clone(), PARAM_NODATA);
        for (&cell, &v) in self.outlets.iter().zip(values) {
            let (r, c) = grid.row_col(cell);
            raster.set(r, c, v);
        }
        raster
    }
}

/// 过滤并栅格化水体多边形
///
/// `min_area` 单位 km²，按 `Area_avg` 属性 (m²) 过滤；缺少该属性的要素保留。
/// 标识等于 [`ID_NODATA`] 或超出 ±2^53 的要素无法烧录，报无效输入。
/// 出口优先取 `xout`/`yout`，其次是上游面积最大的分布单元，再次是质心所在单元。
pub(crate) fn prepare(
    kind: &str,
    features: Vec<Feature>,
    grid: &GridSpec,
    min_area: f64,
    uparea: Option<&Raster>,
) -> MhResult<Waterbodies> {
    let total = features.len();
    let mut kept = Vec::with_capacity(total);
    for feature in features {
        if feature.geometry.as_polygon().is_none() {
            return Err(MhError::invalid_input(format!(
                "{kind} {} is not a polygon",
                feature.id
            )));
        }
        let area_km2 = feature.property("Area_avg").map(|a| a / 1e6);
        if area_km2.map_or(true, |a| a >= min_area) {
            kept.push(feature);
        }
    }
    tracing::debug!(kind, total, kept = kept.len(), min_area, "area filter applied");

    let areas = rasterize_features(&kept, grid, ID_NODATA)?;
    let mut cells: HashMap<i64, Vec<usize>> = HashMap::new();
    for (i, v) in areas.valid_cells() {
        cells.entry(v as i64).or_default().push(i);
    }

    let mut features = Vec::with_capacity(kept.len());
    let mut outlets = Vec::with_capacity(kept.len());
    let mut covered_area = Vec::with_capacity(kept.len());
    for feature in kept {
        // 整数标识在烧录时已检查
        let id = feature.id.as_raster_value().unwrap_or(ID_NODATA) as i64;
        let Some(own) = cells.get(&id).filter(|c| !c.is_empty()) else {
            tracing::warn!(kind, id = %feature.id, "feature covers no cell centre and is dropped");
            continue;
        };
        outlets.push(outlet_cell(&feature, own, grid, uparea));
        covered_area.push(own.iter().map(|&i| grid.cell_area(i / grid.width)).sum::<f64>());
        features.push(feature);
    }

    let mut locations = Raster::new(grid.clone(), ID_NODATA);
    for (feature, &cell) in features.iter().zip(&outlets) {
        let (r, c) = grid.row_col(cell);
        locations.set(r, c, feature.id.as_raster_value().unwrap_or(ID_NODATA));
    }

    tracing::info!(kind, count = features.len(), "waterbodies rasterized");
    Ok(Waterbodies {
        features,
        outlets,
        covered_area,
        areas,
        locations,
    })
}

fn outlet_cell(feature: &Feature, own: &[usize], grid: &GridSpec, uparea: Option<&Raster>) -> usize {
    if let (Some(x), Some(y)) = (feature.property("xout"), feature.property("yout")) {
        if let Some((r, c)) = grid.cell_of(&mh_geo::Point2D::new(x, y)) {
            return grid.index(r, c);
        }
    }
    if let Some(upa) = uparea {
        let best = own
            .iter()
            .filter_map(|&i| upa.value_at(i).map(|a| (i, a)))
            .max_by(|a, b| a.1.total_cmp(&b.1).then(b.0.cmp(&a.0)));
        if let Some((i, _)) = best {
            return i;
        }
    }
    feature
        .geometry
        .representative_point()
        .and_then(|p| grid.cell_of(&p))
        .map(|(r, c)| grid.index(r, c))
        .filter(|i| own.contains(i))
        .unwrap_or(own[0])
}

/// 出口单元数与要素数一致，且每个参数图恰好在这些单元上有值
pub(crate) fn check_cardinality(
    location_name: &str,
    locations: &Raster,
    n_features: usize,
    fields: &[(&str, &Raster)],
) -> MhResult<()> {
    let locs: Vec<usize> = locations.valid_cells().map(|(i, _)| i).collect();
    MhError::check_cardinality(location_name, n_features, locs.len())?;
    for (name, raster) in fields {
        let at_locs = locs.iter().filter(|&&i| raster.value_at(i).is_some()).count();
        MhError::check_cardinality(name, locs.len(), at_locs)?;
        MhError::check_cardinality(name, locs.len(), raster.count_valid())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mh_geo::{CrsDefinition, Geometry, Polygon};

    fn grid() -> GridSpec {
        GridSpec::new(CrsDefinition::utm_zone(32, true), 0.0, 500.0, 100.0, -100.0, 5, 5)
    }

    fn lake(id: i64, min: (f64, f64), max: (f64, f64), area_m2: f64) -> Feature {
        Feature::new(id, Geometry::Polygon(Polygon::rectangle(min.0, min.1, max.0, max.1)))
            .with_property("Area_avg", area_m2)
    }

    #[test]
    fn test_min_area_filter_and_outlets() {
        let features = vec![
            lake(1, (0.0, 300.0), (200.0, 500.0), 4.0e6),
            lake(2, (300.0, 0.0), (500.0, 200.0), 0.5e6),
        ];
        let wb = prepare("lake", features, &grid(), 1.0, None).unwrap();
        assert_eq!(wb.features.len(), 1);
        assert_eq!(wb.areas.count_valid(), 4);
        assert_eq!(wb.locations.count_valid(), 1);
        assert!((wb.covered_area[0] - 4.0e4).abs() < 1e-6);
    }

    #[test]
    fn test_outlet_prefers_largest_uparea() {
        let mut upa = Raster::filled(grid(), 1.0, -9999.0);
        upa.set(1, 1, 9.0);
        let wb = prepare("lake", vec![lake(7, (0.0, 300.0), (200.0, 500.0), 4.0e6)], &grid(), 0.0, Some(&upa)).unwrap();
        assert_eq!(wb.outlets, vec![grid().index(1, 1)]);
        assert_eq!(wb.locations.get(1, 1), Some(7.0));
    }

    #[test]
    fn test_explicit_outlet_coordinates() {
        let f = lake(3, (0.0, 300.0), (200.0, 500.0), 4.0e6)
            .with_property("xout", 150.0)
            .with_property("yout", 350.0);
        let wb = prepare("reservoir", vec![f], &grid(), 0.0, None).unwrap();
        assert_eq!(wb.outlets, vec![grid().index(1, 1)]);
    }

    #[test]
    fn test_feature_without_cells_dropped() {
        // 多边形不覆盖任何单元中心
        let tiny = lake(4, (10.0, 410.0), (20.0, 420.0), 2.0e6);
        let wb = prepare("lake", vec![tiny], &grid(), 0.0, None).unwrap();
        assert!(wb.is_empty());
    }

    #[test]
    fn test_nodata_id_rejected() {
        let err = prepare("reservoir", vec![lake(-999, (0.0, 300.0), (200.0, 500.0), 4.0e6)], &grid(), 0.0, None)
            .unwrap_err();
        assert!(matches!(err, MhError::InvalidInput { .. }));
        let huge = lake(1 << 60, (0.0, 300.0), (200.0, 500.0), 4.0e6);
        assert!(prepare("lake", vec![huge], &grid(), 0.0, None).is_err());
    }

    #[test]
    fn test_cardinality_mismatch() {
        let wb = prepare("lake", vec![lake(1, (0.0, 300.0), (200.0, 500.0), 4.0e6)], &grid(), 0.0, None).unwrap();
        let good = wb.point_map(&grid(), &[1.0]);
        check_cardinality("wflow_lakelocs", &wb.locations, 1, &[("LakeArea", &good)]).unwrap();

        let empty = Raster::new(grid(), PARAM_NODATA);
        let err = check_cardinality("wflow_lakelocs", &wb.locations, 1, &[("LakeArea", &empty)]).unwrap_err();
        assert!(matches!(err, MhError::CardinalityMismatch { .. }));
        assert!(check_cardinality("wflow_lakelocs", &wb.locations, 2, &[]).is_err());
    }
}
