// crates/mh_terrain/src/rasterize.rs

//! 矢量栅格化
//!
//! 多边形按单元中心烧录，折线按半个单元的步长采样，点烧录到所在单元。
//! 后烧录的几何覆盖先烧录的。

use crate::raster::Raster;
use mh_foundation::error::{MhError, MhResult};
use mh_geo::{Feature, Geometry, GridSpec, Point2D, Polygon};

/// 将 (几何, 值) 序列烧录到新栅格
pub fn rasterize<'a>(
    shapes: impl IntoIterator<Item = (&'a Geometry, f64)>,
    grid: &GridSpec,
    nodata: f64,
) -> Raster {
    let mut raster = Raster::new(grid.clone(), nodata);
    for (geometry, value) in shapes {
        burn(&mut raster, geometry, value);
    }
    raster
}

/// 以要素整数标识作为单元值栅格化
///
/// 字符串标识、超出 f64 精确范围的标识以及等于无数据值的标识都无法烧录，
/// 返回无效输入错误。
pub fn rasterize_features(features: &[Feature], grid: &GridSpec, nodata: f64) -> MhResult<Raster> {
    let mut shapes = Vec::with_capacity(features.len());
    for f in features {
        let value = f.id.as_raster_value().ok_or_else(|| {
            MhError::invalid_input(format!(
                "feature id '{}' is not an integer within ±2^53 and cannot be burned",
                f.id
            ))
        })?;
        if value == nodata {
            return Err(MhError::invalid_input(format!(
                "feature id '{}' equals the nodata value of the burned raster",
                f.id
            )));
        }
        shapes.push((&f.geometry, value));
    }
    Ok(rasterize(shapes, grid, nodata))
}

/// 烧录单个几何
pub fn burn(raster: &mut Raster, geometry: &Geometry, value: f64) {
    let grid = raster.grid().clone();
    match geometry {
        Geometry::Point(p) => {
            if let Some((r, c)) = grid.cell_of(p) {
                raster.set(r, c, value);
            }
        }
        Geometry::LineString(line) => {
            for (r, c) in line_cells(&grid, line) {
                raster.set(r, c, value);
            }
        }
        Geometry::Polygon(poly) => {
            for (r, c) in polygon_cells(&grid, poly) {
                raster.set(r, c, value);
            }
        }
    }
}

/// 中心落在多边形内的单元
#[must_use]
pub fn polygon_cells(grid: &GridSpec, poly: &Polygon) -> Vec<(usize, usize)> {
    let Some(bbox) = poly.bbox() else {
        return Vec::new();
    };
    let (px0, py0) = grid.transform.geo_to_pixel(bbox.min_x, bbox.min_y);
    let (px1, py1) = grid.transform.geo_to_pixel(bbox.max_x, bbox.max_y);
    let clamp = |a: f64, b: f64, len: usize| {
        let lo = a.min(b).floor().max(0.0) as usize;
        let hi = (a.max(b).ceil().max(0.0) as usize).min(len);
        lo..hi
    };

    let mut cells = Vec::new();
    for r in clamp(py0, py1, grid.height) {
        for c in clamp(px0, px1, grid.width) {
            if poly.contains(&grid.cell_center(r, c)) {
                cells.push((r, c));
            }
        }
    }
    cells
}

/// 折线经过的单元（去重，保持顺序）
#[must_use]
pub fn line_cells(grid: &GridSpec, line: &[Point2D]) -> Vec<(usize, usize)> {
    let (rx, ry) = grid.resolution();
    let step = 0.5 * rx.min(ry);
    let mut cells: Vec<(usize, usize)> = Vec::new();
    let mut push = |p: &Point2D| {
        if let Some(cell) = grid.cell_of(p) {
            if cells.last() != Some(&cell) && !cells.contains(&cell) {
                cells.push(cell);
            }
        }
    };
    if let Some(first) = line.first() {
        push(first);
    }
    for seg in line.windows(2) {
        let (a, b) = (seg[0], seg[1]);
        let len = a.distance_to(&b);
        let n = if step > 0.0 { (len / step).ceil() as usize } else { 0 };
        for k in 1..=n.max(1) {
            let t = k as f64 / n.max(1) as f64;
            push(&Point2D::new(a.x + t * (b.x - a.x), a.y + t * (b.y - a.y)));
        }
    }
    cells
}
