// crates/mh_geo/src/grid.rs

//! 规则网格空间参考
//!
//! `GridSpec` 描述模型网格：坐标系、仿射变换（原点 + 分辨率）和行列数。
//! 同一个静态图存储中的所有字段必须共享完全相同的 `GridSpec`。
//!
//! 单元按行优先存储，`index = row * width + col`，第 0 行位于 `origin_y`
//! 一侧（北向上网格 `res_y < 0`）。

use crate::crs::CrsDefinition;
use crate::geometry::{deg_to_rad, BoundingBox, Point2D, EARTH_MEAN_RADIUS};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 仿射变换（无旋转）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    /// 左上角 x 坐标
    pub origin_x: f64,
    /// 左上角 y 坐标
    pub origin_y: f64,
    /// x 方向分辨率
    pub res_x: f64,
    /// y 方向分辨率（北向上网格为负）
    pub res_y: f64,
}

impl GeoTransform {
    /// 创建仿射变换
    #[must_use]
    pub fn new(origin_x: f64, origin_y: f64, res_x: f64, res_y: f64) -> Self {
        Self { origin_x, origin_y, res_x, res_y }
    }

    /// 地理坐标转连续像素坐标 (col, row)
    #[inline]
    #[must_use]
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        ((x - self.origin_x) / self.res_x, (y - self.origin_y) / self.res_y)
    }

    /// 连续像素坐标 (col, row) 转地理坐标
    #[inline]
    #[must_use]
    pub fn pixel_to_geo(&self, col: f64, row: f64) -> (f64, f64) {
        (self.origin_x + col * self.res_x, self.origin_y + row * self.res_y)
    }
}

/// 模型网格空间参考
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridSpec {
    /// 坐标参考系统
    pub crs: CrsDefinition,
    /// 仿射变换
    pub transform: GeoTransform,
    /// 列数
    pub width: usize,
    /// 行数
    pub height: usize,
}

impl GridSpec {
    /// 创建网格
    #[must_use]
    pub fn new(
        crs: CrsDefinition,
        origin_x: f64,
        origin_y: f64,
        res_x: f64,
        res_y: f64,
        width: usize,
        height: usize,
    ) -> Self {
        Self {
            crs,
            transform: GeoTransform::new(origin_x, origin_y, res_x, res_y),
            width,
            height,
        }
    }

    /// 单元总数
    #[inline]
    #[must_use]
    pub fn n_cells(&self) -> usize {
        self.width * self.height
    }

    /// 分辨率 (|res_x|, |res_y|)
    #[must_use]
    pub fn resolution(&self) -> (f64, f64) {
        (self.transform.res_x.abs(), self.transform.res_y.abs())
    }

    /// 是否为地理坐标系网格
    #[must_use]
    pub fn is_geographic(&self) -> bool {
        self.crs.is_geographic()
    }

    /// 行列转线性索引
    #[inline]
    #[must_use]
    pub fn index(&self, row: usize, col: usize) -> usize {
        row * self.width + col
    }

    /// 线性索引转行列
    #[inline]
    #[must_use]
    pub fn row_col(&self, index: usize) -> (usize, usize) {
        (index / self.width, index % self.width)
    }

    /// 单元中心坐标
    #[must_use]
    pub fn cell_center(&self, row: usize, col: usize) -> Point2D {
        let (x, y) = self.transform.pixel_to_geo(col as f64 + 0.5, row as f64 + 0.5);
        Point2D::new(x, y)
    }

    /// 点所在单元，网格外返回 None
    #[must_use]
    pub fn cell_of(&self, p: &Point2D) -> Option<(usize, usize)> {
        let (px, py) = self.transform.geo_to_pixel(p.x, p.y);
        if !px.is_finite() || !py.is_finite() || px < 0.0 || py < 0.0 {
            return None;
        }
        let (col, row) = (px.floor() as usize, py.floor() as usize);
        (col < self.width && row < self.height).then_some((row, col))
    }

    /// 网格范围
    #[must_use]
    pub fn bounds(&self) -> BoundingBox {
        let (x0, y0) = self.transform.pixel_to_geo(0.0, 0.0);
        let (x1, y1) = self.transform.pixel_to_geo(self.width as f64, self.height as f64);
        BoundingBox::new(x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1))
    }

    /// 指定行单元面积 (m²)
    ///
    /// 地理坐标系使用球面带状面积公式，投影坐标系直接取 |res_x * res_y|。
    #[must_use]
    pub fn cell_area(&self, row: usize) -> f64 {
        if self.is_geographic() {
            let (_, lat_top) = self.transform.pixel_to_geo(0.0, row as f64);
            let (_, lat_bot) = self.transform.pixel_to_geo(0.0, row as f64 + 1.0);
            let dlon = deg_to_rad(self.transform.res_x.abs());
            EARTH_MEAN_RADIUS.powi(2)
                * dlon
                * (deg_to_rad(lat_top).sin() - deg_to_rad(lat_bot).sin()).abs()
        } else {
            (self.transform.res_x * self.transform.res_y).abs()
        }
    }

    /// 指定行单元的 (x 向长度, y 向长度)，单位 m
    #[must_use]
    pub fn cell_lengths(&self, row: usize) -> (f64, f64) {
        if self.is_geographic() {
            let c = self.cell_center(row, 0);
            let dx = c.geodesic_distance_to(&Point2D::new(c.x + self.transform.res_x.abs(), c.y));
            let dy = c.geodesic_distance_to(&Point2D::new(c.x, c.y + self.transform.res_y.abs()));
            (dx, dy)
        } else {
            self.resolution()
        }
    }

    /// 两个单元中心之间的距离 (m)
    #[must_use]
    pub fn cell_distance(&self, a: usize, b: usize) -> f64 {
        let (ra, ca) = self.row_col(a);
        let (rb, cb) = self.row_col(b);
        let pa = self.cell_center(ra, ca);
        let pb = self.cell_center(rb, cb);
        if self.is_geographic() {
            pa.geodesic_distance_to(&pb)
        } else {
            pa.distance_to(&pb)
        }
    }

    /// 是否与另一网格处于同一坐标系
    #[must_use]
    pub fn same_crs(&self, other: &Self) -> bool {
        self.crs.equivalent(&other.crs)
    }
}

/// 空间参考相等：坐标系等价，变换与行列数完全一致
impl PartialEq for GridSpec {
    fn eq(&self, other: &Self) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.transform == other.transform
            && self.same_crs(other)
    }
}

impl fmt::Display for GridSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}x{} origin=({}, {}) res=({}, {})",
            self.crs,
            self.height,
            self.width,
            self.transform.origin_x,
            self.transform.origin_y,
            self.transform.res_x,
            self.transform.res_y
        )
    }
}
