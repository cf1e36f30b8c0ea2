// crates/mh_geo/src/geometry.rs

//! 几何类型
//!
//! 提供矢量要素使用的点、线、面以及包围盒。面积与距离均以坐标单位计，
//! 经纬度坐标下的大地测量距离见 [`Point2D::geodesic_distance_to`]。

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// 地球平均半径 (m)
pub const EARTH_MEAN_RADIUS: f64 = 6_371_008.8;

/// 角度转弧度
#[inline]
pub(crate) fn deg_to_rad(deg: f64) -> f64 {
    deg * PI / 180.0
}

// ============================================================================
// Point2D
// ============================================================================

/// 二维点
///
/// # 示例
///
/// ```
/// use mh_geo::geometry::Point2D;
///
/// let p1 = Point2D::new(500000.0, 4000000.0);
/// let p2 = Point2D::new(500100.0, 4000100.0);
/// assert!((p1.distance_to(&p2) - 141.421).abs() < 1e-3);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point2D {
    /// X坐标（或经度）
    pub x: f64,
    /// Y坐标（或纬度）
    pub y: f64,
}

impl Point2D {
    /// 创建新的2D点
    #[inline]
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// 欧几里得距离（投影坐标用）
    #[inline]
    #[must_use]
    pub fn distance_to(&self, other: &Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Haversine 大圆距离（米），假设 x = 经度, y = 纬度
    #[must_use]
    pub fn geodesic_distance_to(&self, other: &Self) -> f64 {
        let lat1 = deg_to_rad(self.y);
        let lat2 = deg_to_rad(other.y);
        let dlat = lat2 - lat1;
        let dlon = deg_to_rad(other.x - self.x);

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * EARTH_MEAN_RADIUS * a.sqrt().asin()
    }

    /// 坐标是否有限
    #[inline]
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<(f64, f64)> for Point2D {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

// ============================================================================
// BoundingBox
// ============================================================================

/// 轴对齐包围盒
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// 最小 x
    pub min_x: f64,
    /// 最小 y
    pub min_y: f64,
    /// 最大 x
    pub max_x: f64,
    /// 最大 y
    pub max_y: f64,
}

impl BoundingBox {
    /// 创建包围盒
    #[must_use]
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self { min_x, min_y, max_x, max_y }
    }

    /// 点集的包围盒，空集返回 None
    #[must_use]
    pub fn from_points(points: &[Point2D]) -> Option<Self> {
        let first = points.first()?;
        let mut bbox = Self::new(first.x, first.y, first.x, first.y);
        for p in &points[1..] {
            bbox.min_x = bbox.min_x.min(p.x);
            bbox.min_y = bbox.min_y.min(p.y);
            bbox.max_x = bbox.max_x.max(p.x);
            bbox.max_y = bbox.max_y.max(p.y);
        }
        Some(bbox)
    }

    /// 是否包含点（闭区间）
    #[inline]
    #[must_use]
    pub fn contains(&self, p: &Point2D) -> bool {
        p.x >= self.min_x && p.x <= self.max_x && p.y >= self.min_y && p.y <= self.max_y
    }
}

// ============================================================================
// Polygon
// ============================================================================

/// 多边形（外环 + 可选内环）
///
/// 环首尾不需要重复。
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    /// 外环
    pub exterior: Vec<Point2D>,
    /// 内环（洞）
    #[serde(default)]
    pub holes: Vec<Vec<Point2D>>,
}

impl Polygon {
    /// 从外环创建
    #[must_use]
    pub fn new(exterior: Vec<Point2D>) -> Self {
        Self { exterior, holes: Vec::new() }
    }

    /// 轴对齐矩形
    #[must_use]
    pub fn rectangle(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self::new(vec![
            Point2D::new(min_x, min_y),
            Point2D::new(max_x, min_y),
            Point2D::new(max_x, max_y),
            Point2D::new(min_x, max_y),
        ])
    }

    /// 添加内环
    #[must_use]
    pub fn with_hole(mut self, hole: Vec<Point2D>) -> Self {
        self.holes.push(hole);
        self
    }

    /// 包围盒
    #[must_use]
    pub fn bbox(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(&self.exterior)
    }

    /// 面积（坐标单位平方，外环减内环）
    #[must_use]
    pub fn area(&self) -> f64 {
        let holes: f64 = self.holes.iter().map(|h| ring_area(h).abs()).sum();
        (ring_area(&self.exterior).abs() - holes).max(0.0)
    }

    /// 面积质心
    #[must_use]
    pub fn centroid(&self) -> Option<Point2D> {
        let ring = &self.exterior;
        if ring.len() < 3 {
            return None;
        }
        let a = ring_area(ring);
        if a.abs() < f64::EPSILON {
            // 退化多边形，取顶点平均
            let n = ring.len() as f64;
            let (sx, sy) = ring.iter().fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
            return Some(Point2D::new(sx / n, sy / n));
        }
        let mut cx = 0.0;
        let mut cy = 0.0;
        for i in 0..ring.len() {
            let p = ring[i];
            let q = ring[(i + 1) % ring.len()];
            let cross = p.x * q.y - q.x * p.y;
            cx += (p.x + q.x) * cross;
            cy += (p.y + q.y) * cross;
        }
        Some(Point2D::new(cx / (6.0 * a), cy / (6.0 * a)))
    }

    /// 点是否在多边形内（射线法，洞内视为在外）
    #[must_use]
    pub fn contains(&self, p: &Point2D) -> bool {
        if let Some(bbox) = self.bbox() {
            if !bbox.contains(p) {
                return false;
            }
        }
        ring_contains(&self.exterior, p) && !self.holes.iter().any(|h| ring_contains(h, p))
    }
}

/// 环的有向面积（鞋带公式）
fn ring_area(ring: &[Point2D]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..ring.len() {
        let p = ring[i];
        let q = ring[(i + 1) % ring.len()];
        sum += p.x * q.y - q.x * p.y;
    }
    sum / 2.0
}

/// 射线法判断点是否在环内
fn ring_contains(ring: &[Point2D], p: &Point2D) -> bool {
    let mut inside = false;
    let n = ring.len();
    if n < 3 {
        return false;
    }
    let mut j = n - 1;
    for i in 0..n {
        let a = ring[i];
        let b = ring[j];
        if (a.y > p.y) != (b.y > p.y) {
            let x_cross = (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x;
            if p.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

// ============================================================================
// Geometry
// ============================================================================

/// 要素几何
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    /// 点
    Point(Point2D),
    /// 折线
    LineString(Vec<Point2D>),
    /// 多边形
    Polygon(Polygon),
}

impl Geometry {
    /// 包围盒
    #[must_use]
    pub fn bbox(&self) -> Option<BoundingBox> {
        match self {
            Geometry::Point(p) => BoundingBox::from_points(std::slice::from_ref(p)),
            Geometry::LineString(line) => BoundingBox::from_points(line),
            Geometry::Polygon(poly) => poly.bbox(),
        }
    }

    /// 代表点：点本身、折线中点顶点、多边形质心
    #[must_use]
    pub fn representative_point(&self) -> Option<Point2D> {
        match self {
            Geometry::Point(p) => Some(*p),
            Geometry::LineString(line) => line.get(line.len() / 2).copied(),
            Geometry::Polygon(poly) => poly.centroid(),
        }
    }

    /// 作为多边形访问
    #[must_use]
    pub fn as_polygon(&self) -> Option<&Polygon> {
        match self {
            Geometry::Polygon(poly) => Some(poly),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rectangle_area_and_centroid() {
        let poly = Polygon::rectangle(0.0, 0.0, 4.0, 2.0);
        assert!((poly.area() - 8.0).abs() < 1e-12);
        let c = poly.centroid().unwrap();
        assert!((c.x - 2.0).abs() < 1e-12);
        assert!((c.y - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_contains_with_hole() {
        let poly = Polygon::rectangle(0.0, 0.0, 10.0, 10.0).with_hole(vec![
            Point2D::new(4.0, 4.0),
            Point2D::new(6.0, 4.0),
            Point2D::new(6.0, 6.0),
            Point2D::new(4.0, 6.0),
        ]);
        assert!(poly.contains(&Point2D::new(1.0, 1.0)));
        assert!(!poly.contains(&Point2D::new(5.0, 5.0)));
        assert!(!poly.contains(&Point2D::new(11.0, 5.0)));
        assert!((poly.area() - 96.0).abs() < 1e-12);
    }

    #[test]
    fn test_geodesic_distance_one_degree_latitude() {
        let a = Point2D::new(12.0, 46.0);
        let b = Point2D::new(12.0, 47.0);
        let d = a.geodesic_distance_to(&b);
        assert!((d - 111_195.0).abs() < 100.0);
    }

    #[test]
    fn test_geometry_serde_tagged() {
        let geom = Geometry::Point(Point2D::new(1.0, 2.0));
        let json = serde_json::to_string(&geom).unwrap();
        assert!(json.contains("\"type\":\"Point\""));
        let back: Geometry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, geom);
    }
}
