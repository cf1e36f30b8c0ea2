// crates/mh_geo/src/feature.rs

//! 矢量要素
//!
//! 湖泊、水库、河道几何等矢量数据以 `Feature` 表示：标识 + 几何 + 数值属性。
//! 要素标识既会被烧录进栅格（只接受整数标识），也用于匹配表和率定曲线。

use crate::geometry::Geometry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// f64 可精确表示的最大整数标识
pub const MAX_EXACT_ID: u64 = 1 << 53;

/// 要素标识
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureId {
    /// 整数标识（可烧录进栅格）
    Int(i64),
    /// 字符串标识
    Text(String),
}

impl FeatureId {
    /// 作为栅格单元值
    ///
    /// 字符串标识和绝对值超过 2^53（f64 无法精确表示）的整数无法烧录，返回 None。
    #[must_use]
    pub fn as_raster_value(&self) -> Option<f64> {
        match self {
            FeatureId::Int(v) if v.unsigned_abs() <= MAX_EXACT_ID => Some(*v as f64),
            _ => None,
        }
    }

    /// 从栅格单元值还原
    ///
    /// 非有限值或非整数返回 None。
    #[must_use]
    pub fn from_raster_value(value: f64) -> Option<Self> {
        if value.is_finite() && value.fract() == 0.0 {
            Some(FeatureId::Int(value as i64))
        } else {
            None
        }
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureId::Int(v) => write!(f, "{v}"),
            FeatureId::Text(s) => write!(f, "{s}"),
        }
    }
}

impl FromStr for FeatureId {
    type Err = std::convert::Infallible;

    /// 整数的规范写法视为整数标识，`"007"`、`"+7"` 保留为字符串
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Ok(match s.parse::<i64>() {
            Ok(v) if v.to_string() == s => FeatureId::Int(v),
            _ => FeatureId::Text(s.to_string()),
        })
    }
}

impl From<i64> for FeatureId {
    fn from(v: i64) -> Self {
        FeatureId::Int(v)
    }
}

impl From<&str> for FeatureId {
    fn from(s: &str) -> Self {
        FeatureId::Text(s.to_string())
    }
}

/// 矢量要素
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    /// 要素标识
    pub id: FeatureId,
    /// 几何
    pub geometry: Geometry,
    /// 数值属性
    #[serde(default)]
    pub properties: BTreeMap<String, f64>,
}

impl Feature {
    /// 创建无属性要素
    #[must_use]
    pub fn new(id: impl Into<FeatureId>, geometry: Geometry) -> Self {
        Self {
            id: id.into(),
            geometry,
            properties: BTreeMap::new(),
        }
    }

    /// 设置属性
    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, value: f64) -> Self {
        self.properties.insert(name.into(), value);
        self
    }

    /// 读取有限属性值，缺失或 NaN 返回 None
    #[must_use]
    pub fn property(&self, name: &str) -> Option<f64> {
        self.properties.get(name).copied().filter(|v| v.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point2D;

    #[test]
    fn test_feature_id_parse_and_display() {
        assert_eq!("169".parse::<FeatureId>().unwrap(), FeatureId::Int(169));
        assert_eq!("lake-a".parse::<FeatureId>().unwrap(), FeatureId::Text("lake-a".into()));
        assert_eq!(FeatureId::Int(7).to_string(), "7");
        assert_eq!("-12".parse::<FeatureId>().unwrap(), FeatureId::Int(-12));
        assert_eq!("007".parse::<FeatureId>().unwrap(), FeatureId::Text("007".into()));
        assert_eq!("+7".parse::<FeatureId>().unwrap(), FeatureId::Text("+7".into()));
    }

    #[test]
    fn test_raster_value_roundtrip() {
        let id = FeatureId::Int(3349);
        let v = id.as_raster_value().unwrap();
        assert_eq!(FeatureId::from_raster_value(v), Some(id));
        assert_eq!(FeatureId::from_raster_value(f64::NAN), None);
        assert_eq!(FeatureId::Text("x".into()).as_raster_value(), None);
        assert_eq!(FeatureId::Int(1 << 53).as_raster_value(), Some(9007199254740992.0));
        assert_eq!(FeatureId::Int((1 << 53) + 1).as_raster_value(), None);
        assert_eq!(FeatureId::Int(i64::MIN).as_raster_value(), None);
    }

    #[test]
    fn test_property_filters_nan() {
        let f = Feature::new(1, Geometry::Point(Point2D::new(0.0, 0.0)))
            .with_property("Dis_avg", 3.5)
            .with_property("Depth_avg", f64::NAN);
        assert_eq!(f.property("Dis_avg"), Some(3.5));
        assert_eq!(f.property("Depth_avg"), None);
        assert_eq!(f.property("missing"), None);
    }
}
