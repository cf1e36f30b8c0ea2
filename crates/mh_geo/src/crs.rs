// crates/mh_geo/src/crs.rs

//! 坐标参考系统 (CRS) 定义和解析
//!
//! 支持 EPSG 代码、PROJ4 字符串和 WKT 格式。网格存储只比较 CRS 是否等价，
//! 不做坐标转换。
//!
//! # 示例
//!
//! ```
//! use mh_geo::crs::CrsDefinition;
//!
//! let wgs84 = CrsDefinition::parse("EPSG:4326");
//! assert_eq!(wgs84, CrsDefinition::Epsg(4326));
//! assert!(wgs84.is_geographic());
//!
//! let utm = CrsDefinition::utm_zone(32, true);
//! assert_eq!(utm.epsg_code(), Some(32632));
//! assert!(!utm.is_geographic());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// CRS 定义类型
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrsDefinition {
    /// EPSG 代码（如 4326 = WGS84）
    Epsg(u32),
    /// PROJ4 字符串
    Proj4(String),
    /// WKT 格式
    Wkt(String),
}

impl CrsDefinition {
    /// 解析任意定义字符串
    ///
    /// `EPSG:xxxx` 形式归一化为 [`CrsDefinition::Epsg`]，
    /// 以 `+proj` 开头的视为 PROJ4，其余视为 WKT。
    #[must_use]
    pub fn parse(def: &str) -> Self {
        let trimmed = def.trim();
        if let Some(suffix) = trimmed
            .strip_prefix("EPSG:")
            .or_else(|| trimmed.strip_prefix("epsg:"))
        {
            if let Ok(code) = suffix.trim().parse() {
                return CrsDefinition::Epsg(code);
            }
        }
        if trimmed.starts_with("+proj") {
            CrsDefinition::Proj4(trimmed.to_string())
        } else {
            CrsDefinition::Wkt(trimmed.to_string())
        }
    }

    /// 转换为 PROJ 兼容的字符串
    #[must_use]
    pub fn to_proj_string(&self) -> String {
        match self {
            CrsDefinition::Epsg(code) => format!("EPSG:{code}"),
            CrsDefinition::Proj4(s) | CrsDefinition::Wkt(s) => s.clone(),
        }
    }

    /// WGS84 地理坐标系
    #[must_use]
    pub fn wgs84() -> Self {
        CrsDefinition::Epsg(4326)
    }

    /// UTM 区域投影
    ///
    /// # Arguments
    /// - `zone`: 1-60
    /// - `north`: true = 北半球, false = 南半球
    #[must_use]
    pub fn utm_zone(zone: u8, north: bool) -> Self {
        let code = if north {
            32600 + u32::from(zone)
        } else {
            32700 + u32::from(zone)
        };
        CrsDefinition::Epsg(code)
    }

    /// 获取 EPSG 代码（如果有）
    #[must_use]
    pub fn epsg_code(&self) -> Option<u32> {
        match self {
            CrsDefinition::Epsg(code) => Some(*code),
            CrsDefinition::Proj4(s) | CrsDefinition::Wkt(s) => Self::parse_epsg(s),
        }
    }

    /// 是否为地理坐标系（单位为度）
    #[must_use]
    pub fn is_geographic(&self) -> bool {
        if let Some(code) = self.epsg_code() {
            if matches!(code, 4326 | 4269 | 4267 | 4490 | 4258) {
                return true;
            }
            if matches!(code, 32601..=32660 | 32701..=32760 | 3857 | 3035) {
                return false;
            }
        }
        let lower = self.to_proj_string().to_lowercase();
        lower.contains("geogcs")
            || lower.contains("geogcrs")
            || lower.contains("longlat")
            || lower.contains("latlong")
    }

    /// 两个定义是否指向同一坐标系
    ///
    /// 两边都能解析出 EPSG 代码时比较代码，否则比较原始字符串。
    #[must_use]
    pub fn equivalent(&self, other: &Self) -> bool {
        match (self.epsg_code(), other.epsg_code()) {
            (Some(a), Some(b)) => a == b,
            _ => self == other,
        }
    }

    /// 从字符串解析 EPSG 代码
    fn parse_epsg(s: &str) -> Option<u32> {
        if let Some(suffix) = s.strip_prefix("EPSG:") {
            return suffix.trim().parse().ok();
        }
        // WKT1: AUTHORITY["EPSG","xxxx"]
        if let Some(pos) = s.rfind("AUTHORITY[\"EPSG\",\"") {
            let start = pos + 18;
            if let Some(end) = s[start..].find("\"]") {
                return s[start..start + end].parse().ok();
            }
        }
        // WKT2: ID["EPSG",xxxx]
        if let Some(pos) = s.rfind("ID[\"EPSG\",") {
            let start = pos + 10;
            if let Some(end) = s[start..].find(']') {
                return s[start..start + end].trim().parse().ok();
            }
        }
        None
    }
}

impl Default for CrsDefinition {
    fn default() -> Self {
        Self::wgs84()
    }
}

impl fmt::Display for CrsDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrsDefinition::Epsg(code) => write!(f, "EPSG:{code}"),
            CrsDefinition::Proj4(s) => write!(f, "{s}"),
            CrsDefinition::Wkt(s) => {
                // WKT 太长，只显示开头
                let head: String = s.chars().take(32).collect();
                write!(f, "WKT({head}...)")
            }
        }
    }
}
