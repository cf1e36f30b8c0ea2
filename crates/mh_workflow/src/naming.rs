// crates/mh_workflow/src/naming.rs

//! 名称翻译
//!
//! 三套命名之间的转换：
//!
//! - 内部语义名（`elevtn`、`rivlen`）：数据目录和工作流使用
//! - 显示名（`wflow_dem`、`wflow_riverlength`）：静态图字段名
//! - 配置路径（`input.lateral.river.length`）：模型运行配置中引用字段的位置
//!
//! 映射表是编译期常量数据，首次使用时建立索引，之后只读。
//! 每种模型模式一张配置路径表，值为 `None` 的是结构性字段（不被任何配置引用）。
//!
//! # 示例
//!
//! ```
//! use mh_workflow::naming::{ModelMode, NameTranslator};
//!
//! let names = NameTranslator::new(ModelMode::Standard);
//! assert_eq!(names.to_display_name("rivlen").unwrap(), "wflow_riverlength");
//! assert_eq!(
//!     names.to_config_path("rivlen").unwrap(),
//!     Some("input.lateral.river.length")
//! );
//! assert_eq!(names.to_config_path("landuse").unwrap(), None);
//! assert!(names.to_config_path("no_such_key").is_err());
//! ```

use mh_foundation::error::{MhError, MhResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

// ============================================================================
// 映射数据
// ============================================================================

/// 内部名 → 显示名
const INTERNAL_NAMES: &[(&str, &str)] = &[
    ("flwdir", "wflow_ldd"),
    ("elevtn", "wflow_dem"),
    ("subelv", "dem_subgrid"),
    ("uparea", "wflow_uparea"),
    ("strord", "wflow_streamorder"),
    ("basins", "wflow_subcatch"),
    ("rivlen", "wflow_riverlength"),
    ("rivmsk", "wflow_river"),
    ("rivwth", "wflow_riverwidth"),
    ("lndslp", "Slope"),
    ("rivslp", "RiverSlope"),
    ("rivdph", "RiverDepth"),
    ("rivman", "N_River"),
    ("gauges", "wflow_gauges"),
    ("landuse", "wflow_landuse"),
    ("soil", "wflow_soil"),
    ("resareas", "wflow_reservoirareas"),
    ("reslocs", "wflow_reservoirlocs"),
    ("lakeareas", "wflow_lakeareas"),
    ("lakelocs", "wflow_lakelocs"),
    ("glacareas", "wflow_glacierareas"),
    ("glacfracs", "wflow_glacierfrac"),
    ("glacstore", "wflow_glacierstore"),
    ("dom_gross", "domestic_gross"),
    ("dom_net", "domestic_net"),
    ("ind_gross", "industry_gross"),
    ("ind_net", "industry_net"),
    ("lsk_gross", "livestock_gross"),
    ("lsk_net", "livestock_net"),
];

/// 标准模式：显示名 → 配置路径
const SBM_CONFIG_PATHS: &[(&str, Option<&str>)] = &[
    // 土地利用参数
    ("landuse", None),
    ("Kext", Some("input.vertical.kext")),
    ("N", Some("input.lateral.land.n")),
    ("PathFrac", Some("input.vertical.pathfrac")),
    ("RootingDepth", Some("input.vertical.rootingdepth")),
    ("Sl", Some("input.vertical.specific_leaf")),
    ("Swood", Some("input.vertical.storage_wood")),
    ("WaterFrac", Some("input.vertical.waterfrac")),
    ("kc", Some("input.vertical.kc")),
    ("alpha_h1", Some("input.vertical.alpha_h1")),
    ("h1", Some("input.vertical.h1")),
    ("h2", Some("input.vertical.h2")),
    ("h3_high", Some("input.vertical.h3_high")),
    ("h3_low", Some("input.vertical.h3_low")),
    ("h4", Some("input.vertical.h4")),
    // 地形与流域
    ("wflow_ldd", Some("input.ldd")),
    ("wflow_dem", Some("input.vertical.altitude")),
    ("dem_subgrid", None),
    ("wflow_uparea", None),
    ("wflow_streamorder", None),
    ("wflow_subcatch", Some("input.subcatchment")),
    ("wflow_gauges", None),
    ("wflow_landuse", None),
    ("wflow_soil", None),
    ("Slope", Some("input.lateral.land.slope")),
    // 河道
    ("wflow_river", Some("input.river_location")),
    ("wflow_riverlength", Some("input.lateral.river.length")),
    ("wflow_riverwidth", Some("input.lateral.river.width")),
    ("RiverSlope", Some("input.lateral.river.slope")),
    ("RiverDepth", Some("input.lateral.river.bankfull_depth")),
    ("N_River", Some("input.lateral.river.n")),
    ("hydrodem_avg", None),
    ("hydrodem_subgrid", None),
    ("floodplain_volume", Some("input.lateral.river.floodplain.volume")),
    ("floodplain_n", Some("input.lateral.river.floodplain.n")),
    // 湖泊
    ("wflow_lakeareas", Some("input.lateral.river.lake.areas")),
    ("wflow_lakelocs", Some("input.lateral.river.lake.locs")),
    ("LakeArea", Some("input.lateral.river.lake.area")),
    ("LakeAvgLevel", Some("input.lateral.river.lake.waterlevel")),
    ("LakeAvgOut", None),
    ("LakeThreshold", Some("input.lateral.river.lake.threshold")),
    ("Lake_b", Some("input.lateral.river.lake.b")),
    ("Lake_e", Some("input.lateral.river.lake.e")),
    ("LakeStorFunc", Some("input.lateral.river.lake.storfunc")),
    ("LakeOutflowFunc", Some("input.lateral.river.lake.outflowfunc")),
    ("LinkedLakeLocs", Some("input.lateral.river.lake.linkedlakelocs")),
    // 水库
    ("wflow_reservoirareas", Some("input.lateral.river.reservoir.areas")),
    ("wflow_reservoirlocs", Some("input.lateral.river.reservoir.locs")),
    ("ResSimpleArea", Some("input.lateral.river.reservoir.area")),
    ("ResDemand", Some("input.lateral.river.reservoir.demand")),
    ("ResMaxRelease", Some("input.lateral.river.reservoir.maxrelease")),
    ("ResMaxVolume", Some("input.lateral.river.reservoir.maxvolume")),
    ("ResTargetFullFrac", Some("input.lateral.river.reservoir.targetfullfrac")),
    ("ResTargetMinFrac", Some("input.lateral.river.reservoir.targetminfrac")),
    // 冰川
    ("wflow_glacierareas", Some("input.vertical.glacierareas")),
    ("wflow_glacierfrac", Some("input.vertical.glacierfrac")),
    ("wflow_glacierstore", Some("input.vertical.glacierstore")),
    // 用水需求
    ("domestic_gross", Some("input.vertical.domestic.demand_gross")),
    ("domestic_net", Some("input.vertical.domestic.demand_net")),
    ("industry_gross", Some("input.vertical.industry.demand_gross")),
    ("industry_net", Some("input.vertical.industry.demand_net")),
    ("livestock_gross", Some("input.vertical.livestock.demand_gross")),
    ("livestock_net", Some("input.vertical.livestock.demand_net")),
];

/// 泥沙模式：显示名 → 配置路径
const SEDIMENT_CONFIG_PATHS: &[(&str, Option<&str>)] = &[
    // 土地利用参数
    ("landuse", None),
    ("Kext", Some("input.vertical.kext")),
    ("PathFrac", Some("input.vertical.pathfrac")),
    ("Sl", Some("input.vertical.specific_leaf")),
    ("Swood", Some("input.vertical.storage_wood")),
    ("USLE_C", Some("input.vertical.usleC")),
    // 地形与流域
    ("wflow_ldd", Some("input.ldd")),
    ("wflow_dem", Some("input.vertical.altitude")),
    ("dem_subgrid", None),
    ("wflow_uparea", None),
    ("wflow_streamorder", None),
    ("wflow_subcatch", Some("input.subcatchment")),
    ("wflow_gauges", None),
    ("wflow_landuse", None),
    ("wflow_soil", None),
    ("Slope", Some("input.lateral.land.slope")),
    // 河道
    ("wflow_river", Some("input.river_location")),
    ("wflow_riverlength", Some("input.lateral.river.length")),
    ("wflow_riverwidth", Some("input.lateral.river.width")),
    ("RiverSlope", Some("input.lateral.river.slope")),
    ("RiverDepth", None),
    ("N_River", None),
    ("hydrodem_avg", None),
    ("hydrodem_subgrid", None),
    // 湖泊
    ("wflow_lakeareas", Some("input.vertical.lakeareas")),
    ("wflow_lakelocs", Some("input.lateral.river.lakelocs")),
    ("LakeArea", Some("input.lateral.river.lakearea")),
    ("LakeAvgLevel", None),
    ("LakeAvgOut", None),
    ("LakeThreshold", None),
    ("Lake_b", None),
    ("Lake_e", None),
    ("LakeStorFunc", None),
    ("LakeOutflowFunc", None),
    ("LinkedLakeLocs", None),
    // 水库
    ("wflow_reservoirareas", Some("input.vertical.resareas")),
    ("wflow_reservoirlocs", Some("input.lateral.river.reslocs")),
    ("ResSimpleArea", Some("input.lateral.river.resarea")),
    ("ResDemand", None),
    ("ResMaxRelease", None),
    ("ResMaxVolume", None),
    ("ResTargetFullFrac", None),
    ("ResTargetMinFrac", None),
];

struct Tables {
    to_display: HashMap<&'static str, &'static str>,
    from_display: HashMap<&'static str, &'static str>,
}

static NAME_TABLES: LazyLock<Tables> = LazyLock::new(|| Tables {
    to_display: INTERNAL_NAMES.iter().copied().collect(),
    from_display: INTERNAL_NAMES.iter().map(|&(k, v)| (v, k)).collect(),
});

static SBM_PATHS: LazyLock<HashMap<&'static str, Option<&'static str>>> =
    LazyLock::new(|| SBM_CONFIG_PATHS.iter().copied().collect());

static SEDIMENT_PATHS: LazyLock<HashMap<&'static str, Option<&'static str>>> =
    LazyLock::new(|| SEDIMENT_CONFIG_PATHS.iter().copied().collect());

// ============================================================================
// 翻译器
// ============================================================================

/// 模型模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelMode {
    /// 标准水文模型 (wflow_sbm)
    #[default]
    Standard,
    /// 泥沙模型 (wflow_sediment)
    Sediment,
}

impl ModelMode {
    /// 配置文件默认名
    #[must_use]
    pub fn config_file_name(&self) -> &'static str {
        match self {
            ModelMode::Standard => "wflow_sbm.toml",
            ModelMode::Sediment => "wflow_sediment.toml",
        }
    }

    fn vocabulary(&self) -> &'static str {
        match self {
            ModelMode::Standard => "wflow_sbm config",
            ModelMode::Sediment => "wflow_sediment config",
        }
    }
}

impl fmt::Display for ModelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelMode::Standard => f.write_str("standard"),
            ModelMode::Sediment => f.write_str("sediment"),
        }
    }
}

/// 名称翻译器
///
/// 不持有任何存储，只查表。每个模型会话按模式创建一个实例并显式传递。
#[derive(Debug, Clone, Copy)]
pub struct NameTranslator {
    mode: ModelMode,
    config_paths: &'static LazyLock<HashMap<&'static str, Option<&'static str>>>,
}

impl NameTranslator {
    /// 按模式创建
    #[must_use]
    pub fn new(mode: ModelMode) -> Self {
        let config_paths = match mode {
            ModelMode::Standard => &SBM_PATHS,
            ModelMode::Sediment => &SEDIMENT_PATHS,
        };
        Self { mode, config_paths }
    }

    /// 当前模式
    #[must_use]
    pub fn mode(&self) -> ModelMode {
        self.mode
    }

    /// 内部名 → 显示名
    pub fn to_display_name(&self, internal_key: &str) -> MhResult<&'static str> {
        NAME_TABLES
            .to_display
            .get(internal_key)
            .copied()
            .ok_or_else(|| MhError::unknown_key(internal_key, "internal name"))
    }

    /// 显示名 → 内部名
    pub fn from_display_name(&self, display_name: &str) -> MhResult<&'static str> {
        NAME_TABLES
            .from_display
            .get(display_name)
            .copied()
            .ok_or_else(|| MhError::unknown_key(display_name, "display name"))
    }

    /// 显示名或内部名 → 配置路径
    ///
    /// 先把键当作当前模式的显示名查找，找不到再当作内部名转为显示名后查找。
    /// 结构性字段返回 `Ok(None)`，两套词汇都不认识的键返回 `UnknownKey`。
    pub fn to_config_path(&self, key: &str) -> MhResult<Option<&'static str>> {
        if let Some(path) = self.config_paths.get(key) {
            return Ok(*path);
        }
        NAME_TABLES
            .to_display
            .get(key)
            .and_then(|display| self.config_paths.get(display))
            .copied()
            .ok_or_else(|| MhError::unknown_key(key, self.mode.vocabulary()))
    }

    /// 所有内部名
    pub fn internal_keys() -> impl Iterator<Item = &'static str> {
        INTERNAL_NAMES.iter().map(|&(k, _)| k)
    }

    /// 当前模式下所有显示名（配置词汇）
    pub fn display_names(&self) -> impl Iterator<Item = &'static str> {
        let table = match self.mode {
            ModelMode::Standard => SBM_CONFIG_PATHS,
            ModelMode::Sediment => SEDIMENT_CONFIG_PATHS,
        };
        table.iter().map(|&(k, _)| k)
    }
}

impl Default for NameTranslator {
    fn default() -> Self {
        Self::new(ModelMode::Standard)
    }
}
