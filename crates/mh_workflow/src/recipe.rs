// crates/mh_workflow/src/recipe.rs

//! 构建配方
//!
//! 有序的装配步骤列表，可从 TOML 或 JSON 读取：
//!
//! ```toml
//! [[steps]]
//! method = "setup_basemaps"
//! hydrography_fn = "merit_hydro"
//!
//! [[steps]]
//! method = "setup_rivers"
//! river_upa = 30.0
//! ```

use crate::setup::{
    SetupBasemaps, SetupFloodplains, SetupLakes, SetupMethod, SetupReservoirs, SetupRivers,
    StaticMapsFromRaster,
};
use mh_foundation::error::{MhError, MhResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 一个装配步骤及其参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum SetupStep {
    /// 流域基础图
    SetupBasemaps(SetupBasemaps),
    /// 通用栅格导入
    SetupStaticmapsFromRaster(StaticMapsFromRaster),
    /// 河道
    SetupRivers(SetupRivers),
    /// 洪泛区
    SetupFloodplains(SetupFloodplains),
    /// 湖泊
    SetupLakes(SetupLakes),
    /// 水库
    SetupReservoirs(SetupReservoirs),
}

impl SetupStep {
    /// 作为装配流程
    #[must_use]
    pub fn as_method(&self) -> &dyn SetupMethod {
        match self {
            SetupStep::SetupBasemaps(m) => m,
            SetupStep::SetupStaticmapsFromRaster(m) => m,
            SetupStep::SetupRivers(m) => m,
            SetupStep::SetupFloodplains(m) => m,
            SetupStep::SetupLakes(m) => m,
            SetupStep::SetupReservoirs(m) => m,
        }
    }
}

/// 构建配方
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildRecipe {
    /// 按顺序执行的步骤
    #[serde(default)]
    pub steps: Vec<SetupStep>,
}

impl BuildRecipe {
    /// 从 TOML 文本解析
    pub fn from_toml_str(text: &str) -> MhResult<Self> {
        toml::from_str(text).map_err(|e| MhError::serialization(format!("recipe TOML: {e}")))
    }

    /// 从 JSON 文本解析
    pub fn from_json_str(text: &str) -> MhResult<Self> {
        serde_json::from_str(text).map_err(|e| MhError::serialization(format!("recipe JSON: {e}")))
    }

    /// 按扩展名读取 `.toml` 或 `.json` 配方文件
    pub fn read(path: impl AsRef<Path>) -> MhResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(MhError::file_not_found(path));
        }
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&text),
            Some("json") => Self::from_json_str(&text),
            _ => Err(MhError::invalid_input(format!(
                "unsupported recipe format: {}",
                path.display()
            ))),
        }
    }

    /// 校验全部步骤的参数
    pub fn validate(&self) -> MhResult<()> {
        for step in &self.steps {
            let method = step.as_method();
            method.validate().map_err(|e| {
                tracing::error!(step = method.name(), error = %e, "invalid recipe step");
                e
            })?;
        }
        Ok(())
    }

    /// 步骤名序列
    pub fn step_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.steps.iter().map(|s| s.as_method().name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::{FloodplainType, RiverRouting};
    use std::io::Write;

    const RECIPE: &str = r#"
[[steps]]
method = "setup_basemaps"

[[steps]]
method = "setup_rivers"
river_upa = 0.12
river_routing = "local-inertial"

[[steps]]
method = "setup_floodplains"
floodplain_type = "1d"
river_upa = 0.12

[[steps]]
method = "setup_staticmaps_from_raster"
raster_fn = "globcover"
reproject_method = "mode"
"#;

    #[test]
    fn test_toml_recipe_order_and_defaults() {
        let recipe = BuildRecipe::from_toml_str(RECIPE).unwrap();
        assert_eq!(
            recipe.step_names().collect::<Vec<_>>(),
            ["setup_basemaps", "setup_rivers", "setup_floodplains", "setup_staticmaps_from_raster"]
        );
        match &recipe.steps[1] {
            SetupStep::SetupRivers(r) => {
                assert_eq!(r.river_routing, RiverRouting::LocalInertial);
                assert_eq!(r.min_rivwth, 30.0);
            }
            other => panic!("unexpected step {other:?}"),
        }
        match &recipe.steps[2] {
            SetupStep::SetupFloodplains(f) => assert_eq!(f.floodplain_type, FloodplainType::OneD),
            other => panic!("unexpected step {other:?}"),
        }
        recipe.validate().unwrap();
    }

    #[test]
    fn test_json_recipe() {
        let recipe = BuildRecipe::from_json_str(
            r#"{"steps": [{"method": "setup_lakes", "lakes_fn": "hydro_lakes", "min_area": 5.0}]}"#,
        )
        .unwrap();
        assert_eq!(recipe.steps, vec![SetupStep::SetupLakes(SetupLakes::default().with_min_area(5.0))]);
    }

    #[test]
    fn test_unknown_method_rejected() {
        let err = BuildRecipe::from_toml_str("[[steps]]\nmethod = \"setup_glaciers\"\n").unwrap_err();
        assert!(matches!(err, MhError::Serialization { .. }));
    }

    #[test]
    fn test_validate_reports_bad_step() {
        let recipe = BuildRecipe::from_toml_str("[[steps]]\nmethod = \"setup_lakes\"\nmin_area = -1.0\n").unwrap();
        assert!(recipe.validate().is_err());
    }

    #[test]
    fn test_read_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("build.toml");
        std::fs::File::create(&path).unwrap().write_all(RECIPE.as_bytes()).unwrap();
        assert_eq!(BuildRecipe::read(&path).unwrap().steps.len(), 4);

        let other = dir.path().join("build.yml");
        std::fs::write(&other, "steps: []").unwrap();
        assert!(BuildRecipe::read(&other).is_err());
        assert!(matches!(
            BuildRecipe::read(dir.path().join("absent.toml")).unwrap_err(),
            MhError::FileNotFound { .. }
        ));
    }
}
