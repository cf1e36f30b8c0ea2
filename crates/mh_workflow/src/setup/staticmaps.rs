// crates/mh_workflow/src/setup/staticmaps.rs

//! 通用栅格导入
//!
//! 将任意命名栅格数据源重采样到模型网格，按变量登记为静态图，
//! 可同时把配置路径指向登记的字段名。
//!
//! 参数组合：
//!
//! - `variables` 与 `wflow_variables` 都给出时长度必须一致；
//! - 多变量数据源只给 `wflow_variables` 不给 `variables` 直接报错，不猜测变量名；
//! - 单变量数据源字段名取 `name`（或 `variables` 唯一元素、数据源标识）；
//! - 两者都不给时导入全部变量，不写配置。

use super::SetupMethod;
use crate::catalog::{DataCatalog, RasterSource};
use crate::model::{StagedUpdate, WflowModel};
use mh_foundation::error::{MhError, MhResult};
use mh_terrain::{FillMethod, Raster, ResampleMethod};
use serde::{Deserialize, Serialize};

fn default_reproject_method() -> ResampleMethod {
    ResampleMethod::Nearest
}

/// 通用栅格导入参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticMapsFromRaster {
    /// 数据源标识
    pub raster_fn: String,
    /// 重采样方法
    #[serde(default = "default_reproject_method")]
    pub reproject_method: ResampleMethod,
    /// 要导入的变量
    #[serde(default)]
    pub variables: Option<Vec<String>>,
    /// 与变量一一对应的配置路径
    #[serde(default)]
    pub wflow_variables: Option<Vec<String>>,
    /// 无数据填充
    #[serde(default)]
    pub fill_method: Option<FillMethod>,
    /// 单变量数据源的字段名
    #[serde(default)]
    pub name: Option<String>,
}

impl StaticMapsFromRaster {
    /// 以缺省参数创建
    #[must_use]
    pub fn new(raster_fn: impl Into<String>, reproject_method: ResampleMethod) -> Self {
        Self {
            raster_fn: raster_fn.into(),
            reproject_method,
            variables: None,
            wflow_variables: None,
            fill_method: None,
            name: None,
        }
    }

    /// 设置变量列表
    #[must_use]
    pub fn with_variables<S: Into<String>>(mut self, vars: impl IntoIterator<Item = S>) -> Self {
        self.variables = Some(vars.into_iter().map(Into::into).collect());
        self
    }

    /// 设置配置路径列表
    #[must_use]
    pub fn with_wflow_variables<S: Into<String>>(mut self, paths: impl IntoIterator<Item = S>) -> Self {
        self.wflow_variables = Some(paths.into_iter().map(Into::into).collect());
        self
    }

    /// 设置填充方法
    #[must_use]
    pub fn with_fill(mut self, fill: FillMethod) -> Self {
        self.fill_method = Some(fill);
        self
    }

    /// 设置字段名
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// 按参数组合选出 (字段名, 源栅格)
    fn select(&self, source: RasterSource) -> MhResult<Vec<(String, Raster)>> {
        match source {
            RasterSource::Array(raster) => {
                if let Some(vars) = &self.variables {
                    if vars.len() > 1 {
                        return Err(MhError::invalid_input(format!(
                            "source '{}' holds a single variable but {} variables were requested",
                            self.raster_fn,
                            vars.len()
                        )));
                    }
                }
                let name = self
                    .name
                    .clone()
                    .or_else(|| self.variables.as_ref().and_then(|v| v.first().cloned()))
                    .unwrap_or_else(|| self.raster_fn.clone());
                Ok(vec![(name, raster)])
            }
            RasterSource::Dataset(vars) => {
                if self.wflow_variables.is_some() && self.variables.is_none() {
                    return Err(MhError::MissingVariables {
                        parameter: "variables",
                        required_by: "wflow_variables",
                    });
                }
                Ok(vars)
            }
        }
    }
}

impl SetupMethod for StaticMapsFromRaster {
    fn name(&self) -> &'static str {
        "setup_staticmaps_from_raster"
    }

    fn validate(&self) -> MhResult<()> {
        if let (Some(vars), Some(paths)) = (&self.variables, &self.wflow_variables) {
            MhError::check_lengths("variables", vars.len(), "wflow_variables", paths.len())?;
        }
        if let Some(paths) = &self.wflow_variables {
            for path in paths {
                mh_config::ConfigDocument::validate_path(path)?;
            }
        }
        Ok(())
    }

    fn stage(&self, model: &WflowModel, catalog: &dyn DataCatalog) -> MhResult<StagedUpdate> {
        let source = catalog.raster(&self.raster_fn, self.variables.as_deref())?;
        let selected = self.select(source)?;
        if let Some(paths) = &self.wflow_variables {
            MhError::check_lengths("variables", selected.len(), "wflow_variables", paths.len())?;
        }

        let mut update = StagedUpdate::new();
        for (k, (name, raster)) in selected.into_iter().enumerate() {
            let mut resampled = model.reproject(&raster, self.reproject_method)?;
            if let Some(fill) = &self.fill_method {
                fill.apply(&mut resampled);
            }
            tracing::debug!(
                source = %self.raster_fn,
                field = %name,
                method = %self.reproject_method,
                "raster variable imported"
            );
            if let Some(path) = self.wflow_variables.as_ref().and_then(|p| p.get(k)) {
                update.stage_config(path.as_str(), name.as_str());
            }
            update.stage_field(name, resampled);
        }
        Ok(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::naming::ModelMode;
    use mh_geo::{CrsDefinition, GridSpec};

    fn grid(res: f64, n: usize) -> GridSpec {
        GridSpec::new(CrsDefinition::wgs84(), 12.0, 46.0, res, -res, n, n)
    }

    fn catalog() -> InMemoryCatalog {
        let mut catalog = InMemoryCatalog::new();
        catalog.add_dataset(
            "merit_hydro",
            [
                ("elevtn", Raster::filled(grid(0.25, 4), 800.0, -9999.0)),
                ("lndslp", Raster::filled(grid(0.25, 4), 0.05, -9999.0)),
            ],
        );
        catalog.add_raster("globcover", Raster::filled(grid(0.25, 4), 40.0, 0.0));
        catalog
    }

    #[test]
    fn test_average_onto_coarser_grid() {
        let mut model = WflowModel::new(grid(0.5, 2), ModelMode::Standard);
        let step = StaticMapsFromRaster::new("merit_hydro", ResampleMethod::Average)
            .with_variables(["elevtn"])
            .with_wflow_variables(["input.vertical.altitude"])
            .with_fill(FillMethod::Nearest);
        model.run(&step, &catalog()).unwrap();
        assert_eq!(model.staticmaps().get("elevtn").unwrap().data(), &[800.0; 4]);
        assert_eq!(model.config().get_str("input.vertical.altitude"), Some("elevtn"));
    }

    #[test]
    fn test_single_variable_named_by_source() {
        let mut model = WflowModel::new(grid(0.25, 4), ModelMode::Standard);
        let step = StaticMapsFromRaster::new("globcover", ResampleMethod::Mode)
            .with_wflow_variables(["input.vertical.landuse"]);
        model.run(&step, &catalog()).unwrap();
        assert!(model.staticmaps().has("globcover"));
        assert_eq!(model.config().get_str("input.vertical.landuse"), Some("globcover"));
    }

    #[test]
    fn test_relabel_single_variable() {
        let mut model = WflowModel::new(grid(0.25, 4), ModelMode::Standard);
        let step = StaticMapsFromRaster::new("globcover", ResampleMethod::Mode).with_name("wflow_landuse");
        model.run(&step, &catalog()).unwrap();
        assert!(model.staticmaps().has("wflow_landuse"));
        assert!(model.config().is_empty());
    }

    #[test]
    fn test_cross_crs_source_rejected() {
        let mut catalog = catalog();
        let utm = GridSpec::new(CrsDefinition::utm_zone(32, true), 0.0, 400.0, 100.0, -100.0, 4, 4);
        catalog.add_raster("utm_dem", Raster::filled(utm, 1.0, -9999.0));
        let mut model = WflowModel::new(grid(0.25, 4), ModelMode::Standard);
        let err = model
            .run(&StaticMapsFromRaster::new("utm_dem", ResampleMethod::Nearest), &catalog)
            .unwrap_err();
        assert!(matches!(err, MhError::Projection(_)));
        assert!(model.staticmaps().is_empty());
    }

    #[test]
    fn test_recipe_defaults() {
        let step: StaticMapsFromRaster = serde_json::from_str(r#"{"raster_fn": "globcover"}"#).unwrap();
        assert_eq!(step.reproject_method, ResampleMethod::Nearest);
        assert!(step.variables.is_none() && step.fill_method.is_none());
    }
}
