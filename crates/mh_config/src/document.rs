// crates/mh_config/src/document.rs

//! 模型运行配置文档
//!
//! 内存中以扁平的点分路径保存（`input.lateral.river.length` → 值），
//! 只在文件边界展开为 TOML 表结构。写入总是覆盖，调用顺序靠后的生效。
//!
//! # 示例
//!
//! ```
//! use mh_config::ConfigDocument;
//!
//! let mut doc = ConfigDocument::new();
//! doc.set("model.river_routing", "local-inertial").unwrap();
//! doc.set("model.lakes", true).unwrap();
//! assert_eq!(doc.get_str("model.river_routing"), Some("local-inertial"));
//!
//! let text = doc.to_toml_string().unwrap();
//! let back = ConfigDocument::from_toml_str(&text).unwrap();
//! assert_eq!(back, doc);
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// 配置值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    /// 空值（写文件时省略）
    Null,
    /// 布尔
    Bool(bool),
    /// 整数
    Int(i64),
    /// 浮点
    Float(f64),
    /// 字符串
    Str(String),
    /// 数组
    Array(Vec<ConfigValue>),
}

impl ConfigValue {
    /// 作为字符串
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// 作为布尔
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// 作为浮点（整数会被转换）
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ConfigValue::Float(v) => Some(*v),
            ConfigValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// 是否为空值
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, ConfigValue::Null)
    }

    fn to_toml(&self) -> Option<toml::Value> {
        Some(match self {
            ConfigValue::Null => return None,
            ConfigValue::Bool(b) => toml::Value::Boolean(*b),
            ConfigValue::Int(v) => toml::Value::Integer(*v),
            ConfigValue::Float(v) => toml::Value::Float(*v),
            ConfigValue::Str(s) => toml::Value::String(s.clone()),
            ConfigValue::Array(items) => {
                toml::Value::Array(items.iter().filter_map(ConfigValue::to_toml).collect())
            }
        })
    }

    fn from_toml(value: toml::Value) -> Self {
        match value {
            toml::Value::Boolean(b) => ConfigValue::Bool(b),
            toml::Value::Integer(v) => ConfigValue::Int(v),
            toml::Value::Float(v) => ConfigValue::Float(v),
            toml::Value::String(s) => ConfigValue::Str(s),
            toml::Value::Datetime(dt) => ConfigValue::Str(dt.to_string()),
            toml::Value::Array(items) => {
                ConfigValue::Array(items.into_iter().map(ConfigValue::from_toml).collect())
            }
            // 数组中的内联表按字符串保留
            toml::Value::Table(t) => ConfigValue::Str(t.to_string()),
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Null => f.write_str("null"),
            ConfigValue::Bool(b) => write!(f, "{b}"),
            ConfigValue::Int(v) => write!(f, "{v}"),
            ConfigValue::Float(v) => write!(f, "{v}"),
            ConfigValue::Str(s) => write!(f, "{s}"),
            ConfigValue::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<bool> for ConfigValue {
    fn from(v: bool) -> Self {
        ConfigValue::Bool(v)
    }
}

impl From<i64> for ConfigValue {
    fn from(v: i64) -> Self {
        ConfigValue::Int(v)
    }
}

impl From<i32> for ConfigValue {
    fn from(v: i32) -> Self {
        ConfigValue::Int(i64::from(v))
    }
}

impl From<f64> for ConfigValue {
    fn from(v: f64) -> Self {
        ConfigValue::Float(v)
    }
}

impl From<&str> for ConfigValue {
    fn from(v: &str) -> Self {
        ConfigValue::Str(v.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(v: String) -> Self {
        ConfigValue::Str(v)
    }
}

impl From<&String> for ConfigValue {
    fn from(v: &String) -> Self {
        ConfigValue::Str(v.clone())
    }
}

impl<T: Into<ConfigValue>> From<Option<T>> for ConfigValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(ConfigValue::Null, Into::into)
    }
}

/// 扁平配置文档
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigDocument {
    entries: BTreeMap<String, ConfigValue>,
}

impl ConfigDocument {
    /// 创建空文档
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// 检查路径格式
    pub fn validate_path(path: &str) -> Result<(), ConfigError> {
        if path.is_empty() {
            return Err(ConfigError::invalid_path(path, "path is empty"));
        }
        if path.split('.').any(|seg| seg.trim().is_empty()) {
            return Err(ConfigError::invalid_path(path, "path contains an empty segment"));
        }
        Ok(())
    }

    /// 设置值，无条件覆盖
    ///
    /// 路径的前缀如果是已有叶子，或路径下已有子项，这些冲突项会被移除。
    pub fn set(&mut self, path: &str, value: impl Into<ConfigValue>) -> Result<(), ConfigError> {
        Self::validate_path(path)?;

        let segments: Vec<&str> = path.split('.').collect();
        for k in 1..segments.len() {
            let prefix = segments[..k].join(".");
            if self.entries.remove(&prefix).is_some() {
                tracing::debug!(path, replaced = %prefix, "config leaf replaced by table");
            }
        }
        let child_prefix = format!("{path}.");
        self.entries.retain(|key, _| !key.starts_with(&child_prefix));

        self.entries.insert(path.to_string(), value.into());
        Ok(())
    }

    /// 读取值
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&ConfigValue> {
        self.entries.get(path)
    }

    /// 读取字符串
    #[must_use]
    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(ConfigValue::as_str)
    }

    /// 读取布尔
    #[must_use]
    pub fn get_bool(&self, path: &str) -> Option<bool> {
        self.get(path).and_then(ConfigValue::as_bool)
    }

    /// 移除值
    pub fn remove(&mut self, path: &str) -> Option<ConfigValue> {
        self.entries.remove(path)
    }

    /// 是否包含路径
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// 按路径排序遍历
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfigValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// 条目数
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 是否为空
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 合并另一文档，另一文档的值覆盖本文档
    pub fn merge(&mut self, other: &ConfigDocument) -> Result<(), ConfigError> {
        for (path, value) in other.iter() {
            self.set(path, value.clone())?;
        }
        Ok(())
    }

    // ========================================================================
    // TOML 边界
    // ========================================================================

    /// 从 TOML 文本解析（展平）
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let table: toml::Table = text
            .parse()
            .map_err(|e: toml::de::Error| ConfigError::Parse(e.to_string()))?;
        let mut doc = Self::new();
        flatten_into(&mut doc.entries, String::new(), table);
        Ok(doc)
    }

    /// 转为 TOML 文本（嵌套，省略空值）
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        let mut root = toml::Table::new();
        for (path, value) in &self.entries {
            let Some(leaf) = value.to_toml() else {
                continue;
            };
            let mut segments: Vec<&str> = path.split('.').collect();
            let Some(last) = segments.pop() else {
                continue;
            };
            let mut table = &mut root;
            for seg in segments {
                let entry = table
                    .entry(seg.to_string())
                    .or_insert_with(|| toml::Value::Table(toml::Table::new()));
                table = match entry {
                    toml::Value::Table(t) => t,
                    _ => {
                        return Err(ConfigError::invalid_path(
                            path.clone(),
                            format!("segment '{seg}' is already a value"),
                        ))
                    }
                };
            }
            table.insert(last.to_string(), leaf);
        }
        toml::to_string_pretty(&root).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// 读取 TOML 文件
    pub fn read(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let doc = Self::from_toml_str(&text)?;
        tracing::info!(path = %path.display(), entries = doc.len(), "config read");
        Ok(doc)
    }

    /// 写入 TOML 文件
    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, self.to_toml_string()?)?;
        tracing::info!(path = %path.display(), entries = self.len(), "config written");
        Ok(())
    }
}

fn flatten_into(out: &mut BTreeMap<String, ConfigValue>, prefix: String, table: toml::Table) {
    for (key, value) in table {
        let path = if prefix.is_empty() {
            key
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            toml::Value::Table(sub) => flatten_into(out, path, sub),
            other => {
                out.insert(path, ConfigValue::from_toml(other));
            }
        }
    }
}
