// crates/mh_io/src/table.rs

//! 数值表
//!
//! 行索引隐式为 `0..n`，列有序且具名，单元为 f64（缺失为 NaN）。
//! 湖泊率定曲线、水库面积时序都以此类型保存。
//!
//! # 示例
//!
//! ```
//! use mh_io::table::Table;
//!
//! let t = Table::from_columns(vec![
//!     ("H".to_string(), vec![10.0, 11.0]),
//!     ("S".to_string(), vec![0.0, 5.0e6]),
//! ])
//! .unwrap();
//! assert_eq!(t.n_rows(), 2);
//! assert_eq!(t.column("S").unwrap(), vec![0.0, 5.0e6]);
//! ```

use mh_foundation::error::{MhError, MhResult};

/// 数值表
#[derive(Debug, Clone, Default)]
pub struct Table {
    columns: Vec<String>,
    /// 行优先
    data: Vec<f64>,
}

impl Table {
    /// 创建指定列的空表
    pub fn new(columns: Vec<String>) -> MhResult<Self> {
        for (i, c) in columns.iter().enumerate() {
            if columns[..i].contains(c) {
                return Err(MhError::invalid_input(format!("duplicate table column '{c}'")));
            }
        }
        Ok(Self {
            columns,
            data: Vec::new(),
        })
    }

    /// 从列数据创建
    pub fn from_columns(columns: Vec<(String, Vec<f64>)>) -> MhResult<Self> {
        let n_rows = columns.first().map_or(0, |(_, v)| v.len());
        for (name, values) in &columns {
            if values.len() != n_rows {
                return Err(MhError::invalid_input(format!(
                    "column '{name}' has {} rows, expected {n_rows}",
                    values.len()
                )));
            }
        }
        let mut table = Self::new(columns.iter().map(|(n, _)| n.clone()).collect())?;
        table.data.reserve(n_rows * columns.len());
        for r in 0..n_rows {
            for (_, values) in &columns {
                table.data.push(values[r]);
            }
        }
        Ok(table)
    }

    /// 追加一行
    pub fn push_row(&mut self, row: &[f64]) -> MhResult<()> {
        MhError::check_size("table row", self.columns.len(), row.len())?;
        self.data.extend_from_slice(row);
        Ok(())
    }

    /// 列名
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// 列数
    #[must_use]
    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    /// 行数
    #[must_use]
    pub fn n_rows(&self) -> usize {
        if self.columns.is_empty() {
            0
        } else {
            self.data.len() / self.columns.len()
        }
    }

    /// 列索引
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// 是否含有列
    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// 按名称取一列
    #[must_use]
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let j = self.column_index(name)?;
        Some(self.rows().map(|row| row[j]).collect())
    }

    /// 单元值
    #[must_use]
    pub fn value(&self, row: usize, col: usize) -> Option<f64> {
        if col < self.n_cols() && row < self.n_rows() {
            Some(self.data[row * self.n_cols() + col])
        } else {
            None
        }
    }

    /// 第 r 行
    #[must_use]
    pub fn row(&self, r: usize) -> &[f64] {
        let n = self.n_cols();
        &self.data[r * n..(r + 1) * n]
    }

    /// 按行遍历
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        self.data.chunks(self.n_cols().max(1))
    }
}

/// 逐元素相等，NaN 与 NaN 视为相等
impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        self.columns == other.columns
            && self.data.len() == other.data.len()
            && self
                .data
                .iter()
                .zip(&other.data)
                .all(|(a, b)| a == b || (a.is_nan() && b.is_nan()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_access() {
        let mut t = Table::new(vec!["H".into(), "S".into()]).unwrap();
        t.push_row(&[1.0, 2.0]).unwrap();
        t.push_row(&[3.0, 4.0]).unwrap();
        assert!(t.push_row(&[1.0]).is_err());
        assert_eq!(t.n_rows(), 2);
        assert_eq!(t.value(1, 0), Some(3.0));
        assert_eq!(t.row(0), &[1.0, 2.0]);
        assert_eq!(t.column("H").unwrap(), vec![1.0, 3.0]);
        assert!(t.column("Q").is_none());
    }

    #[test]
    fn test_duplicate_columns_rejected() {
        assert!(Table::new(vec!["H".into(), "H".into()]).is_err());
    }

    #[test]
    fn test_ragged_columns_rejected() {
        let res = Table::from_columns(vec![("a".into(), vec![1.0]), ("b".into(), vec![])]);
        assert!(res.is_err());
    }

    #[test]
    fn test_nan_equality() {
        let a = Table::from_columns(vec![("area".into(), vec![f64::NAN, 1.0])]).unwrap();
        let b = a.clone();
        assert_eq!(a, b);
        let c = Table::from_columns(vec![("area".into(), vec![0.0, 1.0])]).unwrap();
        assert_ne!(a, c);
    }
}
