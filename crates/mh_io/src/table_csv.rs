// crates/mh_io/src/table_csv.rs

//! CSV 表读写
//!
//! 每个表一个逗号分隔文件：首行为表头，行序保持不变。
//! 浮点按最短可往返形式写出，NaN 写为空单元；读入时空单元和 `nan` 还原为 NaN。
//!
//! # 使用示例
//!
//! ```
//! use mh_io::table_csv::{parse_table_str, to_csv_string};
//!
//! let t = parse_table_str("H,S\n10,0\n11.5,\n", None).unwrap();
//! assert!(t.value(1, 1).unwrap().is_nan());
//! assert_eq!(to_csv_string(&t).unwrap(), "H,S\n10,0\n11.5,\n");
//! ```

use crate::error::{IoError, IoResult};
use crate::table::Table;
use std::io::{Read, Write};
use std::path::Path;

/// 从 CSV 文件读取表
pub fn read_table(path: &Path) -> IoResult<Table> {
    let reader = reader_builder().from_path(path)?;
    parse_records(reader, path.to_string_lossy().to_string())
}

/// 从字符串解析表
///
/// 以 `#` 开头的行和空行跳过。列数与表头不一致的行视为错误。
pub fn parse_table_str(content: &str, path: Option<&Path>) -> IoResult<Table> {
    let file = path
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|| "<string>".to_string());
    parse_records(reader_builder().from_reader(content.as_bytes()), file)
}

fn reader_builder() -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(true)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .flexible(true);
    builder
}

fn parse_records<R: Read>(mut reader: csv::Reader<R>, file: String) -> IoResult<Table> {
    let header = reader.headers()?.clone();
    if header.is_empty() {
        return Err(IoError::parse(file, 1, "missing header row"));
    }
    let columns: Vec<String> = header.iter().map(str::to_string).collect();
    // 首列名为空时视为导出的行索引列
    let skip_index = columns.first().is_some_and(String::is_empty) && columns.len() > 1;
    let columns = if skip_index { columns[1..].to_vec() } else { columns };

    let mut table = Table::new(columns).map_err(|e| IoError::parse(file.clone(), 1, e.to_string()))?;
    let mut row = Vec::with_capacity(table.n_cols());

    for result in reader.records() {
        let record = result?;
        let line_num = record.position().map_or(0, |p| p.line() as usize);
        row.clear();
        for cell in record.iter().skip(usize::from(skip_index)) {
            row.push(parse_cell(cell).ok_or_else(|| {
                IoError::parse(file.clone(), line_num, format!("cannot parse '{cell}' as number"))
            })?);
        }
        if row.len() != table.n_cols() {
            return Err(IoError::parse(
                file,
                line_num,
                format!("expected {} columns, got {}", table.n_cols(), row.len()),
            ));
        }
        table.push_row(&row)?;
    }

    tracing::debug!(file = %file, rows = table.n_rows(), cols = table.n_cols(), "table parsed");
    Ok(table)
}

fn parse_cell(cell: &str) -> Option<f64> {
    if cell.is_empty() || cell.eq_ignore_ascii_case("nan") {
        return Some(f64::NAN);
    }
    cell.parse::<f64>().ok()
}

fn write_records<W: Write>(writer: &mut csv::Writer<W>, table: &Table) -> IoResult<()> {
    writer.write_record(table.columns())?;
    let mut cells = Vec::with_capacity(table.n_cols());
    for row in table.rows() {
        cells.clear();
        // Display 输出最短可往返形式；单列空值由写出器加引号，不会变成空行
        cells.extend(row.iter().map(|v| if v.is_nan() { String::new() } else { v.to_string() }));
        writer.write_record(&cells)?;
    }
    writer.flush()?;
    Ok(())
}

/// 表转为 CSV 文本
pub fn to_csv_string(table: &Table) -> IoResult<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    write_records(&mut writer, table)?;
    let bytes = writer.into_inner().map_err(|e| IoError::Io(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| IoError::corrupted("<string>", e.to_string()))
}

/// 写入 CSV 文件（临时文件 + 重命名）
pub fn write_table(path: &Path, table: &Table) -> IoResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let temp_path = path.with_extension("csv.tmp");
    {
        let mut writer = csv::Writer::from_path(&temp_path)?;
        write_records(&mut writer, table)?;
    }
    std::fs::rename(&temp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_csv() {
        let t = parse_table_str("elevtn,volume,discharge\n395.0,0,0\n396.5,1.2e6,3.25\n", None).unwrap();
        assert_eq!(t.columns(), &["elevtn", "volume", "discharge"]);
        assert_eq!(t.n_rows(), 2);
        assert_eq!(t.value(1, 1), Some(1.2e6));
    }

    #[test]
    fn test_index_column_skipped() {
        let t = parse_table_str(",area\n0,12.5\n1,13.0\n", None).unwrap();
        assert_eq!(t.columns(), &["area"]);
        assert_eq!(t.column("area").unwrap(), vec![12.5, 13.0]);
    }

    #[test]
    fn test_comments_and_blank_lines() {
        let t = parse_table_str("# rating curve\nH,Q\n\n1,2\n", None).unwrap();
        assert_eq!(t.n_rows(), 1);
    }

    #[test]
    fn test_bad_cell_reports_line() {
        let err = parse_table_str("H,Q\n1,2\n3,abc\n", None).unwrap_err();
        assert!(matches!(err, IoError::ParseError { line: 3, .. }));
    }

    #[test]
    fn test_ragged_row_rejected() {
        assert!(parse_table_str("H,Q\n1\n", None).is_err());
        assert!(parse_table_str("", None).is_err());
    }

    #[test]
    fn test_shortest_float_roundtrip() {
        let values = vec![0.1, 1.0 / 3.0, 1e-5, 123456.789, -0.0, f64::NAN];
        let t = Table::from_columns(vec![("v".into(), values)]).unwrap();
        let back = parse_table_str(&to_csv_string(&t).unwrap(), None).unwrap();
        assert_eq!(back.n_rows(), 6);
        assert_eq!(back, t);
    }

    #[test]
    fn test_single_column_missing_values_kept() {
        let t = Table::from_columns(vec![("area".into(), vec![2.0e4, f64::NAN, 3.0e4, f64::NAN])]).unwrap();
        let text = to_csv_string(&t).unwrap();
        assert_eq!(text, "area\n20000\n\"\"\n30000\n\"\"\n");
        assert_eq!(parse_table_str(&text, None).unwrap(), t);
    }

    #[test]
    fn test_quoted_header_roundtrip() {
        let t = Table::from_columns(vec![
            ("level, m".into(), vec![1.0, 2.0]),
            ("Q".into(), vec![f64::NAN, 0.5]),
        ])
        .unwrap();
        let back = parse_table_str(&to_csv_string(&t).unwrap(), None).unwrap();
        assert_eq!(back.columns(), &["level, m", "Q"]);
        assert_eq!(back, t);
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lake_sh_169.csv");
        let t = Table::from_columns(vec![
            ("H".into(), vec![395.0, 396.0]),
            ("S".into(), vec![0.0, 2.5e6]),
        ])
        .unwrap();
        write_table(&path, &t).unwrap();
        assert_eq!(read_table(&path).unwrap(), t);
        assert!(!dir.path().join("lake_sh_169.csv.tmp").exists());
    }
}
