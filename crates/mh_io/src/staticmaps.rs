// crates/mh_io/src/staticmaps.rs

//! 静态图容器
//!
//! 把共享同一空间参考的一组具名栅格保存为单个二进制文件。
//!
//! # 文件格式 (v1)
//!
//! ```text
//! [魔数: 4 bytes] "MHSM"
//! [版本: u32]
//! [有网格标志: u8]
//! [CRS 类型: u8] [CRS 字符串/代码] (可选)
//! [origin_x, origin_y, res_x, res_y: f64] [width, height: u64] (可选)
//! [字段数: u64]
//! 每个字段:
//!   [名称: u32 长度 + UTF-8]
//!   [无数据值: f64]
//!   [有层维度标志: u8] [维度名 + 坐标数 u64 + 坐标 f64...] (可选)
//!   [数据: n_layers * n_cells * f64]
//! [CRC32: u32]
//! ```
//!
//! 所有数值为小端序。写入时先写临时文件，成功后重命名。

use crate::error::{IoError, IoResult};
use mh_geo::{CrsDefinition, GridSpec};
use mh_terrain::raster::{LayerDim, Raster};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

// ============================================================
// 常量
// ============================================================

/// 容器格式版本
const STATICMAPS_VERSION: u32 = 1;

/// 容器魔数
const STATICMAPS_MAGIC: &[u8; 4] = b"MHSM";

/// 默认文件名
pub const STATICMAPS_FILE: &str = "staticmaps.mhsm";

// ============================================================
// 容器
// ============================================================

/// 解码后的容器内容
#[derive(Debug, Clone)]
pub struct StaticMapsContainer {
    /// 共享空间参考，空容器可以没有
    pub grid: Option<GridSpec>,
    /// 字段（保持写入顺序）
    pub fields: Vec<(String, Raster)>,
}

/// 写入容器
pub fn write_staticmaps<'a>(
    path: &Path,
    grid: Option<&GridSpec>,
    fields: impl IntoIterator<Item = (&'a str, &'a Raster)>,
) -> IoResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut data = Vec::new();
    data.extend_from_slice(STATICMAPS_MAGIC);
    data.extend_from_slice(&STATICMAPS_VERSION.to_le_bytes());

    match grid {
        Some(g) => {
            data.push(1);
            encode_grid(&mut data, g);
        }
        None => data.push(0),
    }

    let fields: Vec<(&str, &Raster)> = fields.into_iter().collect();
    data.extend_from_slice(&(fields.len() as u64).to_le_bytes());
    for (name, raster) in &fields {
        if let Some(g) = grid {
            if raster.grid() != g {
                return Err(IoError::corrupted(
                    path.display().to_string(),
                    format!("field '{name}' is not aligned with the container grid"),
                ));
            }
        }
        put_str(&mut data, name);
        data.extend_from_slice(&raster.nodata().to_le_bytes());
        match raster.layer_dim() {
            Some(dim) => {
                data.push(1);
                put_str(&mut data, &dim.name);
                data.extend_from_slice(&(dim.coords.len() as u64).to_le_bytes());
                for c in &dim.coords {
                    data.extend_from_slice(&c.to_le_bytes());
                }
            }
            None => data.push(0),
        }
        for v in raster.data() {
            data.extend_from_slice(&v.to_le_bytes());
        }
    }

    let temp_path = path.with_extension("mhsm.tmp");
    {
        let mut writer = BufWriter::new(File::create(&temp_path)?);
        writer.write_all(&data)?;
        writer.write_all(&compute_crc32(&data).to_le_bytes())?;
        writer.flush()?;
    }
    std::fs::rename(&temp_path, path)?;

    tracing::info!(path = %path.display(), fields = fields.len(), bytes = data.len() + 4, "static maps written");
    Ok(())
}

/// 读取容器
pub fn read_staticmaps(path: &Path) -> IoResult<StaticMapsContainer> {
    let file_name = path.display().to_string();
    let mut all_data = Vec::new();
    BufReader::new(File::open(path)?).read_to_end(&mut all_data)?;

    // 至少需要魔数 + 版本 + 标志 + CRC
    if all_data.len() < 13 {
        return Err(IoError::corrupted(file_name, "文件太小"));
    }
    let crc_offset = all_data.len() - 4;
    let (data, crc_bytes) = all_data.split_at(crc_offset);
    let stored = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);
    let computed = compute_crc32(data);
    if stored != computed {
        return Err(IoError::Checksum {
            expected: stored,
            found: computed,
        });
    }

    let mut r = ByteReader::new(data, &file_name);
    if r.take(4)? != STATICMAPS_MAGIC {
        return Err(IoError::UnknownFormat { path: file_name });
    }
    let version = r.u32()?;
    if version > STATICMAPS_VERSION {
        return Err(IoError::Version {
            file: version,
            current: STATICMAPS_VERSION,
        });
    }

    let grid = match r.u8()? {
        0 => None,
        _ => Some(decode_grid(&mut r)?),
    };

    let n_fields = r.u64()? as usize;
    let mut fields = Vec::with_capacity(n_fields.min(1024));
    for _ in 0..n_fields {
        let Some(g) = grid.as_ref() else {
            return Err(r.corrupted("fields present without a grid"));
        };
        let name = r.string()?;
        let nodata = r.f64()?;
        let dim = match r.u8()? {
            0 => None,
            _ => {
                let dim_name = r.string()?;
                let n = r.u64()? as usize;
                let coords = (0..n).map(|_| r.f64()).collect::<IoResult<Vec<_>>>()?;
                Some(LayerDim { name: dim_name, coords })
            }
        };
        let n_values = g.n_cells() * dim.as_ref().map_or(1, |d| d.coords.len());
        let values = (0..n_values).map(|_| r.f64()).collect::<IoResult<Vec<_>>>()?;
        let raster = match dim {
            Some(dim) => Raster::from_layers(g.clone(), dim, values, nodata)?,
            None => Raster::from_data(g.clone(), values, nodata)?,
        };
        fields.push((name, raster));
    }
    if !r.is_empty() {
        return Err(r.corrupted("trailing bytes after last field"));
    }

    tracing::info!(path = %path.display(), fields = fields.len(), "static maps read");
    Ok(StaticMapsContainer { grid, fields })
}

// ============================================================
// 编码辅助
// ============================================================

fn put_str(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(&(s.len() as u32).to_le_bytes());
    buf.extend_from_slice(s.as_bytes());
}

fn encode_grid(buf: &mut Vec<u8>, grid: &GridSpec) {
    match &grid.crs {
        CrsDefinition::Epsg(code) => {
            buf.push(0);
            buf.extend_from_slice(&code.to_le_bytes());
        }
        CrsDefinition::Proj4(s) => {
            buf.push(1);
            put_str(buf, s);
        }
        CrsDefinition::Wkt(s) => {
            buf.push(2);
            put_str(buf, s);
        }
    }
    let t = &grid.transform;
    for v in [t.origin_x, t.origin_y, t.res_x, t.res_y] {
        buf.extend_from_slice(&v.to_le_bytes());
    }
    buf.extend_from_slice(&(grid.width as u64).to_le_bytes());
    buf.extend_from_slice(&(grid.height as u64).to_le_bytes());
}

fn decode_grid(r: &mut ByteReader<'_>) -> IoResult<GridSpec> {
    let crs = match r.u8()? {
        0 => CrsDefinition::Epsg(r.u32()?),
        1 => CrsDefinition::Proj4(r.string()?),
        2 => CrsDefinition::Wkt(r.string()?),
        other => return Err(r.corrupted(format!("unknown CRS tag {other}"))),
    };
    let (ox, oy, rx, ry) = (r.f64()?, r.f64()?, r.f64()?, r.f64()?);
    let width = r.u64()? as usize;
    let height = r.u64()? as usize;
    Ok(GridSpec::new(crs, ox, oy, rx, ry, width, height))
}

/// 小端序游标
struct ByteReader<'a> {
    data: &'a [u8],
    offset: usize,
    file: &'a str,
}

impl<'a> ByteReader<'a> {
    fn new(data: &'a [u8], file: &'a str) -> Self {
        Self { data, offset: 0, file }
    }

    fn corrupted(&self, reason: impl Into<String>) -> IoError {
        IoError::corrupted(self.file, reason)
    }

    fn is_empty(&self) -> bool {
        self.offset >= self.data.len()
    }

    fn take(&mut self, n: usize) -> IoResult<&'a [u8]> {
        let end = self.offset.checked_add(n).filter(|&e| e <= self.data.len());
        let Some(end) = end else {
            return Err(self.corrupted(format!("unexpected end of data at byte {}", self.offset)));
        };
        let out = &self.data[self.offset..end];
        self.offset = end;
        Ok(out)
    }

    fn array<const N: usize>(&mut self) -> IoResult<[u8; N]> {
        let bytes = self.take(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    fn u8(&mut self) -> IoResult<u8> {
        Ok(self.array::<1>()?[0])
    }

    fn u32(&mut self) -> IoResult<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn u64(&mut self) -> IoResult<u64> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    fn f64(&mut self) -> IoResult<f64> {
        Ok(f64::from_le_bytes(self.array()?))
    }

    fn string(&mut self) -> IoResult<String> {
        let n = self.u32()? as usize;
        let bytes = self.take(n)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| self.corrupted(format!("invalid UTF-8: {e}")))
    }
}

// ============================================================
// CRC32
// ============================================================

/// 计算 CRC32 校验和（IEEE 多项式）
fn compute_crc32(data: &[u8]) -> u32 {
    let mut crc = 0xFFFF_FFFFu32;
    for &byte in data {
        let index = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = CRC32_TABLE[index] ^ (crc >> 8);
    }
    !crc
}

/// 生成 CRC32 查找表
const fn generate_crc32_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut j = 0;
        while j < 8 {
            if crc & 1 != 0 {
                crc = 0xEDB8_8320 ^ (crc >> 1);
            } else {
                crc >>= 1;
            }
            j += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// CRC32 查找表（编译期生成）
const CRC32_TABLE: [u32; 256] = generate_crc32_table();

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> GridSpec {
        GridSpec::new(CrsDefinition::wgs84(), 11.6, 46.7, 0.008333, -0.008333, 3, 2)
    }

    #[test]
    fn test_crc32_known_value() {
        assert_eq!(compute_crc32(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn test_container_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(STATICMAPS_FILE);

        let dem = Raster::from_data(grid(), vec![1.0, 2.0, 3.0, 4.0, f64::NAN, 6.0], -9999.0).unwrap();
        let vol = Raster::from_layers(
            grid(),
            LayerDim {
                name: "flood_depth".into(),
                coords: vec![0.0, 0.5],
            },
            (0..12).map(f64::from).collect(),
            f64::NAN,
        )
        .unwrap();
        write_staticmaps(&path, Some(&grid()), [("wflow_dem", &dem), ("floodplain_volume", &vol)]).unwrap();

        let back = read_staticmaps(&path).unwrap();
        assert_eq!(back.grid.as_ref(), Some(&grid()));
        assert_eq!(back.fields.len(), 2);
        assert_eq!(back.fields[0].0, "wflow_dem");
        assert_eq!(back.fields[0].1.data()[3], 4.0);
        assert!(back.fields[0].1.data()[4].is_nan());
        let dim = back.fields[1].1.layer_dim().unwrap();
        assert_eq!(dim.name, "flood_depth");
        assert_eq!(dim.coords, vec![0.0, 0.5]);
        assert_eq!(back.fields[1].1.layer(1)[0], 6.0);
    }

    #[test]
    fn test_empty_container() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(STATICMAPS_FILE);
        write_staticmaps(&path, None, std::iter::empty()).unwrap();
        let back = read_staticmaps(&path).unwrap();
        assert!(back.grid.is_none());
        assert!(back.fields.is_empty());
    }

    #[test]
    fn test_corruption_detected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(STATICMAPS_FILE);
        let dem = Raster::filled(grid(), 1.0, -9999.0);
        write_staticmaps(&path, Some(&grid()), [("wflow_dem", &dem)]).unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        let mid = bytes.len() / 2;
        bytes[mid] ^= 0xFF;
        std::fs::write(&path, bytes).unwrap();
        assert!(matches!(read_staticmaps(&path), Err(IoError::Checksum { .. })));
    }
}
