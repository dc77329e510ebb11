// ==========================================
// 零售采购订单导入系统 - 表格读取器实现
// ==========================================
// 职责: 文件 → RawSheet（首个工作表，行优先，0 起始）
// 支持: Excel (.xlsx/.xls/.xlsm/.ods) / CSV (.csv)
// ==========================================

use crate::domain::sheet::{CellValue, RawSheet};
use crate::importer::error::{ImportError, ImportResult};
use calamine::{open_workbook_auto, Data, Reader};
use csv::ReaderBuilder;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info};

// ==========================================
// SheetReader Trait
// ==========================================
// 实现者: CsvSheetReader, ExcelSheetReader, UniversalSheetReader
pub trait SheetReader: Send + Sync {
    /// 读取文件为原始表格
    ///
    /// # 返回
    /// - Ok(RawSheet): 完整网格（空行保留，解析器依赖绝对行号）
    /// - Err: 文件不存在、格式不支持、解析失败
    fn read_sheet(&self, file_path: &Path) -> ImportResult<RawSheet>;
}

fn ensure_exists(path: &Path) -> ImportResult<()> {
    if !path.exists() {
        return Err(ImportError::FileNotFound(path.display().to_string()));
    }
    Ok(())
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

// ==========================================
// CSV Reader 实现
// ==========================================
pub struct CsvSheetReader {
    // None 表示按首行自动判断（; 或 ,）
    delimiter: Option<u8>,
}

impl CsvSheetReader {
    pub fn new() -> Self {
        Self { delimiter: None }
    }

    pub fn with_delimiter(delimiter: u8) -> Self {
        Self {
            delimiter: Some(delimiter),
        }
    }

    /// 首行含分号且不含逗号时按分号分隔（本地化导出常见格式）
    fn sniff_delimiter(path: &Path) -> ImportResult<u8> {
        let file = File::open(path)?;
        let mut first_line = String::new();
        BufReader::new(file).read_line(&mut first_line)?;
        if first_line.contains(';') && !first_line.contains(',') {
            Ok(b';')
        } else {
            Ok(b',')
        }
    }
}

impl Default for CsvSheetReader {
    fn default() -> Self {
        Self::new()
    }
}

impl SheetReader for CsvSheetReader {
    fn read_sheet(&self, file_path: &Path) -> ImportResult<RawSheet> {
        ensure_exists(file_path)?;

        let ext = extension_of(file_path);
        if ext != "csv" {
            return Err(ImportError::UnsupportedFormat(ext));
        }

        let delimiter = match self.delimiter {
            Some(d) => d,
            None => Self::sniff_delimiter(file_path)?,
        };

        let file = File::open(file_path)?;
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true) // 允许行长度不一致
            .delimiter(delimiter)
            .from_reader(file);

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result?;
            let row: Vec<CellValue> = record
                .iter()
                .map(|value| {
                    if value.trim().is_empty() {
                        CellValue::Empty
                    } else {
                        CellValue::Text(value.to_string())
                    }
                })
                .collect();
            rows.push(row);
        }

        debug!(rows = rows.len(), delimiter = %(delimiter as char), "CSV 读取完成");
        Ok(RawSheet::new(rows))
    }
}

// ==========================================
// Excel Reader 实现
// ==========================================
pub struct ExcelSheetReader;

impl ExcelSheetReader {
    fn convert_cell(cell: &Data) -> CellValue {
        match cell {
            Data::Empty | Data::Error(_) => CellValue::Empty,
            Data::Int(i) => CellValue::Number(*i as f64),
            Data::Float(f) => CellValue::Number(*f),
            Data::Bool(b) => CellValue::Bool(*b),
            Data::String(s) => CellValue::Text(s.clone()),
            other => CellValue::Text(other.to_string()),
        }
    }
}

impl SheetReader for ExcelSheetReader {
    fn read_sheet(&self, file_path: &Path) -> ImportResult<RawSheet> {
        ensure_exists(file_path)?;

        let ext = extension_of(file_path);
        if !matches!(ext.as_str(), "xlsx" | "xls" | "xlsm" | "ods") {
            return Err(ImportError::UnsupportedFormat(ext));
        }

        let mut workbook = open_workbook_auto(file_path)?;

        let sheet_names = workbook.sheet_names();
        let sheet_name = sheet_names
            .first()
            .cloned()
            .ok_or_else(|| ImportError::EmptyWorkbook(file_path.display().to_string()))?;

        let range = workbook.worksheet_range(&sheet_name)?;

        // calamine 的 Range 从首个非空单元格开始，这里补齐到 A1 起始的绝对坐标
        let (row_offset, col_offset) = range
            .start()
            .map(|(r, c)| (r as usize, c as usize))
            .unwrap_or((0, 0));

        let mut rows: Vec<Vec<CellValue>> = vec![Vec::new(); row_offset];
        for data_row in range.rows() {
            let mut row = vec![CellValue::Empty; col_offset];
            row.extend(data_row.iter().map(Self::convert_cell));
            rows.push(row);
        }

        info!(sheet = %sheet_name, rows = rows.len(), "Excel 读取完成");
        Ok(RawSheet::new(rows))
    }
}

// ==========================================
// 通用表格读取器（根据扩展名自动选择）
// ==========================================
pub struct UniversalSheetReader;

impl SheetReader for UniversalSheetReader {
    fn read_sheet(&self, file_path: &Path) -> ImportResult<RawSheet> {
        match extension_of(file_path).as_str() {
            "csv" => CsvSheetReader::new().read_sheet(file_path),
            "xlsx" | "xls" | "xlsm" | "ods" => ExcelSheetReader.read_sheet(file_path),
            other => Err(ImportError::UnsupportedFormat(other.to_string())),
        }
    }
}
