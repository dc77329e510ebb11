// ==========================================
// 零售采购订单导入系统 - 原始表格模型
// ==========================================
// 职责: 表格单元格标量值 + 行优先的只读网格
// 约束: 0 起始索引；越界访问视为空单元格
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

static EMPTY_CELL: CellValue = CellValue::Empty;

// ==========================================
// CellValue - 单元格标量值
// ==========================================
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Empty,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl CellValue {
    /// 空值或纯空白文本
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// 文本视图（TRIM 后为空则返回 None）
    ///
    /// 整数值的数字不带小数部分：110381.0 → "110381"
    pub fn as_text(&self) -> Option<String> {
        match self {
            CellValue::Empty => None,
            CellValue::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            }
            CellValue::Number(n) => Some(format_number(*n)),
            CellValue::Bool(b) => Some(b.to_string()),
        }
    }

    /// 数值视图
    ///
    /// 文本中若只含逗号不含点，逗号视为小数点（"50,5" → 50.5）
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) if n.is_finite() => Some(*n),
            CellValue::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return None;
                }
                let normalized = if trimmed.contains(',') && !trimmed.contains('.') {
                    trimmed.replace(',', ".")
                } else {
                    trimmed.to_string()
                };
                normalized.parse::<f64>().ok().filter(|v| v.is_finite())
            }
            _ => None,
        }
    }

    /// 与固定标签比较（两侧 TRIM 后全等）
    pub fn matches_label(&self, label: &str) -> bool {
        match self {
            CellValue::Text(s) => s.trim() == label.trim(),
            _ => false,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_text() {
            Some(text) => write!(f, "{}", text),
            None => Ok(()),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Number(value as f64)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Bool(value)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(CellValue::Empty)
    }
}

fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

// ==========================================
// RawSheet - 原始表格（行 × 列）
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSheet {
    rows: Vec<Vec<CellValue>>,
}

impl RawSheet {
    pub fn new(rows: Vec<Vec<CellValue>>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&[CellValue]> {
        self.rows.get(index).map(|r| r.as_slice())
    }

    /// 读取单元格；越界返回空单元格
    pub fn cell(&self, row: usize, col: usize) -> &CellValue {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY_CELL)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 整行是否全部为空
    pub fn row_is_blank(&self, index: usize) -> bool {
        self.rows
            .get(index)
            .map(|r| r.iter().all(CellValue::is_blank))
            .unwrap_or(true)
    }
}

impl From<Vec<Vec<CellValue>>> for RawSheet {
    fn from(rows: Vec<Vec<CellValue>>) -> Self {
        RawSheet::new(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integral_number_text_view() {
        assert_eq!(CellValue::from(110381.0).as_text(), Some("110381".to_string()));
        assert_eq!(CellValue::from(50.25).as_text(), Some("50.25".to_string()));
        assert_eq!(CellValue::from("  6091 ").as_text(), Some("6091".to_string()));
        assert_eq!(CellValue::from("   ").as_text(), None);
    }

    #[test]
    fn test_numeric_view_accepts_decimal_comma() {
        assert_eq!(CellValue::from("50,5").as_f64(), Some(50.5));
        assert_eq!(CellValue::from("1.5").as_f64(), Some(1.5));
        assert_eq!(CellValue::from("abc").as_f64(), None);
        assert_eq!(CellValue::Empty.as_f64(), None);
    }

    #[test]
    fn test_out_of_range_cell_is_empty() {
        let sheet = RawSheet::new(vec![vec![CellValue::from("a")]]);
        assert_eq!(sheet.cell(0, 0), &CellValue::from("a"));
        assert!(sheet.cell(0, 9).is_blank());
        assert!(sheet.cell(7, 0).is_blank());
        assert!(sheet.row_is_blank(3));
    }

    #[test]
    fn test_cell_json_shape() {
        let row: Vec<CellValue> = serde_json::from_str(r#"[null, "Loja", 12, true]"#).unwrap();
        assert_eq!(row[0], CellValue::Empty);
        assert_eq!(row[1], CellValue::from("Loja"));
        assert_eq!(row[2], CellValue::from(12.0));
        assert_eq!(row[3], CellValue::Bool(true));
    }
}
