// ==========================================
// 零售采购订单导入系统 - 数据清洗器
// ==========================================
// 职责: TRIM / NULL 标准化 / 包装代码归一 / 非负数值校验
// ==========================================

use tracing::warn;

/// 零售商包装代码 → 标准包装代码
const PACKAGING_ALIASES: &[(&str, &str)] = &[("CX1", "CX")];

pub struct DataCleaner;

impl DataCleaner {
    pub fn clean_text(&self, value: &str, uppercase: bool) -> String {
        let trimmed = value.trim();
        if uppercase {
            trimmed.to_uppercase()
        } else {
            trimmed.to_string()
        }
    }

    /// 标准化 NULL 值（空字符串/空白 → None）
    pub fn normalize_null(&self, value: Option<String>) -> Option<String> {
        value.and_then(|v| {
            let trimmed = v.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
    }

    /// 包装代码归一（TRIM + UPPER + 别名替换），空值取默认
    pub fn normalize_packaging(&self, value: Option<String>, default: &str) -> String {
        let code = match self.normalize_null(value) {
            Some(v) => self.clean_text(&v, true),
            None => return default.to_string(),
        };
        PACKAGING_ALIASES
            .iter()
            .find(|(alias, _)| *alias == code)
            .map(|(_, canonical)| canonical.to_string())
            .unwrap_or(code)
    }

    /// 数量/单价不得为负，负值按 0 处理并告警
    pub fn non_negative(&self, value: f64, field: &str, row: usize) -> f64 {
        if value < 0.0 {
            warn!(row, field, value, "数值为负，按 0 处理");
            0.0
        } else {
            value
        }
    }
}
