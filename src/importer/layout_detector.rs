// ==========================================
// 零售采购订单导入系统 - 版式探测器
// ==========================================
// 职责: 对未知零售商的表格打分，判断是否可按 C 版式解析
// 信号: 第 0-3 行标签 + 明细表头签名，共五项
// 判定: confidence > 阈值 且 命中信号数 >= 下限（纯函数，无副作用）
// ==========================================

use crate::domain::sheet::RawSheet;
use crate::importer::layouts::metadata_block::{find_items_header, labels};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.6;
pub const DEFAULT_MIN_SIGNALS: usize = 3;
const SIGNAL_COUNT: usize = 5;

/// 五项信号明细
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutSignals {
    pub payment_terms_label: bool,
    pub tax_id_label: bool,
    pub client_code_label: bool,
    pub order_number_label: bool,
    pub items_header: bool,
}

impl LayoutSignals {
    pub fn count(&self) -> usize {
        [
            self.payment_terms_label,
            self.tax_id_label,
            self.client_code_label,
            self.order_number_label,
            self.items_header,
        ]
        .iter()
        .filter(|s| **s)
        .count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutDetection {
    pub is_match: bool,
    pub confidence: f64,
    pub signals: LayoutSignals,
}

#[derive(Debug, Clone)]
pub struct LayoutDetector {
    confidence_threshold: f64,
    min_signals: usize,
}

impl Default for LayoutDetector {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_MIN_SIGNALS)
    }
}

impl LayoutDetector {
    pub fn new(confidence_threshold: f64, min_signals: usize) -> Self {
        Self {
            confidence_threshold,
            min_signals,
        }
    }

    pub fn confidence_threshold(&self) -> f64 {
        self.confidence_threshold
    }

    pub fn detect(&self, sheet: &RawSheet) -> LayoutDetection {
        let label_at = |row: usize, label: &str| sheet.cell(row, 0).matches_label(label);

        let signals = LayoutSignals {
            payment_terms_label: label_at(0, labels::PAYMENT_TERMS),
            tax_id_label: label_at(1, labels::TAX_ID),
            client_code_label: label_at(2, labels::CLIENT_CODE),
            order_number_label: label_at(3, labels::ORDER_NUMBER),
            items_header: find_items_header(sheet).is_some(),
        };

        let hits = signals.count();
        let confidence = hits as f64 / SIGNAL_COUNT as f64;
        // 边界: 恰好等于阈值不算命中
        let is_match = confidence > self.confidence_threshold && hits >= self.min_signals;

        debug!(hits, confidence, is_match, ?signals, "版式探测");

        LayoutDetection {
            is_match,
            confidence,
            signals,
        }
    }
}
