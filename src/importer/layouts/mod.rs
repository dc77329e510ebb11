// ==========================================
// 零售采购订单导入系统 - 版式解析器
// ==========================================
// A: fixed_column    首行固定表头（barbosa）
// B: labeled_header  标签表头 + 合计行（redex）
// C: metadata_block  元数据块 + 明细表（generic / 自动探测）
// ==========================================

pub mod fixed_column;
pub mod labeled_header;
pub mod metadata_block;

pub use fixed_column::FixedColumnParser;
pub use labeled_header::LabeledHeaderParser;
pub use metadata_block::MetadataBlockParser;

use crate::domain::order::ParseOutcome;
use crate::domain::sheet::RawSheet;
use crate::domain::types::{retailer_tags, LayoutKind};
use crate::importer::layout_detector::LayoutDetection;
use crate::repository::MappingStore;
use serde::{Deserialize, Serialize};

// ==========================================
// LayoutParser Trait
// ==========================================
// 约束: 解析层不返回错误；找不到表头时返回空结果并记录日志
pub trait LayoutParser: Send + Sync {
    fn kind(&self) -> LayoutKind;

    /// # 参数
    /// - sheet: 原始表格
    /// - selected_columns: 调用方选定的列名（仅 A 版式使用）
    /// - retailer: 映射桶
    /// - store: 映射仓储
    fn parse(
        &self,
        sheet: &RawSheet,
        selected_columns: &[String],
        retailer: &str,
        store: &dyn MappingStore,
    ) -> ParseOutcome;
}

/// 按版式取解析器
pub fn parser_for(kind: LayoutKind) -> Box<dyn LayoutParser> {
    match kind {
        LayoutKind::FixedColumn => Box::new(FixedColumnParser),
        LayoutKind::LabeledHeader => Box::new(LabeledHeaderParser),
        LayoutKind::MetadataBlock => Box::new(MetadataBlockParser),
    }
}

// ==========================================
// LayoutSelection - 版式选择结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "selection", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LayoutSelection {
    FixedColumn,
    LabeledHeader,
    MetadataBlock,
    /// 未知零售商，经探测器打分后按 C 版式解析
    AutoDetected { detection: LayoutDetection },
}

impl LayoutSelection {
    /// 按零售商标签选择；未知标签返回 None（需走探测器）
    pub fn from_tag(retailer_tag: &str) -> Option<Self> {
        match retailer_tag.trim().to_lowercase().as_str() {
            retailer_tags::BARBOSA => Some(LayoutSelection::FixedColumn),
            retailer_tags::REDEX => Some(LayoutSelection::LabeledHeader),
            retailer_tags::GENERIC => Some(LayoutSelection::MetadataBlock),
            _ => None,
        }
    }

    pub fn layout_kind(&self) -> LayoutKind {
        match self {
            LayoutSelection::FixedColumn => LayoutKind::FixedColumn,
            LayoutSelection::LabeledHeader => LayoutKind::LabeledHeader,
            LayoutSelection::MetadataBlock | LayoutSelection::AutoDetected { .. } => {
                LayoutKind::MetadataBlock
            }
        }
    }

    /// 探测置信度（仅自动探测时存在）
    pub fn confidence(&self) -> Option<f64> {
        match self {
            LayoutSelection::AutoDetected { detection } => Some(detection.confidence),
            _ => None,
        }
    }

    /// 映射桶：自动探测统一使用 generic 桶
    pub fn mapping_bucket(&self) -> &'static str {
        self.layout_kind().default_bucket()
    }
}
