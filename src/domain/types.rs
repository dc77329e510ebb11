// ==========================================
// 零售采购订单导入系统 - 领域类型定义
// ==========================================
// 职责: 映射种类、会话状态、行状态、订单类型等枚举
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 映射种类 (Mapping Kind)
// ==========================================
// 持久化键: 商品 → "itens"，门店 → "lojas"（与既有映射文件一致）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MappingKind {
    Product, // 商品编码
    Store,   // 门店/中心编码
}

impl MappingKind {
    /// 映射文件中对应的列表名
    pub fn storage_key(&self) -> &'static str {
        match self {
            MappingKind::Product => "itens",
            MappingKind::Store => "lojas",
        }
    }

    /// 从外部传入的字符串解析（兼容持久化键与英文名）
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "product" | "produto" | "itens" | "item" => Some(MappingKind::Product),
            "store" | "loja" | "lojas" => Some(MappingKind::Store),
            _ => None,
        }
    }
}

impl fmt::Display for MappingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MappingKind::Product => write!(f, "PRODUCT"),
            MappingKind::Store => write!(f, "STORE"),
        }
    }
}

// ==========================================
// 解析会话状态 (Session State)
// ==========================================
// 状态流转: PARSING → AWAITING_OPERATOR_INPUT → READY
//           PARSING → READY（无待识别编码）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    Parsing,                // 解析中
    AwaitingOperatorInput,  // 等待人工补录映射
    Ready,                  // 可提交 ERP
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Parsing => write!(f, "PARSING"),
            SessionState::AwaitingOperatorInput => write!(f, "AWAITING_OPERATOR_INPUT"),
            SessionState::Ready => write!(f, "READY"),
        }
    }
}

// ==========================================
// 行状态 (Line Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LineStatus {
    #[default]
    #[serde(rename = "OK")]
    Ok,
}

impl fmt::Display for LineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineStatus::Ok => write!(f, "OK"),
        }
    }
}

// ==========================================
// 版式种类 (Layout Kind)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LayoutKind {
    FixedColumn,   // A: 首行固定表头
    LabeledHeader, // B: 标签表头 + 合计行
    MetadataBlock, // C: 元数据块 + 明细表
}

impl LayoutKind {
    /// 该版式默认使用的映射桶（零售商键）
    pub fn default_bucket(&self) -> &'static str {
        match self {
            LayoutKind::FixedColumn => retailer_tags::BARBOSA,
            LayoutKind::LabeledHeader => retailer_tags::REDEX,
            LayoutKind::MetadataBlock => retailer_tags::GENERIC,
        }
    }

    /// 是否对该版式应用包装回退规则（CX → FD）
    pub fn uses_packaging_fallback(&self) -> bool {
        matches!(self, LayoutKind::FixedColumn | LayoutKind::LabeledHeader)
    }
}

impl fmt::Display for LayoutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutKind::FixedColumn => write!(f, "FIXED_COLUMN"),
            LayoutKind::LabeledHeader => write!(f, "LABELED_HEADER"),
            LayoutKind::MetadataBlock => write!(f, "METADATA_BLOCK"),
        }
    }
}

/// 已知零售商标签
pub mod retailer_tags {
    pub const BARBOSA: &str = "barbosa";
    pub const REDEX: &str = "redex";
    pub const GENERIC: &str = "generic";
}

// ==========================================
// 订单类型 (Order Type)
// ==========================================
// ERP 代码: 销售=1, 赠品=5, 议价=102
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Sale,
    Bonus,
    #[default]
    Negotiation,
}

impl OrderType {
    pub fn erp_code(&self) -> i64 {
        match self {
            OrderType::Sale => 1,
            OrderType::Bonus => 5,
            OrderType::Negotiation => 102,
        }
    }

    /// 解析表单值（venda / bonificacao / 其他 → 议价）
    pub fn from_form_value(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "venda" | "sale" => OrderType::Sale,
            "bonificacao" | "bonificação" | "bonus" => OrderType::Bonus,
            _ => OrderType::Negotiation,
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderType::Sale => write!(f, "SALE"),
            OrderType::Bonus => write!(f, "BONUS"),
            OrderType::Negotiation => write!(f, "NEGOTIATION"),
        }
    }
}
