// ==========================================
// 零售采购订单导入系统 - 订单领域模型
// ==========================================
// 职责: 标准化明细行、订单元数据、待识别编码集合、解析结果
// 用途: 解析层写入，编排层/提交层只读
// ==========================================

use crate::domain::types::{LineStatus, MappingKind};
use serde::{Deserialize, Serialize};

// ==========================================
// LineItem - 标准化订单明细行
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub row_number: usize,                   // 源表格行号（1 起始）

    // ===== 商品 =====
    pub source_code: String,                 // 表格中的原始商品编码
    pub resolved_product_id: Option<String>, // ERP 内部商品编码（None = 未识别）
    pub description: String,
    pub packaging: String,                   // 包装单位（CX / FD ...）
    pub supplier_ref: Option<String>,        // 供应商参考号（仅 B 版式）

    // ===== 门店 =====
    pub store_key: String,                   // 表格中的原始门店/中心编码
    pub resolved_store_id: Option<String>,   // ERP 内部客户编码（None = 未识别）

    // ===== 数量与金额 =====
    pub quantity: f64,
    pub unit_price: f64,
    pub line_total: f64,

    pub order_number: String,
    pub status: LineStatus,

    // 商品目录查询失败时的逐行错误标记
    pub catalog_error: Option<String>,
}

impl LineItem {
    /// 商品与门店均已映射
    pub fn is_resolved(&self) -> bool {
        self.resolved_product_id.is_some() && self.resolved_store_id.is_some()
    }

    /// 分组键：优先使用已映射门店，否则回退到原始门店编码
    pub fn group_key(&self) -> &str {
        self.resolved_store_id.as_deref().unwrap_or(&self.store_key)
    }
}

// ==========================================
// OrderMetadata - C 版式订单元数据（第 0-4 行）
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderMetadata {
    pub payment_terms: Option<String>,  // COND PAGTO
    pub tax_id: Option<String>,         // CNPJ
    pub client_code: Option<String>,    // COD. CLIENTE
    pub order_number: Option<String>,   // N° PEDIDO
    pub sales_rep_code: Option<String>, // VENDEDOR
}

// ==========================================
// LayoutMetadata - 各版式的附加解析信息
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "layout", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LayoutMetadata {
    /// A: 无主键行携带的单据号（按出现顺序）
    FixedColumn { document_numbers: Vec<String> },
    /// B: 第 3 行提取的零售商订单号
    LabeledHeader { order_number: Option<String> },
    /// C: 元数据块
    MetadataBlock(OrderMetadata),
}

// ==========================================
// UnresolvedSet - 待识别编码集合
// ==========================================
// 约束: 去重、保持首次出现顺序、空白编码不入队
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnresolvedSet {
    pub unresolved_products: Vec<String>,
    pub unresolved_stores: Vec<String>,
}

impl UnresolvedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: MappingKind, code: &str) {
        let code = code.trim();
        if code.is_empty() {
            return;
        }
        let bucket = self.bucket_mut(kind);
        if !bucket.iter().any(|c| c == code) {
            bucket.push(code.to_string());
        }
    }

    pub fn codes(&self, kind: MappingKind) -> &[String] {
        match kind {
            MappingKind::Product => &self.unresolved_products,
            MappingKind::Store => &self.unresolved_stores,
        }
    }

    /// 仅保留满足条件的编码
    pub fn retain<F>(&mut self, kind: MappingKind, mut keep: F)
    where
        F: FnMut(&str) -> bool,
    {
        self.bucket_mut(kind).retain(|c| keep(c));
    }

    pub fn is_empty(&self) -> bool {
        self.unresolved_products.is_empty() && self.unresolved_stores.is_empty()
    }

    pub fn total(&self) -> usize {
        self.unresolved_products.len() + self.unresolved_stores.len()
    }

    fn bucket_mut(&mut self, kind: MappingKind) -> &mut Vec<String> {
        match kind {
            MappingKind::Product => &mut self.unresolved_products,
            MappingKind::Store => &mut self.unresolved_stores,
        }
    }
}

// ==========================================
// ParseOutcome - 单次解析结果
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParseOutcome {
    pub items: Vec<LineItem>,
    #[serde(flatten)]
    pub unresolved: UnresolvedSet,
    pub metadata: Option<LayoutMetadata>,
}

impl ParseOutcome {
    /// 未找到表头时的空结果
    pub fn empty(metadata: Option<LayoutMetadata>) -> Self {
        Self {
            items: Vec::new(),
            unresolved: UnresolvedSet::new(),
            metadata,
        }
    }

    pub fn unresolved_products(&self) -> &[String] {
        &self.unresolved.unresolved_products
    }

    pub fn unresolved_stores(&self) -> &[String] {
        &self.unresolved.unresolved_stores
    }

    /// C 版式的订单元数据
    pub fn order_metadata(&self) -> Option<&OrderMetadata> {
        match &self.metadata {
            Some(LayoutMetadata::MetadataBlock(meta)) => Some(meta),
            _ => None,
        }
    }
}

// ==========================================
// MappingPair - 人工补录的 de → para
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingPair {
    pub from: String,
    pub to: String,
}

impl MappingPair {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}
