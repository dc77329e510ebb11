// ==========================================
// 零售采购订单导入系统 - 订单提交规划
// ==========================================
// 职责:
// - READY 明细按门店（客户）分组为订单草稿
// - 生成订单级元数据：付款条件、订单类型、价格表、业务员、订单号
// - 逐单调用 ERP 提交，收集成功/失败（部分成功是常态）
// 订单号规则:
// - C: EDI PEDIDO (<n>)
// - A: 单据号
// - B: Rede X (Loja <门店>) Pedido <n>
// - 兜底: PEDIDO-<门店>-<毫秒时间戳>
// ==========================================

use crate::config::IntakeSettings;
use crate::domain::order::{LayoutMetadata, LineItem};
use crate::domain::types::{LayoutKind, OrderType};
use crate::engine::error::SubmissionResult;
use crate::engine::orchestrator::ResolvedOrder;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

// ==========================================
// 草稿与选项
// ==========================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubmissionOptions {
    pub order_type: OrderType,
    pub sales_rep_code: Option<String>,
    /// 覆盖零售商默认付款条件
    pub payment_terms: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDraft {
    pub client_id: String,
    pub store_key: String,
    pub order_number: String,
    pub payment_terms: Option<String>,
    pub order_type: OrderType,
    pub order_type_code: i64,
    pub price_table: i64,
    pub sales_rep_code: Option<String>,
    pub items: Vec<LineItem>,
}

impl OrderDraft {
    pub fn total(&self) -> f64 {
        self.items.iter().map(|i| i.line_total).sum()
    }
}

/// 未进入草稿的明细
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExcludedItem {
    pub row_number: usize,
    pub source_code: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubmissionPlan {
    pub drafts: Vec<OrderDraft>,
    pub excluded: Vec<ExcludedItem>,
}

// ==========================================
// SubmissionPlanner
// ==========================================
pub struct SubmissionPlanner<'a> {
    settings: &'a IntakeSettings,
}

impl<'a> SubmissionPlanner<'a> {
    pub fn new(settings: &'a IntakeSettings) -> Self {
        Self { settings }
    }

    /// 生成提交计划
    ///
    /// # 参数
    /// - now_millis: 兜底订单号使用的时间戳
    pub fn plan(
        &self,
        order: &ResolvedOrder,
        options: &SubmissionOptions,
        now_millis: i64,
    ) -> SubmissionPlan {
        let layout = order.layout_kind();
        let mut plan = SubmissionPlan::default();

        for item in &order.items {
            if let Some(reason) = exclusion_reason(item) {
                plan.excluded.push(ExcludedItem {
                    row_number: item.row_number,
                    source_code: item.source_code.clone(),
                    reason,
                });
                continue;
            }

            let client_id = item.group_key().to_string();
            match plan.drafts.iter().position(|d| d.client_id == client_id) {
                Some(index) => plan.drafts[index].items.push(item.clone()),
                None => plan.drafts.push(OrderDraft {
                    order_number: order_number(layout, &order.metadata, item, now_millis),
                    payment_terms: self.payment_terms(layout, &order.metadata, options),
                    order_type: options.order_type,
                    order_type_code: options.order_type.erp_code(),
                    price_table: self.settings.default_price_table,
                    sales_rep_code: options
                        .sales_rep_code
                        .clone()
                        .or_else(|| metadata_sales_rep(&order.metadata)),
                    store_key: item.store_key.clone(),
                    client_id,
                    items: vec![item.clone()],
                }),
            }
        }

        info!(
            session_id = %order.session_id,
            drafts = plan.drafts.len(),
            excluded = plan.excluded.len(),
            "提交计划已生成"
        );
        plan
    }

    fn payment_terms(
        &self,
        layout: LayoutKind,
        metadata: &Option<LayoutMetadata>,
        options: &SubmissionOptions,
    ) -> Option<String> {
        if let Some(terms) = &options.payment_terms {
            return Some(terms.clone());
        }
        match metadata {
            Some(LayoutMetadata::MetadataBlock(meta)) => meta.payment_terms.clone(),
            _ => self
                .settings
                .payment_terms_for(layout.default_bucket())
                .map(String::from),
        }
    }
}

fn exclusion_reason(item: &LineItem) -> Option<String> {
    if item.resolved_product_id.is_none() {
        return Some("商品编码未映射".to_string());
    }
    if item.resolved_store_id.is_none() {
        return Some("门店编码未映射".to_string());
    }
    item.catalog_error.clone()
}

fn metadata_sales_rep(metadata: &Option<LayoutMetadata>) -> Option<String> {
    match metadata {
        Some(LayoutMetadata::MetadataBlock(meta)) => meta.sales_rep_code.clone(),
        _ => None,
    }
}

fn order_number(
    layout: LayoutKind,
    metadata: &Option<LayoutMetadata>,
    item: &LineItem,
    now_millis: i64,
) -> String {
    let generated = match (layout, metadata) {
        (LayoutKind::MetadataBlock, Some(LayoutMetadata::MetadataBlock(meta))) => meta
            .order_number
            .as_ref()
            .map(|n| format!("EDI PEDIDO ({})", n)),
        (LayoutKind::FixedColumn, _) => {
            Some(item.order_number.clone()).filter(|n| !n.trim().is_empty())
        }
        (LayoutKind::LabeledHeader, Some(LayoutMetadata::LabeledHeader { order_number })) => {
            order_number
                .as_ref()
                .map(|n| format!("Rede X (Loja {}) Pedido {}", item.store_key, n))
        }
        _ => None,
    };
    generated.unwrap_or_else(|| format!("PEDIDO-{}-{}", item.store_key, now_millis))
}

// ==========================================
// ErpSubmitter Trait（外部协作方）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub erp_order_id: String,
    pub items_accepted: usize,
    pub items_rejected: usize,
}

#[async_trait]
pub trait ErpSubmitter: Send + Sync {
    /// 客户价格表；None 表示使用默认价格表
    async fn price_table(&self, client_id: &str) -> SubmissionResult<Option<i64>>;

    async fn submit(&self, draft: &OrderDraft) -> SubmissionResult<SubmissionReceipt>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceptedOrder {
    pub order_number: String,
    pub client_id: String,
    pub receipt: SubmissionReceipt,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedOrder {
    pub order_number: String,
    pub client_id: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubmissionSummary {
    pub accepted: Vec<AcceptedOrder>,
    pub failed: Vec<FailedOrder>,
    pub excluded: Vec<ExcludedItem>,
}

impl SubmissionSummary {
    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty() && self.excluded.is_empty()
    }
}

// ==========================================
// SubmissionService
// ==========================================
pub struct SubmissionService {
    erp: Arc<dyn ErpSubmitter>,
}

impl SubmissionService {
    pub fn new(erp: Arc<dyn ErpSubmitter>) -> Self {
        Self { erp }
    }

    /// 逐单提交；单单失败不影响其他订单
    pub async fn submit_plan(&self, plan: SubmissionPlan) -> SubmissionSummary {
        let mut summary = SubmissionSummary {
            excluded: plan.excluded,
            ..Default::default()
        };

        for mut draft in plan.drafts {
            match self.erp.price_table(&draft.client_id).await {
                Ok(Some(table)) => draft.price_table = table,
                Ok(None) => {}
                Err(e) => {
                    warn!(client_id = %draft.client_id, error = %e, "价格表查询失败，使用默认价格表");
                }
            }

            match self.erp.submit(&draft).await {
                Ok(receipt) => {
                    info!(
                        order_number = %draft.order_number,
                        erp_order_id = %receipt.erp_order_id,
                        items_rejected = receipt.items_rejected,
                        "订单已提交"
                    );
                    summary.accepted.push(AcceptedOrder {
                        order_number: draft.order_number,
                        client_id: draft.client_id,
                        receipt,
                    });
                }
                Err(e) => {
                    warn!(order_number = %draft.order_number, error = %e, "订单提交失败");
                    summary.failed.push(FailedOrder {
                        order_number: draft.order_number,
                        client_id: draft.client_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            accepted = summary.accepted.len(),
            failed = summary.failed.len(),
            excluded = summary.excluded.len(),
            "提交完成"
        );
        summary
    }
}
