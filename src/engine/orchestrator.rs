// ==========================================
// 零售采购订单导入系统 - 解析编排器
// ==========================================
// 状态机: PARSING → AWAITING_OPERATOR_INPUT → READY
//         PARSING → READY（无待识别编码）
// 流程:
// 1. 按零售商标签选版式；未知标签先跑探测器
// 2. 解析 → 明细 + 待识别编码，登记会话
// 3. 人工补录映射 → 写入映射仓储 → 移除已覆盖编码
// 4. 全部覆盖 → READY；finalize 时从映射仓储重新解析编码
// 不自动重跑解析器
// ==========================================

use crate::config::IntakeSettings;
use crate::domain::order::{LayoutMetadata, LineItem, MappingPair, UnresolvedSet};
use crate::domain::sheet::RawSheet;
use crate::domain::types::{LayoutKind, MappingKind, SessionState};
use crate::engine::session::{ResolutionSession, SessionRegistry};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::layout_detector::LayoutDetector;
use crate::importer::layouts::{parser_for, LayoutSelection};
use crate::repository::{MappingStore, UpsertOutcome};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};

// ==========================================
// 对外返回结构
// ==========================================

/// resolve_order 的返回
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderResolution {
    pub session_id: String,
    pub state: SessionState,
    pub selection: LayoutSelection,
    pub items: Vec<LineItem>,
    #[serde(flatten)]
    pub unresolved: UnresolvedSet,
    pub metadata: Option<LayoutMetadata>,
}

/// submit_operator_mappings 的返回
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MappingSubmission {
    pub session_id: String,
    pub state: Option<SessionState>,
    pub inserted: usize,
    pub already_mapped: usize,
    pub ignored: usize,
    pub failed: usize,
    pub remaining: UnresolvedSet,
}

/// finalize 的返回：可交给 ERP 提交的订单
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedOrder {
    pub session_id: String,
    pub retailer_tag: String,
    pub mapping_bucket: String,
    pub selection: LayoutSelection,
    pub items: Vec<LineItem>,
    pub metadata: Option<LayoutMetadata>,
}

impl ResolvedOrder {
    pub fn layout_kind(&self) -> LayoutKind {
        self.selection.layout_kind()
    }
}

// ==========================================
// ResolutionOrchestrator
// ==========================================
pub struct ResolutionOrchestrator {
    store: Arc<dyn MappingStore>,
    detector: LayoutDetector,
    reject_unrecognized_layouts: bool,
    sessions: SessionRegistry,
}

impl ResolutionOrchestrator {
    /// 创建编排器
    ///
    /// # 参数
    /// - store: 映射仓储
    /// - settings: 探测阈值、会话有效期、未识别版式策略
    pub fn new(store: Arc<dyn MappingStore>, settings: &IntakeSettings) -> Self {
        Self {
            store,
            detector: settings.detector(),
            reject_unrecognized_layouts: settings.reject_unrecognized_layouts,
            sessions: SessionRegistry::new(settings.session_ttl_minutes),
        }
    }

    pub fn mapping_store(&self) -> &Arc<dyn MappingStore> {
        &self.store
    }

    /// 选择版式
    ///
    /// 未知标签: 探测命中 → C 版式；未命中 → 默认仍按 C 版式尽力解析，
    /// 配置了 reject_unrecognized_layouts 时返回 LayoutNotRecognized
    pub fn select_layout(&self, sheet: &RawSheet, retailer_tag: &str) -> ImportResult<LayoutSelection> {
        if let Some(selection) = LayoutSelection::from_tag(retailer_tag) {
            return Ok(selection);
        }

        let detection = self.detector.detect(sheet);
        if detection.is_match {
            info!(
                retailer = retailer_tag,
                confidence = detection.confidence,
                "未知零售商，探测命中 C 版式"
            );
        } else if self.reject_unrecognized_layouts {
            return Err(ImportError::LayoutNotRecognized {
                retailer: retailer_tag.to_string(),
                confidence: detection.confidence,
                threshold: self.detector.confidence_threshold(),
            });
        } else {
            warn!(
                retailer = retailer_tag,
                confidence = detection.confidence,
                signals = ?detection.signals,
                "未知零售商，探测置信度不足，仍按 C 版式尽力解析"
            );
        }
        Ok(LayoutSelection::AutoDetected { detection })
    }

    /// 解析订单并登记会话
    #[instrument(skip(self, sheet, selected_columns), fields(rows = sheet.len()))]
    pub fn resolve_order(
        &self,
        sheet: &RawSheet,
        retailer_tag: &str,
        selected_columns: &[String],
    ) -> ImportResult<OrderResolution> {
        let now = Utc::now();
        self.sessions.purge_expired(now)?;

        let selection = self.select_layout(sheet, retailer_tag)?;
        let mut session = ResolutionSession::new(retailer_tag, selection, now);

        let parser = parser_for(session.selection.layout_kind());
        let outcome = parser.parse(
            sheet,
            selected_columns,
            &session.mapping_bucket,
            self.store.as_ref(),
        );

        if outcome.items.is_empty() {
            warn!(
                session_id = %session.session_id,
                layout = %parser.kind(),
                "解析结果为空，请检查表格内容"
            );
        }

        session.items = outcome.items;
        session.unresolved = outcome.unresolved;
        session.metadata = outcome.metadata;
        session.settle(now);

        info!(
            session_id = %session.session_id,
            layout = %parser.kind(),
            items = session.items.len(),
            unresolved_products = session.unresolved.unresolved_products.len(),
            unresolved_stores = session.unresolved.unresolved_stores.len(),
            state = %session.state,
            "订单解析完成"
        );

        let resolution = OrderResolution {
            session_id: session.session_id.clone(),
            state: session.state,
            selection: session.selection.clone(),
            items: session.items.clone(),
            unresolved: session.unresolved.clone(),
            metadata: session.metadata.clone(),
        };
        self.sessions.insert(session)?;
        Ok(resolution)
    }

    /// 接收人工补录映射
    ///
    /// para 为空的条目忽略；其余写入映射仓储（已有映射保留原值）。
    /// 已被映射覆盖的待识别编码从会话中移除，全部覆盖时进入 READY。
    #[instrument(skip(self, pairs), fields(pair_count = pairs.len()))]
    pub fn submit_operator_mappings(
        &self,
        session_id: &str,
        kind: MappingKind,
        pairs: &[MappingPair],
    ) -> ImportResult<MappingSubmission> {
        let bucket = self.sessions.with_session(session_id, Utc::now(), |session| {
            session.ensure_state(&[SessionState::AwaitingOperatorInput, SessionState::Ready])?;
            Ok(session.mapping_bucket.clone())
        })?;

        let mut report = MappingSubmission {
            session_id: session_id.to_string(),
            ..Default::default()
        };

        // 映射写入不占用会话锁
        for pair in pairs {
            if pair.to.trim().is_empty() {
                report.ignored += 1;
                continue;
            }
            match self.store.upsert(&bucket, kind, &pair.from, &pair.to) {
                UpsertOutcome::Inserted => report.inserted += 1,
                UpsertOutcome::AlreadyMapped { .. } => report.already_mapped += 1,
                UpsertOutcome::Ignored => report.ignored += 1,
                UpsertOutcome::Failed(_) => report.failed += 1,
            }
        }

        let store = self.store.as_ref();
        let (state, remaining) = self.sessions.with_session(session_id, Utc::now(), |session| {
            session
                .unresolved
                .retain(kind, |code| store.lookup(&bucket, kind, code).is_none());
            session.settle(Utc::now());
            Ok((session.state, session.unresolved.clone()))
        })?;

        info!(
            session_id,
            kind = %kind,
            inserted = report.inserted,
            already_mapped = report.already_mapped,
            ignored = report.ignored,
            failed = report.failed,
            remaining = remaining.total(),
            state = %state,
            "人工映射已处理"
        );

        report.state = Some(state);
        report.remaining = remaining;
        Ok(report)
    }

    /// 结束会话：从映射仓储补齐编码后返回订单，会话随即销毁
    ///
    /// 仅 READY 状态可调用
    #[instrument(skip(self))]
    pub fn finalize(&self, session_id: &str) -> ImportResult<ResolvedOrder> {
        let mut session = self.sessions.with_session(session_id, Utc::now(), |session| {
            session.ensure_state(&[SessionState::Ready])?;
            Ok(session.clone())
        })?;
        self.sessions.remove(session_id)?;

        let layout = session.selection.layout_kind();
        for item in session.items.iter_mut() {
            self.re_resolve(&session.mapping_bucket, layout, item);
        }

        let unresolved_left = session.items.iter().filter(|i| !i.is_resolved()).count();
        if unresolved_left > 0 {
            warn!(session_id, unresolved_left, "部分明细仍缺少门店或商品编码");
        }
        info!(session_id, items = session.items.len(), "会话已完成");

        Ok(ResolvedOrder {
            session_id: session.session_id,
            retailer_tag: session.retailer_tag,
            mapping_bucket: session.mapping_bucket,
            selection: session.selection,
            items: session.items,
            metadata: session.metadata,
        })
    }

    fn re_resolve(&self, bucket: &str, layout: LayoutKind, item: &mut LineItem) {
        // C 版式商品编码即内部编码
        if item.resolved_product_id.is_none() && layout != LayoutKind::MetadataBlock {
            item.resolved_product_id = self.store.lookup(bucket, MappingKind::Product, &item.source_code);
        }
        if item.resolved_store_id.is_none() && !item.store_key.trim().is_empty() {
            item.resolved_store_id = self.store.lookup(bucket, MappingKind::Store, &item.store_key);
        }
    }

    /// 查询会话快照
    pub fn session(&self, session_id: &str) -> ImportResult<ResolutionSession> {
        self.sessions.get(session_id, Utc::now())
    }

    /// 清理过期会话
    pub fn purge_expired(&self) -> ImportResult<usize> {
        self.sessions.purge_expired(Utc::now())
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }
}
