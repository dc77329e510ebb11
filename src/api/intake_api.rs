// ==========================================
// 零售采购订单导入系统 - 订单导入 API
// ==========================================
// 职责: 对外门面，串起 读表 → 解析 → 人工补录 → 完成 → 目录补全 → 提交
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::{IntakeConfigReader, IntakeSettings};
use crate::domain::order::MappingPair;
use crate::domain::sheet::RawSheet;
use crate::domain::types::MappingKind;
use crate::engine::{
    CatalogEnricher, EnrichmentReport, ErpSubmitter, MappingSubmission, OrderResolution,
    ProductCatalog, ResolutionOrchestrator, ResolutionSession, ResolvedOrder, SubmissionOptions,
    SubmissionPlan, SubmissionPlanner, SubmissionService, SubmissionSummary,
};
use crate::importer::{SheetReader, UniversalSheetReader};
use crate::repository::{MappingStore, MappingTable};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// 提交结果（含目录补全统计）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitOrderResponse {
    pub enrichment: EnrichmentReport,
    pub summary: SubmissionSummary,
}

pub struct IntakeApi {
    orchestrator: ResolutionOrchestrator,
    settings: IntakeSettings,
    sheet_reader: Box<dyn SheetReader>,
}

impl IntakeApi {
    pub fn new(store: Arc<dyn MappingStore>, settings: IntakeSettings) -> Self {
        Self {
            orchestrator: ResolutionOrchestrator::new(store, &settings),
            settings,
            sheet_reader: Box::new(UniversalSheetReader),
        }
    }

    /// 从配置读取器加载设置后创建
    pub async fn from_config(
        store: Arc<dyn MappingStore>,
        config: &dyn IntakeConfigReader,
    ) -> ApiResult<Self> {
        let settings = IntakeSettings::load(config).await?;
        Ok(Self::new(store, settings))
    }

    pub fn with_sheet_reader(mut self, reader: Box<dyn SheetReader>) -> Self {
        self.sheet_reader = reader;
        self
    }

    pub fn settings(&self) -> &IntakeSettings {
        &self.settings
    }

    // ==========================================
    // 解析与人工补录
    // ==========================================

    /// 读取文件并解析
    pub fn import_file(
        &self,
        file_path: &Path,
        retailer_tag: &str,
        selected_columns: &[String],
    ) -> ApiResult<OrderResolution> {
        let sheet = self.sheet_reader.read_sheet(file_path)?;
        info!(file = %file_path.display(), rows = sheet.len(), "表格已读取");
        self.resolve_order(&sheet, retailer_tag, selected_columns)
    }

    pub fn resolve_order(
        &self,
        sheet: &RawSheet,
        retailer_tag: &str,
        selected_columns: &[String],
    ) -> ApiResult<OrderResolution> {
        if retailer_tag.trim().is_empty() {
            return Err(ApiError::InvalidInput("零售商标签不能为空".to_string()));
        }
        Ok(self
            .orchestrator
            .resolve_order(sheet, retailer_tag, selected_columns)?)
    }

    pub fn submit_operator_mappings(
        &self,
        session_id: &str,
        kind: MappingKind,
        pairs: &[MappingPair],
    ) -> ApiResult<MappingSubmission> {
        Ok(self
            .orchestrator
            .submit_operator_mappings(session_id, kind, pairs)?)
    }

    /// 以字符串指定映射种类（itens / lojas / product / store）
    pub fn submit_operator_mappings_by_name(
        &self,
        session_id: &str,
        kind: &str,
        pairs: &[MappingPair],
    ) -> ApiResult<MappingSubmission> {
        let kind = MappingKind::parse(kind)
            .ok_or_else(|| ApiError::InvalidInput(format!("未知的映射种类: {}", kind)))?;
        self.submit_operator_mappings(session_id, kind, pairs)
    }

    pub fn session(&self, session_id: &str) -> ApiResult<ResolutionSession> {
        Ok(self.orchestrator.session(session_id)?)
    }

    pub fn finalize(&self, session_id: &str) -> ApiResult<ResolvedOrder> {
        Ok(self.orchestrator.finalize(session_id)?)
    }

    pub fn purge_expired_sessions(&self) -> ApiResult<usize> {
        Ok(self.orchestrator.purge_expired()?)
    }

    pub fn mapping_snapshot(&self) -> MappingTable {
        self.orchestrator.mapping_store().snapshot()
    }

    // ==========================================
    // 目录补全与提交
    // ==========================================

    pub async fn enrich(
        &self,
        order: &mut ResolvedOrder,
        catalog: Arc<dyn ProductCatalog>,
    ) -> EnrichmentReport {
        let enricher = CatalogEnricher::new(
            catalog,
            &self.settings.fallback_packaging_from,
            &self.settings.fallback_packaging_to,
        );
        let layout = order.layout_kind();
        enricher.enrich(&mut order.items, layout).await
    }

    pub fn plan_submission(&self, order: &ResolvedOrder, options: &SubmissionOptions) -> SubmissionPlan {
        SubmissionPlanner::new(&self.settings).plan(order, options, Utc::now().timestamp_millis())
    }

    /// 目录补全 + 生成计划 + 逐单提交
    pub async fn submit_order(
        &self,
        mut order: ResolvedOrder,
        options: &SubmissionOptions,
        catalog: Arc<dyn ProductCatalog>,
        erp: Arc<dyn ErpSubmitter>,
    ) -> ApiResult<SubmitOrderResponse> {
        if order.items.is_empty() {
            return Err(ApiError::InvalidInput("订单没有可提交的明细".to_string()));
        }
        let enrichment = self.enrich(&mut order, catalog).await;
        let plan = self.plan_submission(&order, options);
        let summary = SubmissionService::new(erp).submit_plan(plan).await;
        Ok(SubmitOrderResponse {
            enrichment,
            summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryMappingStore;

    #[test]
    fn test_blank_retailer_rejected() {
        let api = IntakeApi::new(Arc::new(InMemoryMappingStore::new()), IntakeSettings::default());
        let err = api.resolve_order(&RawSheet::default(), "  ", &[]).unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput(_)));
    }

    #[test]
    fn test_unknown_kind_name_rejected() {
        let api = IntakeApi::new(Arc::new(InMemoryMappingStore::new()), IntakeSettings::default());
        let err = api
            .submit_operator_mappings_by_name("s", "cliente", &[])
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput(_)));
    }

    #[test]
    fn test_missing_file_is_import_error() {
        let api = IntakeApi::new(Arc::new(InMemoryMappingStore::new()), IntakeSettings::default());
        let err = api
            .import_file(Path::new("/nonexistent/pedido.xlsx"), "barbosa", &[])
            .unwrap_err();
        assert!(matches!(err, ApiError::ImportError(_)));
    }
}
