// ==========================================
// 零售采购订单导入系统 - 引擎层
// ==========================================
// 职责: 解析编排、会话状态机、商品目录补全、提交规划
// 红线: 引擎不读写文件，映射持久化交给仓储层
// ==========================================

pub mod catalog;
pub mod error;
pub mod orchestrator;
pub mod session;
pub mod submission;

pub use catalog::{CatalogEnricher, CatalogLookup, EnrichmentReport, ProductCatalog};
pub use error::{SubmissionError, SubmissionResult};
pub use orchestrator::{MappingSubmission, OrderResolution, ResolutionOrchestrator, ResolvedOrder};
pub use session::{ResolutionSession, SessionRegistry};
pub use submission::{
    AcceptedOrder, ErpSubmitter, ExcludedItem, FailedOrder, OrderDraft, SubmissionOptions,
    SubmissionPlan, SubmissionPlanner, SubmissionReceipt, SubmissionService, SubmissionSummary,
};
