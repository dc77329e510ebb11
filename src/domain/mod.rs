// ==========================================
// 零售采购订单导入系统 - 领域模型层
// ==========================================
// 职责: 定义表格、订单明细、映射种类等领域类型
// 红线: 不含数据访问逻辑，不含解析逻辑
// ==========================================

pub mod order;
pub mod sheet;
pub mod types;

// 重导出核心类型
pub use order::{
    LayoutMetadata, LineItem, MappingPair, OrderMetadata, ParseOutcome, UnresolvedSet,
};
pub use sheet::{CellValue, RawSheet};
pub use types::{retailer_tags, LayoutKind, LineStatus, MappingKind, OrderType, SessionState};
