// ==========================================
// 零售采购订单导入系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: De→Para 映射持久化，屏蔽文件细节
// ==========================================

pub mod error;
pub mod mapping_store;

// 重导出核心仓储
pub use error::{RepositoryError, RepositoryResult};
pub use mapping_store::{
    FileMappingStore, InMemoryMappingStore, MappingEntry, MappingStore, MappingTable,
    RetailerMappings, UpsertOutcome,
};
