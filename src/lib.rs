// ==========================================
// 零售采购订单导入系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite（配置）+ JSON（De→Para 映射）
// 系统定位: 多版式采购订单表格 → 标准化明细 → ERP 提交
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 映射持久化
pub mod repository;

// 导入层 - 读表与版式解析
pub mod importer;

// 引擎层 - 编排、会话、补全、提交
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 状态组装
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

pub use domain::{
    CellValue, LayoutKind, LineItem, MappingKind, MappingPair, OrderMetadata, ParseOutcome,
    RawSheet, SessionState, UnresolvedSet,
};

pub use repository::{FileMappingStore, InMemoryMappingStore, MappingStore, UpsertOutcome};

pub use importer::{LayoutDetection, LayoutDetector, LayoutSelection};

pub use engine::{OrderResolution, ResolutionOrchestrator, ResolvedOrder};

pub use api::{ApiError, ApiResult, IntakeApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "零售采购订单导入系统";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
