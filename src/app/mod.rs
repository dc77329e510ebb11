// ==========================================
// 零售采购订单导入系统 - 应用层
// ==========================================
// 职责: 组装配置、映射仓储与 API，供命令行入口使用
// ==========================================

pub mod state;

pub use state::{get_default_data_dir, get_default_db_path, get_default_mapping_path, AppState};
