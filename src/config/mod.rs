// ==========================================
// 零售采购订单导入系统 - 配置层
// ==========================================
// 职责: 系统配置管理
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod intake_config_trait;
pub mod settings;

pub use config_manager::{config_keys, ConfigManager};
pub use intake_config_trait::{ConfigReadResult, IntakeConfigReader};
pub use settings::IntakeSettings;
