// ==========================================
// 零售采购订单导入系统 - 应用状态
// ==========================================
// 职责: 组装配置库、映射文件与 API 实例
// ==========================================

use crate::api::{ApiResult, IntakeApi};
use crate::config::ConfigManager;
use crate::repository::{FileMappingStore, MappingStore};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// 数据目录环境变量（覆盖默认的用户数据目录）
pub const DATA_DIR_ENV: &str = "ORDER_INTAKE_DATA_DIR";

const DB_FILE_NAME: &str = "order_intake.db";
const MAPPING_FILE_NAME: &str = "conversao.json";

/// 应用状态
pub struct AppState {
    pub db_path: String,
    pub mapping_path: PathBuf,
    pub config: Arc<ConfigManager>,
    pub intake_api: Arc<IntakeApi>,
}

impl AppState {
    /// 按给定路径初始化
    pub async fn new(db_path: String, mapping_path: PathBuf) -> ApiResult<Self> {
        info!(db_path = %db_path, mapping_path = %mapping_path.display(), "初始化应用状态");

        let config = Arc::new(ConfigManager::new(&db_path)?);
        let store: Arc<dyn MappingStore> = Arc::new(FileMappingStore::new(&mapping_path));
        let intake_api = IntakeApi::from_config(store, config.as_ref()).await?;

        Ok(Self {
            db_path,
            mapping_path,
            config,
            intake_api: Arc::new(intake_api),
        })
    }

    /// 使用默认数据目录初始化
    pub async fn with_defaults() -> ApiResult<Self> {
        Self::new(get_default_db_path(), get_default_mapping_path()).await
    }
}

// ==========================================
// 默认路径
// ==========================================

/// 数据目录
///
/// # 返回
/// - 设置了 ORDER_INTAKE_DATA_DIR: 该目录
/// - 否则: 用户数据目录/retail-order-intake（取不到时为当前目录）
pub fn get_default_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        let trimmed = dir.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }

    match dirs::data_dir() {
        Some(data_dir) => {
            let dir = data_dir.join("retail-order-intake");
            // 创建失败时由后续打开文件报错
            std::fs::create_dir_all(&dir).ok();
            dir
        }
        None => PathBuf::from("."),
    }
}

pub fn get_default_db_path() -> String {
    get_default_data_dir()
        .join(DB_FILE_NAME)
        .to_string_lossy()
        .to_string()
}

pub fn get_default_mapping_path() -> PathBuf {
    get_default_data_dir().join(MAPPING_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_paths_have_expected_names() {
        assert!(get_default_db_path().ends_with(".db"));
        assert!(get_default_mapping_path().ends_with(MAPPING_FILE_NAME));
    }

    #[tokio::test]
    async fn test_app_state_initializes_in_temp_dir() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("config.db").to_string_lossy().to_string();
        let mapping_path = dir.path().join("conversao.json");

        let state = AppState::new(db_path, mapping_path).await.unwrap();

        assert_eq!(state.intake_api.settings().default_price_table, 3);
        assert!(state.intake_api.mapping_snapshot().retailers.is_empty());
    }
}
