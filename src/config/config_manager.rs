// ==========================================
// 零售采购订单导入系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写
// 存储: config_kv 表 (scope_id + key → value)
// ==========================================

use crate::config::intake_config_trait::{ConfigReadResult, IntakeConfigReader};
use crate::db::{configure_sqlite_connection, ensure_config_schema, open_sqlite_connection};
use crate::domain::types::retailer_tags;
use crate::importer::layout_detector::{DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_MIN_SIGNALS};
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tracing::warn;

const GLOBAL_SCOPE: &str = "global";

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例（自动建表）
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        ensure_config_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            configure_sqlite_connection(&guard)?;
            ensure_config_schema(&guard)?;
        }
        Ok(Self { conn })
    }

    /// 读取 global scope 的配置值
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_global_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = ?1 AND key = ?2",
            params![GLOBAL_SCOPE, key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 写入 global scope 的配置值（存在则覆盖）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;

        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value, updated_at)
             VALUES (?1, ?2, ?3, datetime('now'))
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?3, updated_at = datetime('now')",
            params![GLOBAL_SCOPE, key, value],
        )?;
        Ok(())
    }

    /// 获取所有 global 配置的快照（JSON，按键排序）
    pub fn get_config_snapshot(&self) -> RepositoryResult<String> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = ?1 ORDER BY key")?;
        let rows = stmt.query_map(params![GLOBAL_SCOPE], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        serde_json::to_string(&json!(config_map))
            .map_err(|e| RepositoryError::InternalError(e.to_string()))
    }

    /// 读取并解析配置；不存在返回默认值，格式错误告警后返回默认值
    fn get_parsed_or_default<T>(&self, key: &str, default: T) -> RepositoryResult<T>
    where
        T: FromStr,
    {
        match self.get_global_config_value(key)? {
            None => Ok(default),
            Some(raw) => match raw.trim().parse::<T>() {
                Ok(value) => Ok(value),
                Err(_) => {
                    warn!(key, value = %raw, "配置值格式错误，使用默认值");
                    Ok(default)
                }
            },
        }
    }

    fn get_text_or_default(&self, key: &str, default: &str) -> RepositoryResult<String> {
        Ok(self
            .get_global_config_value(key)?
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| default.to_string()))
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

// ==========================================
// IntakeConfigReader 实现
// ==========================================
#[async_trait]
impl IntakeConfigReader for ConfigManager {
    async fn get_detector_threshold(&self) -> ConfigReadResult<f64> {
        Ok(self.get_parsed_or_default(config_keys::DETECTOR_THRESHOLD, DEFAULT_CONFIDENCE_THRESHOLD)?)
    }

    async fn get_detector_min_signals(&self) -> ConfigReadResult<usize> {
        Ok(self.get_parsed_or_default(config_keys::DETECTOR_MIN_SIGNALS, DEFAULT_MIN_SIGNALS)?)
    }

    async fn get_reject_unrecognized_layouts(&self) -> ConfigReadResult<bool> {
        let raw = match self.get_global_config_value(config_keys::REJECT_UNRECOGNIZED_LAYOUTS)? {
            Some(raw) => raw,
            None => return Ok(false),
        };
        Ok(parse_flag(&raw).unwrap_or_else(|| {
            warn!(value = %raw, "reject_unrecognized_layouts 格式错误，使用默认值 false");
            false
        }))
    }

    async fn get_session_ttl_minutes(&self) -> ConfigReadResult<i64> {
        let ttl = self.get_parsed_or_default(config_keys::SESSION_TTL_MINUTES, 60i64)?;
        if ttl <= 0 {
            warn!(ttl, "会话有效期必须为正数，使用默认值 60");
            return Ok(60);
        }
        Ok(ttl)
    }

    async fn get_fallback_packaging(&self) -> ConfigReadResult<(String, String)> {
        let from = self.get_text_or_default(config_keys::FALLBACK_PACKAGING_FROM, "CX")?;
        let to = self.get_text_or_default(config_keys::FALLBACK_PACKAGING_TO, "FD")?;
        Ok((from.to_uppercase(), to.to_uppercase()))
    }

    async fn get_payment_terms_default(&self, retailer: &str) -> ConfigReadResult<Option<String>> {
        let (key, default) = match retailer.trim().to_lowercase().as_str() {
            retailer_tags::BARBOSA => (config_keys::PAYMENT_TERMS_BARBOSA, "17"),
            retailer_tags::REDEX => (config_keys::PAYMENT_TERMS_REDEX, "7"),
            _ => return Ok(None),
        };
        Ok(Some(self.get_text_or_default(key, default)?))
    }

    async fn get_default_price_table(&self) -> ConfigReadResult<i64> {
        Ok(self.get_parsed_or_default(config_keys::DEFAULT_PRICE_TABLE, 3i64)?)
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 版式探测
    pub const DETECTOR_THRESHOLD: &str = "detector_confidence_threshold";
    pub const DETECTOR_MIN_SIGNALS: &str = "detector_min_signals";
    pub const REJECT_UNRECOGNIZED_LAYOUTS: &str = "reject_unrecognized_layouts";

    // 会话
    pub const SESSION_TTL_MINUTES: &str = "session_ttl_minutes";

    // 包装回退
    pub const FALLBACK_PACKAGING_FROM: &str = "fallback_packaging_from";
    pub const FALLBACK_PACKAGING_TO: &str = "fallback_packaging_to";

    // ERP 提交
    pub const PAYMENT_TERMS_BARBOSA: &str = "payment_terms_barbosa";
    pub const PAYMENT_TERMS_REDEX: &str = "payment_terms_redex";
    pub const DEFAULT_PRICE_TABLE: &str = "default_price_table";
}
