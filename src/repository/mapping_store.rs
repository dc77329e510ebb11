// ==========================================
// 零售采购订单导入系统 - De→Para 映射仓储
// ==========================================
// 职责: 按 零售商 × 种类 维护外部编码 → 内部编码映射
// 存储: JSON 文件 { "<rede>": { "itens": [{de, para}], "lojas": [{de, para}] } }
// 红线: 只追加，不修改，不删除；同一桶内 de 唯一，先写入者胜出
// ==========================================

use crate::domain::types::MappingKind;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

// ==========================================
// 持久化结构
// ==========================================

/// 单条映射（持久化字段名 de / para）
///
/// 既有文件中的数字型 de/para 原样保留；新写入的条目一律为字符串。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingEntry {
    #[serde(rename = "de")]
    pub from: Value,
    #[serde(rename = "para")]
    pub to: Value,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl MappingEntry {
    pub fn new(from: &str, to: &str) -> Self {
        Self {
            from: Value::String(from.to_string()),
            to: Value::String(to.to_string()),
            extra: BTreeMap::new(),
        }
    }

    pub fn from_text(&self) -> Option<String> {
        code_text(&self.from)
    }

    pub fn to_text(&self) -> Option<String> {
        code_text(&self.to)
    }
}

/// 单个零售商的映射记录
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetailerMappings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub itens: Option<Vec<MappingEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lojas: Option<Vec<MappingEntry>>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl RetailerMappings {
    pub fn entries(&self, kind: MappingKind) -> &[MappingEntry] {
        let bucket = match kind {
            MappingKind::Product => &self.itens,
            MappingKind::Store => &self.lojas,
        };
        bucket.as_deref().unwrap_or(&[])
    }

    fn entries_mut(&mut self, kind: MappingKind) -> &mut Vec<MappingEntry> {
        let bucket = match kind {
            MappingKind::Product => &mut self.itens,
            MappingKind::Store => &mut self.lojas,
        };
        bucket.get_or_insert_with(Vec::new)
    }
}

/// 完整映射表：retailer → RetailerMappings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MappingTable {
    pub retailers: BTreeMap<String, RetailerMappings>,
}

impl MappingTable {
    /// 查询映射；首个匹配条目胜出
    pub fn lookup(&self, retailer: &str, kind: MappingKind, from: &str) -> Option<String> {
        let from = from.trim();
        self.retailers
            .get(retailer)?
            .entries(kind)
            .iter()
            .find(|entry| entry.from_text().as_deref() == Some(from))
            .and_then(|entry| entry.to_text())
    }

    /// 插入映射；同一桶内已存在相同 de 时不做任何修改
    ///
    /// # 返回
    /// - true: 已插入
    /// - false: 已存在（保留原映射）
    pub fn insert(&mut self, retailer: &str, kind: MappingKind, from: &str, to: &str) -> bool {
        if self.lookup_entry(retailer, kind, from).is_some() {
            return false;
        }
        self.retailers
            .entry(retailer.to_string())
            .or_default()
            .entries_mut(kind)
            .push(MappingEntry::new(from.trim(), to.trim()));
        true
    }

    pub fn len(&self, retailer: &str, kind: MappingKind) -> usize {
        self.retailers
            .get(retailer)
            .map(|r| r.entries(kind).len())
            .unwrap_or(0)
    }

    fn lookup_entry(&self, retailer: &str, kind: MappingKind, from: &str) -> Option<&MappingEntry> {
        let from = from.trim();
        self.retailers
            .get(retailer)?
            .entries(kind)
            .iter()
            .find(|entry| entry.from_text().as_deref() == Some(from))
    }
}

/// JSON 标量的文本视图（字符串 TRIM；整数不带小数）
pub fn code_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i.to_string())
            } else if let Some(u) = n.as_u64() {
                Some(u.to_string())
            } else {
                n.as_f64().map(|f| {
                    if f.fract() == 0.0 && f.abs() < 1e15 {
                        format!("{}", f as i64)
                    } else {
                        f.to_string()
                    }
                })
            }
        }
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

// ==========================================
// MappingStore Trait
// ==========================================
// 实现者: FileMappingStore（JSON 文件）, InMemoryMappingStore（测试/临时）
// 约束: I/O 故障只记录日志并降级为空表，不向调用方传播

/// 写入结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// 新映射已写入
    Inserted,
    /// 已存在映射，保留原值
    AlreadyMapped { existing: String },
    /// de 或 para 为空，忽略
    Ignored,
    /// 持久化失败（已记录日志）
    Failed(String),
}

impl UpsertOutcome {
    pub fn is_inserted(&self) -> bool {
        matches!(self, UpsertOutcome::Inserted)
    }
}

pub trait MappingStore: Send + Sync {
    /// 查询映射；None 表示尚未映射
    fn lookup(&self, retailer: &str, kind: MappingKind, from: &str) -> Option<String>;

    /// 仅在不存在相同 de 时插入，并同步持久化
    fn upsert(&self, retailer: &str, kind: MappingKind, from: &str, to: &str) -> UpsertOutcome;

    /// 当前映射表快照
    fn snapshot(&self) -> MappingTable;
}

// ==========================================
// FileMappingStore - JSON 文件映射仓储
// ==========================================
pub struct FileMappingStore {
    path: PathBuf,
    // 串行化 读-改-写，保证"先写入者胜出"
    write_lock: Mutex<()>,
}

impl FileMappingStore {
    /// 创建文件映射仓储（文件可以不存在）
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 读取映射文件
    ///
    /// # 返回
    /// - Ok(MappingTable): 文件不存在或为空时返回空表
    /// - Err: 读取失败 / JSON 损坏
    pub fn load(&self) -> RepositoryResult<MappingTable> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "映射文件不存在，使用空表");
            return Ok(MappingTable::default());
        }

        // 非 UTF-8 内容视为损坏，其余 I/O 错误视为不可读
        let raw = fs::read_to_string(&self.path).map_err(|e| match e.kind() {
            io::ErrorKind::InvalidData => RepositoryError::MappingFileCorrupt {
                path: self.path.display().to_string(),
                message: e.to_string(),
            },
            _ => RepositoryError::MappingFileReadError {
                path: self.path.display().to_string(),
                message: e.to_string(),
            },
        })?;

        if raw.trim().is_empty() {
            return Ok(MappingTable::default());
        }

        serde_json::from_str(&raw).map_err(|e| RepositoryError::MappingFileCorrupt {
            path: self.path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// 读取映射文件，失败时降级为空表
    fn load_or_empty(&self) -> MappingTable {
        match self.load() {
            Ok(table) => table,
            Err(e) => {
                warn!(error = %e, "映射文件不可用，本次操作使用空表");
                MappingTable::default()
            }
        }
    }

    /// 写入映射文件（临时文件 + rename）
    fn persist(&self, table: &MappingTable) -> RepositoryResult<()> {
        let write_err = |e: String| RepositoryError::MappingFileWriteError {
            path: self.path.display().to_string(),
            message: e,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| write_err(e.to_string()))?;
            }
        }

        let json = serde_json::to_string_pretty(table).map_err(|e| write_err(e.to_string()))?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, json).map_err(|e| write_err(e.to_string()))?;
        fs::rename(&tmp_path, &self.path).map_err(|e| write_err(e.to_string()))?;
        Ok(())
    }

    /// 将损坏的映射文件移到旁路，避免被新表覆盖
    ///
    /// # 返回
    /// - Ok(备份路径)
    /// - Err: 备份失败，原文件不得被覆盖
    fn quarantine_corrupt_file(&self) -> RepositoryResult<PathBuf> {
        let suffix = Local::now().format("%Y%m%d%H%M%S");
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "conversao.json".to_string());
        let target = self.path.with_file_name(format!("{}.corrupt-{}", file_name, suffix));

        fs::rename(&self.path, &target).map_err(|e| RepositoryError::MappingFileWriteError {
            path: target.display().to_string(),
            message: e.to_string(),
        })?;
        warn!(backup = %target.display(), "损坏的映射文件已备份");
        Ok(target)
    }
}

impl MappingStore for FileMappingStore {
    fn lookup(&self, retailer: &str, kind: MappingKind, from: &str) -> Option<String> {
        self.load_or_empty().lookup(retailer, kind, from)
    }

    fn upsert(&self, retailer: &str, kind: MappingKind, from: &str, to: &str) -> UpsertOutcome {
        if from.trim().is_empty() || to.trim().is_empty() {
            return UpsertOutcome::Ignored;
        }

        let _guard = match self.write_lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("映射写锁已中毒，继续使用");
                poisoned.into_inner()
            }
        };

        let mut table = match self.load() {
            Ok(table) => table,
            Err(e @ RepositoryError::MappingFileCorrupt { .. }) => {
                warn!(error = %e, "映射文件损坏，备份后使用空表");
                if let Err(backup_err) = self.quarantine_corrupt_file() {
                    warn!(error = %backup_err, "损坏的映射文件备份失败，放弃写入");
                    return UpsertOutcome::Failed(backup_err.to_string());
                }
                MappingTable::default()
            }
            // 文件存在但不可读: 不覆盖
            Err(e) => {
                warn!(error = %e, "映射文件不可读，放弃写入");
                return UpsertOutcome::Failed(e.to_string());
            }
        };

        if let Some(existing) = table.lookup(retailer, kind, from) {
            info!(retailer, kind = %kind, from, existing = %existing, "映射已存在，保留原值");
            return UpsertOutcome::AlreadyMapped { existing };
        }

        table.insert(retailer, kind, from, to);
        match self.persist(&table) {
            Ok(()) => {
                info!(retailer, kind = %kind, from, to, "新增映射");
                UpsertOutcome::Inserted
            }
            Err(e) => {
                warn!(error = %e, "映射持久化失败");
                UpsertOutcome::Failed(e.to_string())
            }
        }
    }

    fn snapshot(&self) -> MappingTable {
        self.load_or_empty()
    }
}

// ==========================================
// InMemoryMappingStore - 内存映射仓储
// ==========================================
#[derive(Default)]
pub struct InMemoryMappingStore {
    table: Mutex<MappingTable>,
}

impl InMemoryMappingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(table: MappingTable) -> Self {
        Self {
            table: Mutex::new(table),
        }
    }
}

impl MappingStore for InMemoryMappingStore {
    fn lookup(&self, retailer: &str, kind: MappingKind, from: &str) -> Option<String> {
        match self.table.lock() {
            Ok(table) => table.lookup(retailer, kind, from),
            Err(poisoned) => poisoned.into_inner().lookup(retailer, kind, from),
        }
    }

    fn upsert(&self, retailer: &str, kind: MappingKind, from: &str, to: &str) -> UpsertOutcome {
        if from.trim().is_empty() || to.trim().is_empty() {
            return UpsertOutcome::Ignored;
        }
        let mut table = match self.table.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(existing) = table.lookup(retailer, kind, from) {
            return UpsertOutcome::AlreadyMapped { existing };
        }
        table.insert(retailer, kind, from, to);
        UpsertOutcome::Inserted
    }

    fn snapshot(&self) -> MappingTable {
        match self.table.lock() {
            Ok(table) => table.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn temp_store() -> (TempDir, FileMappingStore) {
        let dir = TempDir::new().unwrap();
        let store = FileMappingStore::new(dir.path().join("conversao.json"));
        (dir, store)
    }

    #[test]
    fn test_first_mapping_wins() {
        let (_dir, store) = temp_store();

        assert!(store.upsert("barbosa", MappingKind::Product, "110381", "4164").is_inserted());
        let second = store.upsert("barbosa", MappingKind::Product, "110381", "9999");

        assert_eq!(
            second,
            UpsertOutcome::AlreadyMapped {
                existing: "4164".to_string()
            }
        );
        assert_eq!(
            store.lookup("barbosa", MappingKind::Product, "110381"),
            Some("4164".to_string())
        );
    }

    #[test]
    fn test_buckets_are_isolated() {
        let (_dir, store) = temp_store();
        store.upsert("barbosa", MappingKind::Store, "1005", "6091");

        assert_eq!(store.lookup("barbosa", MappingKind::Product, "1005"), None);
        assert_eq!(store.lookup("redex", MappingKind::Store, "1005"), None);
        assert_eq!(
            store.lookup("barbosa", MappingKind::Store, "1005"),
            Some("6091".to_string())
        );
    }

    #[test]
    fn test_blank_values_ignored() {
        let (_dir, store) = temp_store();
        assert_eq!(store.upsert("redex", MappingKind::Store, "12", "  "), UpsertOutcome::Ignored);
        assert_eq!(store.upsert("redex", MappingKind::Store, "", "5"), UpsertOutcome::Ignored);
        assert!(!store.path().exists());
    }

    #[test]
    fn test_existing_file_shape_preserved() {
        let (_dir, store) = temp_store();
        fs::write(
            store.path(),
            r#"{"barbosa":{"itens":[{"de":110381,"para":"4164"}]}}"#,
        )
        .unwrap();

        // 数字型 de 与字符串查询等价
        assert_eq!(
            store.lookup("barbosa", MappingKind::Product, "110381"),
            Some("4164".to_string())
        );

        store.upsert("barbosa", MappingKind::Store, "1005", "6091");

        let written: Value = serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(written["barbosa"]["itens"][0]["de"], serde_json::json!(110381));
        assert_eq!(written["barbosa"]["lojas"][0]["de"], serde_json::json!("1005"));
        assert_eq!(written["barbosa"]["lojas"][0]["para"], serde_json::json!("6091"));
    }

    #[test]
    fn test_corrupt_file_degrades_to_empty_table() {
        let (dir, store) = temp_store();
        fs::write(store.path(), "{ not json").unwrap();

        assert_eq!(store.lookup("barbosa", MappingKind::Product, "1"), None);

        // 写入时损坏文件被备份，新表自愈
        assert!(store.upsert("barbosa", MappingKind::Product, "1", "2").is_inserted());
        assert_eq!(
            store.lookup("barbosa", MappingKind::Product, "1"),
            Some("2".to_string())
        );

        let backups = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".corrupt-"))
            .count();
        assert_eq!(backups, 1);
    }

    #[test]
    fn test_non_utf8_file_is_classified_as_corrupt() {
        let (_dir, store) = temp_store();
        fs::write(store.path(), b"{\"barbosa\":{\"itens\":[{\"de\":\"1\",\"para\":\"pre\xE7o\"}]}}").unwrap();

        assert!(matches!(
            store.load(),
            Err(RepositoryError::MappingFileCorrupt { .. })
        ));
    }

    #[test]
    fn test_unreadable_path_is_never_overwritten() {
        let (_dir, store) = temp_store();
        fs::create_dir(store.path()).unwrap();

        assert_eq!(store.lookup("barbosa", MappingKind::Product, "1"), None);
        assert!(matches!(
            store.upsert("barbosa", MappingKind::Product, "1", "2"),
            UpsertOutcome::Failed(_)
        ));
        assert!(store.path().is_dir());
    }

    #[test]
    fn test_concurrent_upserts_keep_single_winner() {
        let (_dir, store) = temp_store();
        let store = Arc::new(store);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    store.upsert("redex", MappingKind::Store, "L01", &format!("{}", 100 + i))
                })
            })
            .collect();

        let inserted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|o| o.is_inserted())
            .count();

        assert_eq!(inserted, 1);
        assert_eq!(store.snapshot().len("redex", MappingKind::Store), 1);
    }

    #[test]
    fn test_in_memory_store_first_wins() {
        let store = InMemoryMappingStore::new();
        store.upsert("generic", MappingKind::Store, "24155", "6091");
        store.upsert("generic", MappingKind::Store, "24155", "1");
        assert_eq!(
            store.lookup("generic", MappingKind::Store, "24155"),
            Some("6091".to_string())
        );
    }
}
