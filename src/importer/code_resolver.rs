// ==========================================
// 零售采购订单导入系统 - 编码解析器
// ==========================================
// 职责: 通过映射仓储解析外部编码，未命中的编码收集到待识别集合
// 同一次解析内查询结果缓存，每个编码只访问仓储一次
// ==========================================

use crate::domain::order::UnresolvedSet;
use crate::domain::types::MappingKind;
use crate::repository::MappingStore;
use std::collections::HashMap;
use tracing::debug;

pub struct CodeResolver<'a> {
    store: &'a dyn MappingStore,
    bucket: &'a str,
    cache: HashMap<(MappingKind, String), Option<String>>,
    unresolved: UnresolvedSet,
}

impl<'a> CodeResolver<'a> {
    /// # 参数
    /// - store: 映射仓储
    /// - bucket: 映射桶（零售商键）
    pub fn new(store: &'a dyn MappingStore, bucket: &'a str) -> Self {
        Self {
            store,
            bucket,
            cache: HashMap::new(),
            unresolved: UnresolvedSet::new(),
        }
    }

    /// 解析编码
    ///
    /// # 返回
    /// - Some(内部编码): 已映射
    /// - None: 未映射（非空编码进入待识别集合）或编码为空
    pub fn resolve(&mut self, kind: MappingKind, code: &str) -> Option<String> {
        let code = code.trim();
        if code.is_empty() {
            return None;
        }
        if let Some(cached) = self.cache.get(&(kind, code.to_string())) {
            return cached.clone();
        }

        let resolved = self.store.lookup(self.bucket, kind, code);
        if resolved.is_none() {
            debug!(bucket = self.bucket, kind = %kind, code, "编码未映射");
            self.unresolved.push(kind, code);
        }
        self.cache.insert((kind, code.to_string()), resolved.clone());
        resolved
    }

    pub fn into_unresolved(self) -> UnresolvedSet {
        self.unresolved
    }
}
