// ==========================================
// 零售采购订单导入系统 - 商品目录补全
// ==========================================
// 职责: 按 (商品, 包装, 客户) 查询外部商品目录，逐行标记失败
// 回退规则（仅 A/B 版式）: 包装为 CX 且查无结果时，改用 FD 重试一次；
//                          重试成功则覆盖该行包装
// 约束: 单行失败不中断整批
// ==========================================

use crate::domain::order::LineItem;
use crate::domain::types::LayoutKind;
use crate::engine::error::SubmissionResult;
use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

// ==========================================
// ProductCatalog Trait（外部协作方）
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogLookup {
    pub found: bool,
    pub product: Option<Value>,
}

impl CatalogLookup {
    pub fn found(product: Value) -> Self {
        Self {
            found: true,
            product: Some(product),
        }
    }

    pub fn not_found() -> Self {
        Self::default()
    }
}

#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn lookup(
        &self,
        product_code: &str,
        packaging: &str,
        client_id: &str,
    ) -> SubmissionResult<CatalogLookup>;
}

// ==========================================
// EnrichmentReport
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentReport {
    /// 去重后的查询数
    pub looked_up: usize,
    /// 通过回退包装命中的行数
    pub repackaged: usize,
    /// 标记失败的行数
    pub failed: usize,
    /// 缺少商品/门店编码而未查询的行数
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct QueryKey {
    product_id: String,
    packaging: String,
    client_id: String,
}

#[derive(Debug, Clone)]
enum QueryResult {
    Found { packaging: String },
    NotFound,
    Failed(String),
}

// ==========================================
// CatalogEnricher
// ==========================================
pub struct CatalogEnricher {
    catalog: Arc<dyn ProductCatalog>,
    fallback_from: String,
    fallback_to: String,
}

impl CatalogEnricher {
    pub fn new(catalog: Arc<dyn ProductCatalog>, fallback_from: &str, fallback_to: &str) -> Self {
        Self {
            catalog,
            fallback_from: fallback_from.trim().to_uppercase(),
            fallback_to: fallback_to.trim().to_uppercase(),
        }
    }

    async fn query(&self, key: &QueryKey, allow_fallback: bool) -> QueryResult {
        match self
            .catalog
            .lookup(&key.product_id, &key.packaging, &key.client_id)
            .await
        {
            Ok(lookup) if lookup.found => {
                return QueryResult::Found {
                    packaging: key.packaging.clone(),
                }
            }
            Ok(_) => {}
            Err(e) => {
                warn!(product = %key.product_id, error = %e, "商品目录查询失败");
                return QueryResult::Failed(e.to_string());
            }
        }

        if !allow_fallback || key.packaging != self.fallback_from {
            return QueryResult::NotFound;
        }

        debug!(
            product = %key.product_id,
            from = %self.fallback_from,
            to = %self.fallback_to,
            "商品目录未命中，改用回退包装重试"
        );
        match self
            .catalog
            .lookup(&key.product_id, &self.fallback_to, &key.client_id)
            .await
        {
            Ok(lookup) if lookup.found => QueryResult::Found {
                packaging: self.fallback_to.clone(),
            },
            Ok(_) => QueryResult::NotFound,
            Err(e) => {
                warn!(product = %key.product_id, error = %e, "商品目录回退查询失败");
                QueryResult::Failed(e.to_string())
            }
        }
    }

    /// 补全明细；相同 (商品, 包装, 客户) 只查询一次，查询并发执行
    pub async fn enrich(&self, items: &mut [LineItem], layout: LayoutKind) -> EnrichmentReport {
        let allow_fallback = layout.uses_packaging_fallback();
        let mut report = EnrichmentReport::default();

        let mut keys: Vec<QueryKey> = Vec::new();
        for item in items.iter() {
            if let Some(key) = query_key(item) {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
        report.looked_up = keys.len();

        let results = join_all(keys.iter().map(|key| self.query(key, allow_fallback))).await;
        let results: HashMap<QueryKey, QueryResult> = keys.into_iter().zip(results).collect();

        for item in items.iter_mut() {
            let key = match query_key(item) {
                Some(key) => key,
                None => {
                    report.skipped += 1;
                    continue;
                }
            };
            match results.get(&key) {
                Some(QueryResult::Found { packaging }) => {
                    if *packaging != item.packaging {
                        item.packaging = packaging.clone();
                        report.repackaged += 1;
                    }
                    item.catalog_error = None;
                }
                Some(QueryResult::NotFound) => {
                    item.catalog_error = Some(format!(
                        "商品目录未找到: {} / {}",
                        key.product_id, key.packaging
                    ));
                    report.failed += 1;
                }
                Some(QueryResult::Failed(message)) => {
                    item.catalog_error = Some(message.clone());
                    report.failed += 1;
                }
                None => report.skipped += 1,
            }
        }

        info!(
            looked_up = report.looked_up,
            repackaged = report.repackaged,
            failed = report.failed,
            skipped = report.skipped,
            "商品目录补全完成"
        );
        report
    }
}

fn query_key(item: &LineItem) -> Option<QueryKey> {
    Some(QueryKey {
        product_id: item.resolved_product_id.clone()?,
        packaging: item.packaging.clone(),
        client_id: item.resolved_store_id.clone()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::LineStatus;
    use crate::engine::error::SubmissionError;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 只认 (4164, FD) 和 (5000, CX)；9999 模拟服务异常
    struct FakeCatalog {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ProductCatalog for FakeCatalog {
        async fn lookup(
            &self,
            product_code: &str,
            packaging: &str,
            _client_id: &str,
        ) -> SubmissionResult<CatalogLookup> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match (product_code, packaging) {
                ("9999", _) => Err(SubmissionError::CatalogUnavailable("timeout".into())),
                ("4164", "FD") | ("5000", "CX") => Ok(CatalogLookup::found(json!({"id": product_code}))),
                _ => Ok(CatalogLookup::not_found()),
            }
        }
    }

    fn item(product: Option<&str>, packaging: &str) -> LineItem {
        LineItem {
            row_number: 2,
            source_code: "X".into(),
            resolved_product_id: product.map(String::from),
            description: String::new(),
            packaging: packaging.into(),
            supplier_ref: None,
            store_key: "1005".into(),
            resolved_store_id: Some("6091".into()),
            quantity: 1.0,
            unit_price: 1.0,
            line_total: 1.0,
            order_number: String::new(),
            status: LineStatus::Ok,
            catalog_error: None,
        }
    }

    #[tokio::test]
    async fn test_fallback_packaging_overwrites_item() {
        let catalog = Arc::new(FakeCatalog { calls: AtomicUsize::new(0) });
        let enricher = CatalogEnricher::new(catalog.clone(), "CX", "FD");
        let mut items = vec![
            item(Some("4164"), "CX"),
            item(Some("4164"), "CX"),
            item(Some("5000"), "CX"),
            item(Some("7777"), "CX"),
            item(Some("9999"), "CX"),
            item(None, "CX"),
        ];

        let report = enricher.enrich(&mut items, LayoutKind::FixedColumn).await;

        assert_eq!(items[0].packaging, "FD");
        assert_eq!(items[1].packaging, "FD");
        assert!(items[0].catalog_error.is_none());
        assert_eq!(items[2].packaging, "CX");
        assert!(items[3].catalog_error.is_some());
        assert!(items[4].catalog_error.as_deref().unwrap_or("").contains("timeout"));

        assert_eq!(report.looked_up, 4);
        assert_eq!(report.repackaged, 2);
        assert_eq!(report.failed, 2);
        assert_eq!(report.skipped, 1);
        // 4164: 2 次, 5000: 1 次, 7777: 2 次, 9999: 1 次
        assert_eq!(catalog.calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn test_no_fallback_for_metadata_block() {
        let catalog = Arc::new(FakeCatalog { calls: AtomicUsize::new(0) });
        let enricher = CatalogEnricher::new(catalog, "CX", "FD");
        let mut items = vec![item(Some("4164"), "CX")];

        let report = enricher.enrich(&mut items, LayoutKind::MetadataBlock).await;

        assert_eq!(items[0].packaging, "CX");
        assert!(items[0].catalog_error.is_some());
        assert_eq!(report.repackaged, 0);
        assert_eq!(report.failed, 1);
    }
}
