// ==========================================
// 零售采购订单导入系统 - C 版式（元数据块 + 明细表）
// ==========================================
// 结构:
// - 第 0-4 行: 标签 | 值（COND PAGTO / CNPJ / COD. CLIENTE / N° PEDIDO / VENDEDOR）
// - 明细表头: 按三单元格签名定位，不依赖固定偏移
// - 明细列角色: 按表头文本（不区分大小写）子串推断，容忍列重排
// 商品编码直接作为内部编码；仅客户编码走门店映射
// ==========================================

use crate::domain::order::{LayoutMetadata, LineItem, OrderMetadata, ParseOutcome};
use crate::domain::sheet::{CellValue, RawSheet};
use crate::domain::types::{LayoutKind, LineStatus, MappingKind};
use crate::importer::code_resolver::CodeResolver;
use crate::importer::data_cleaner::DataCleaner;
use crate::importer::layouts::LayoutParser;
use crate::repository::MappingStore;
use tracing::{debug, info, warn};

/// 元数据标签（第 0 列）
pub mod labels {
    pub const PAYMENT_TERMS: &str = "COND PAGTO";
    pub const TAX_ID: &str = "CNPJ";
    pub const CLIENT_CODE: &str = "COD. CLIENTE";
    pub const ORDER_NUMBER: &str = "N° PEDIDO";
    pub const SALES_REP: &str = "VENDEDOR";
}

/// 明细表头签名（第 0/1/2 列）
pub const ITEMS_HEADER_SIGNATURE: [(usize, &str); 3] = [
    (0, "Codigo Produto"),
    (1, "Descrição do produto"),
    (2, "Quantidade"),
];

/// 客户编码缺失时的分组键
pub const FALLBACK_CLIENT_KEY: &str = "CLIENTE_GENERICO";

const DEFAULT_PACKAGING: &str = "CX";
const DEFAULT_QUANTITY: f64 = 1.0;

/// 定位明细表头所在行
pub fn find_items_header(sheet: &RawSheet) -> Option<usize> {
    (0..sheet.len()).find(|&row| {
        ITEMS_HEADER_SIGNATURE
            .iter()
            .all(|(col, label)| sheet.cell(row, *col).matches_label(label))
    })
}

/// 提取第 0-4 行元数据（第 1 列）
pub fn extract_order_metadata(sheet: &RawSheet) -> OrderMetadata {
    let value = |row: usize| sheet.cell(row, 1).as_text();
    OrderMetadata {
        payment_terms: value(0),
        tax_id: value(1),
        client_code: value(2),
        order_number: value(3),
        sales_rep_code: value(4),
    }
}

// ==========================================
// 列角色推断
// ==========================================
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnRoles {
    pub product_code: Option<usize>,
    pub description: Option<usize>,
    pub quantity: Option<usize>,
    pub packaging: Option<usize>,
    pub unit_price: Option<usize>,
    pub line_total: Option<usize>,
}

impl ColumnRoles {
    /// 按表头文本推断；每个单元格只归属第一个命中的角色
    pub fn infer(header: &[CellValue]) -> Self {
        let mut roles = ColumnRoles::default();
        for (index, cell) in header.iter().enumerate() {
            let text = match cell.as_text() {
                Some(t) => t.to_lowercase(),
                None => continue,
            };
            let has = |needles: &[&str]| needles.iter().any(|n| text.contains(n));

            if has(&["codigo produto", "código produto"]) {
                roles.product_code = Some(index);
            } else if has(&["descrição", "descricao"]) {
                roles.description = Some(index);
            } else if has(&["quantidade", "qtde"]) {
                roles.quantity = Some(index);
            } else if has(&["embalagem", "um"]) {
                roles.packaging = Some(index);
            } else if has(&["valor unitário", "valor unitario", "preço", "preco"]) {
                roles.unit_price = Some(index);
            } else if has(&["vl total", "valor total"]) {
                roles.line_total = Some(index);
            }
        }
        roles
    }
}

fn cell_at(row: &[CellValue], index: Option<usize>) -> Option<&CellValue> {
    index.and_then(|i| row.get(i))
}

// ==========================================
// MetadataBlockParser
// ==========================================
pub struct MetadataBlockParser;

impl LayoutParser for MetadataBlockParser {
    fn kind(&self) -> LayoutKind {
        LayoutKind::MetadataBlock
    }

    fn parse(
        &self,
        sheet: &RawSheet,
        _selected_columns: &[String],
        retailer: &str,
        store: &dyn MappingStore,
    ) -> ParseOutcome {
        let cleaner = DataCleaner;
        let metadata = extract_order_metadata(sheet);
        debug!(?metadata, "C 版式元数据");

        let header_row = match find_items_header(sheet) {
            Some(row) => row,
            None => {
                warn!("C 版式: 未找到明细表头");
                return ParseOutcome::empty(Some(LayoutMetadata::MetadataBlock(metadata)));
            }
        };

        let roles = ColumnRoles::infer(sheet.row(header_row).unwrap_or(&[]));
        debug!(header_row, ?roles, "C 版式列角色");

        let client_code = metadata.client_code.clone();
        let store_key = client_code
            .clone()
            .unwrap_or_else(|| FALLBACK_CLIENT_KEY.to_string());
        let order_number = metadata.order_number.clone().unwrap_or_default();

        let mut resolver = CodeResolver::new(store, retailer);
        // 同一张表只属于一个客户，只解析一次
        let mut resolved_store: Option<Option<String>> = None;
        let mut items = Vec::new();

        for row_idx in (header_row + 1)..sheet.len() {
            let row = match sheet.row(row_idx) {
                Some(r) => r,
                None => continue,
            };
            if row.iter().all(CellValue::is_blank) {
                continue;
            }

            let product_code = match cell_at(row, roles.product_code).and_then(|c| c.as_text()) {
                Some(code) => code,
                None => continue,
            };

            let resolved_store_id = resolved_store
                .get_or_insert_with(|| {
                    client_code
                        .as_deref()
                        .and_then(|code| resolver.resolve(MappingKind::Store, code))
                })
                .clone();

            let quantity = cell_at(row, roles.quantity)
                .and_then(|c| c.as_f64())
                .unwrap_or(DEFAULT_QUANTITY);
            let quantity = cleaner.non_negative(quantity, "quantity", row_idx + 1);
            let unit_price = cell_at(row, roles.unit_price)
                .and_then(|c| c.as_f64())
                .unwrap_or(0.0);
            let unit_price = cleaner.non_negative(unit_price, "unit_price", row_idx + 1);
            let line_total = cell_at(row, roles.line_total)
                .and_then(|c| c.as_f64())
                .filter(|v| *v != 0.0)
                .unwrap_or(quantity * unit_price);

            items.push(LineItem {
                row_number: row_idx + 1,
                resolved_product_id: Some(product_code.clone()),
                source_code: product_code,
                description: cell_at(row, roles.description)
                    .and_then(|c| c.as_text())
                    .unwrap_or_default(),
                packaging: cleaner.normalize_packaging(
                    cell_at(row, roles.packaging).and_then(|c| c.as_text()),
                    DEFAULT_PACKAGING,
                ),
                supplier_ref: None,
                store_key: store_key.clone(),
                resolved_store_id,
                quantity,
                unit_price,
                line_total,
                order_number: order_number.clone(),
                status: LineStatus::Ok,
                catalog_error: None,
            });
        }

        info!(items = items.len(), client = %store_key, "C 版式解析完成");

        ParseOutcome {
            items,
            unresolved: resolver.into_unresolved(),
            metadata: Some(LayoutMetadata::MetadataBlock(metadata)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryMappingStore;

    fn t(s: &str) -> CellValue {
        CellValue::from(s)
    }

    fn n(v: f64) -> CellValue {
        CellValue::from(v)
    }

    fn sample_sheet() -> RawSheet {
        RawSheet::new(vec![
            vec![t(labels::PAYMENT_TERMS), n(60.0)],
            vec![t(labels::TAX_ID), t("48.076.228/0030-26")],
            vec![t(labels::CLIENT_CODE), n(24155.0)],
            vec![t(labels::ORDER_NUMBER), t("PCSZ000457")],
            vec![t(labels::SALES_REP), n(6.0)],
            vec![
                t("Codigo Produto"),
                t("Descrição do produto"),
                t("Quantidade"),
                t("Embalagem"),
                t("Valor Unitário"),
                t("Vl Total"),
            ],
            vec![n(4164.0), t("Biscoito"), n(3.0), t("FD"), n(10.0), CellValue::Empty],
            vec![CellValue::Empty, t("sem código"), n(1.0), t("CX"), n(1.0), n(1.0)],
            vec![n(4165.0), t("Bolacha"), CellValue::Empty, CellValue::Empty, n(2.5), n(9.0)],
        ])
    }

    #[test]
    fn test_metadata_extraction() {
        let meta = extract_order_metadata(&sample_sheet());
        assert_eq!(meta.payment_terms.as_deref(), Some("60"));
        assert_eq!(meta.client_code.as_deref(), Some("24155"));
        assert_eq!(meta.order_number.as_deref(), Some("PCSZ000457"));
        assert_eq!(meta.sales_rep_code.as_deref(), Some("6"));
    }

    #[test]
    fn test_parse_uses_product_code_directly() {
        let store = InMemoryMappingStore::new();
        store.upsert("generic", MappingKind::Store, "24155", "6091");

        let outcome = MetadataBlockParser.parse(&sample_sheet(), &[], "generic", &store);

        assert_eq!(outcome.items.len(), 2);
        assert!(outcome.unresolved.is_empty());

        let first = &outcome.items[0];
        assert_eq!(first.resolved_product_id.as_deref(), Some("4164"));
        assert_eq!(first.resolved_store_id.as_deref(), Some("6091"));
        assert_eq!(first.store_key, "24155");
        assert_eq!(first.packaging, "FD");
        assert_eq!(first.line_total, 30.0);
        assert_eq!(first.order_number, "PCSZ000457");

        // 缺省值: 数量 1，包装 CX，给定合计优先
        let second = &outcome.items[1];
        assert_eq!(second.quantity, 1.0);
        assert_eq!(second.packaging, "CX");
        assert_eq!(second.line_total, 9.0);
    }

    #[test]
    fn test_unmapped_client_is_queued_once() {
        let store = InMemoryMappingStore::new();
        let outcome = MetadataBlockParser.parse(&sample_sheet(), &[], "generic", &store);

        assert_eq!(outcome.unresolved_stores(), &["24155".to_string()]);
        assert!(outcome.unresolved_products().is_empty());
        assert!(outcome.items.iter().all(|i| i.resolved_store_id.is_none()));
    }

    #[test]
    fn test_missing_header_returns_empty() {
        let sheet = RawSheet::new(vec![vec![t(labels::PAYMENT_TERMS), n(30.0)]]);
        let store = InMemoryMappingStore::new();

        let outcome = MetadataBlockParser.parse(&sheet, &[], "generic", &store);

        assert!(outcome.items.is_empty());
        assert_eq!(
            outcome.order_metadata().and_then(|m| m.payment_terms.clone()),
            Some("30".to_string())
        );
    }

    #[test]
    fn test_column_roles_inference() {
        let header = vec![
            t("Codigo Produto"),
            t("Descrição do produto"),
            t("Quantidade"),
            t("Valor Unitário"),
            t("UM"),
            t("Valor Total"),
        ];
        let roles = ColumnRoles::infer(&header);
        assert_eq!(roles.product_code, Some(0));
        assert_eq!(roles.description, Some(1));
        assert_eq!(roles.quantity, Some(2));
        assert_eq!(roles.unit_price, Some(3));
        assert_eq!(roles.packaging, Some(4));
        assert_eq!(roles.line_total, Some(5));
    }
}
