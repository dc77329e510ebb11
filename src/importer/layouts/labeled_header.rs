// ==========================================
// 零售采购订单导入系统 - B 版式（标签表头 + 合计行）
// ==========================================
// 结构:
// - 第 3 行（索引 2）: 含"Pedido de Compra Número <数字>"的标题
// - 明细表头: 位置不固定，按四单元格签名扫描定位
// - 明细区: 表头下一行开始，至签名再次出现或表尾结束
// - "Totais:" 合计行跳过
// 包装固定为 CX
// ==========================================

use crate::domain::order::{LayoutMetadata, LineItem, ParseOutcome};
use crate::domain::sheet::RawSheet;
use crate::domain::types::{LayoutKind, LineStatus, MappingKind};
use crate::importer::code_resolver::CodeResolver;
use crate::importer::data_cleaner::DataCleaner;
use crate::importer::layouts::LayoutParser;
use crate::repository::MappingStore;
use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, info, warn};

/// 明细表头签名（第 0/1/2/4 列）
pub const HEADER_SIGNATURE: [(usize, &str); 4] = [
    (0, "Loja"),
    (1, "Entrega"),
    (2, "GTIN/PLU Unitário"),
    (4, "Descrição do Produto"),
];

/// 合计行标记（第 4 列）
pub const TOTALS_MARKER: &str = "Totais:";

/// 订单号所在行
pub const ORDER_NUMBER_ROW: usize = 2;

/// 订单号正则：首个命中者胜出，第二个仅作回退
const ORDER_NUMBER_PATTERNS: [&str; 2] = [
    r"(?i)Pedido de Compra Número\s+(\d+)",
    r"(?i)número\s+(\d+)",
];

const FIXED_PACKAGING: &str = "CX";

/// 编译后的订单号正则（进程内只编译一次）
fn order_number_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        ORDER_NUMBER_PATTERNS
            .iter()
            .filter_map(|pattern| match Regex::new(pattern) {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!(pattern, error = %e, "订单号正则编译失败");
                    None
                }
            })
            .collect()
    })
}

/// 明细列位置
mod cols {
    pub const STORE: usize = 0;
    pub const GTIN: usize = 2;
    pub const DESCRIPTION: usize = 4;
    pub const SUPPLIER_REF: usize = 6;
    pub const QUANTITY: usize = 13;
    pub const UNIT_COST: usize = 14;
    pub const TOTAL: usize = 15;
}

fn is_header_row(sheet: &RawSheet, row: usize) -> bool {
    HEADER_SIGNATURE
        .iter()
        .all(|(col, label)| sheet.cell(row, *col).matches_label(label))
}

/// 定位第一个明细表头
pub fn find_header(sheet: &RawSheet) -> Option<usize> {
    (0..sheet.len()).find(|&row| is_header_row(sheet, row))
}

/// 从固定行提取零售商订单号
pub fn extract_order_number(sheet: &RawSheet) -> Option<String> {
    let line = sheet
        .row(ORDER_NUMBER_ROW)?
        .iter()
        .map(|c| c.as_text().unwrap_or_default())
        .collect::<Vec<_>>()
        .join(" ");

    order_number_patterns()
        .iter()
        .find_map(|re| re.captures(&line).and_then(|c| c.get(1)))
        .map(|number| number.as_str().to_string())
}

// ==========================================
// LabeledHeaderParser
// ==========================================
pub struct LabeledHeaderParser;

impl LayoutParser for LabeledHeaderParser {
    fn kind(&self) -> LayoutKind {
        LayoutKind::LabeledHeader
    }

    fn parse(
        &self,
        sheet: &RawSheet,
        _selected_columns: &[String],
        retailer: &str,
        store: &dyn MappingStore,
    ) -> ParseOutcome {
        let cleaner = DataCleaner;
        let order_number = extract_order_number(sheet);
        debug!(order_number = ?order_number, "B 版式订单号");

        let metadata = LayoutMetadata::LabeledHeader {
            order_number: order_number.clone(),
        };

        let start = match find_header(sheet) {
            Some(header_row) => header_row + 1,
            None => {
                warn!("B 版式: 未找到明细表头");
                return ParseOutcome::empty(Some(metadata));
            }
        };

        let mut resolver = CodeResolver::new(store, retailer);
        let mut items = Vec::new();

        for row_idx in start..sheet.len() {
            if sheet.row_is_blank(row_idx) {
                continue;
            }
            // 下一段明细开始
            if is_header_row(sheet, row_idx) {
                debug!(row = row_idx, "遇到下一段表头，停止");
                break;
            }
            if sheet.cell(row_idx, cols::DESCRIPTION).matches_label(TOTALS_MARKER) {
                continue;
            }

            let store_key = match sheet.cell(row_idx, cols::STORE).as_text() {
                Some(key) if key != "Loja" => key,
                _ => continue,
            };
            let (gtin, description) = match (
                sheet.cell(row_idx, cols::GTIN).as_text(),
                sheet.cell(row_idx, cols::DESCRIPTION).as_text(),
            ) {
                (Some(g), Some(d)) => (g, d),
                _ => continue,
            };

            let resolved_store_id = resolver.resolve(MappingKind::Store, &store_key);
            let resolved_product_id = resolver.resolve(MappingKind::Product, &gtin);

            let quantity = sheet.cell(row_idx, cols::QUANTITY).as_f64().unwrap_or(0.0);
            let quantity = cleaner.non_negative(quantity, "quantity", row_idx + 1);
            let unit_price = sheet.cell(row_idx, cols::UNIT_COST).as_f64().unwrap_or(0.0);
            let unit_price = cleaner.non_negative(unit_price, "unit_price", row_idx + 1);
            let line_total = sheet
                .cell(row_idx, cols::TOTAL)
                .as_f64()
                .unwrap_or(quantity * unit_price);

            items.push(LineItem {
                row_number: row_idx + 1,
                source_code: gtin,
                resolved_product_id,
                description,
                packaging: FIXED_PACKAGING.to_string(),
                supplier_ref: sheet.cell(row_idx, cols::SUPPLIER_REF).as_text(),
                store_key,
                resolved_store_id,
                quantity,
                unit_price,
                line_total,
                order_number: order_number.clone().unwrap_or_default(),
                status: LineStatus::Ok,
                catalog_error: None,
            });
        }

        info!(items = items.len(), "B 版式解析完成");

        ParseOutcome {
            items,
            unresolved: resolver.into_unresolved(),
            metadata: Some(metadata),
        }
    }
}
