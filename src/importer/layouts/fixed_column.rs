// ==========================================
// 零售采购订单导入系统 - A 版式（首行固定表头）
// ==========================================
// 结构:
// - 第 0 行: 表头；调用方选定的列名按全等匹配表头得到列索引
// - 其余行: 按列索引投影
// - Material 为空的行: 携带单据号（Item 列），不作为明细
// 包装 CX1 归一为 CX；单价按别名优先级取第一个非空值
// ==========================================

use crate::domain::order::{LayoutMetadata, LineItem, ParseOutcome};
use crate::domain::sheet::{CellValue, RawSheet};
use crate::domain::types::{LayoutKind, LineStatus, MappingKind};
use crate::importer::code_resolver::CodeResolver;
use crate::importer::data_cleaner::DataCleaner;
use crate::importer::layouts::LayoutParser;
use crate::repository::MappingStore;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// 可识别的源列名（别名按优先级排列）
pub mod columns {
    pub const MATERIAL: &str = "Material";
    pub const CENTER: &str = "Centro";
    pub const DOCUMENT: &str = "Item";
    pub const QUANTITY: &[&str] = &["Qtd.do pedido", "Quantidade"];
    pub const PACKAGING: &[&str] = &["UM pedido", "Unidade"];
    pub const UNIT_PRICE: &[&str] = &["Preço líquido", "Valor", "Preço"];
    pub const DESCRIPTION: &[&str] = &["Texto breve", "Descrição"];
}

const DEFAULT_PACKAGING: &str = "CX";

// ==========================================
// ColumnProjection - 选定列 → 表头索引
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct ColumnProjection {
    indices: HashMap<String, usize>,
}

impl ColumnProjection {
    /// 按全等匹配表头；表头中不存在的选定列被忽略
    pub fn build(header: &[CellValue], selected_columns: &[String]) -> Self {
        let mut indices = HashMap::new();
        for column in selected_columns {
            let position = header
                .iter()
                .position(|cell| cell.as_text().as_deref() == Some(column.trim()));
            match position {
                Some(index) => {
                    indices.insert(column.trim().to_string(), index);
                }
                None => debug!(column = %column, "选定列不在表头中"),
            }
        }
        Self { indices }
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.indices.contains_key(column)
    }

    fn cell<'r>(&self, row: &'r [CellValue], column: &str) -> Option<&'r CellValue> {
        self.indices
            .get(column)
            .and_then(|&i| row.get(i))
            .filter(|c| !c.is_blank())
    }

    pub fn text(&self, row: &[CellValue], column: &str) -> Option<String> {
        self.cell(row, column).and_then(|c| c.as_text())
    }

    /// 按别名顺序取第一个非空文本
    pub fn first_text(&self, row: &[CellValue], aliases: &[&str]) -> Option<String> {
        aliases.iter().find_map(|alias| self.text(row, alias))
    }

    /// 按别名顺序取第一个非空数值
    pub fn first_number(&self, row: &[CellValue], aliases: &[&str]) -> Option<f64> {
        aliases
            .iter()
            .find_map(|alias| self.cell(row, alias).and_then(|c| c.as_f64()))
    }

    /// 投影后整行为空
    pub fn is_blank_row(&self, row: &[CellValue]) -> bool {
        self.indices.keys().all(|column| self.cell(row, column).is_none())
    }
}

// ==========================================
// FixedColumnParser
// ==========================================
pub struct FixedColumnParser;

impl LayoutParser for FixedColumnParser {
    fn kind(&self) -> LayoutKind {
        LayoutKind::FixedColumn
    }

    fn parse(
        &self,
        sheet: &RawSheet,
        selected_columns: &[String],
        retailer: &str,
        store: &dyn MappingStore,
    ) -> ParseOutcome {
        let cleaner = DataCleaner;
        let header = match sheet.row(0) {
            Some(h) => h,
            None => {
                warn!("A 版式: 表格为空");
                return ParseOutcome::empty(Some(LayoutMetadata::FixedColumn {
                    document_numbers: Vec::new(),
                }));
            }
        };

        let projection = ColumnProjection::build(header, selected_columns);
        if projection.is_empty() {
            warn!(?selected_columns, "A 版式: 选定列均不在表头中");
            return ParseOutcome::empty(Some(LayoutMetadata::FixedColumn {
                document_numbers: Vec::new(),
            }));
        }
        if !projection.contains(columns::MATERIAL) {
            warn!("A 版式: 未选定 Material 列，所有行都将视为单据行");
        }

        let mut resolver = CodeResolver::new(store, retailer);
        let mut items: Vec<LineItem> = Vec::new();
        let mut document_numbers: Vec<String> = Vec::new();
        let mut current_document: Option<String> = None;

        for (row_idx, row) in sheet.rows().iter().enumerate().skip(1) {
            if projection.is_blank_row(row) {
                continue;
            }

            let material = match projection.text(row, columns::MATERIAL) {
                Some(code) => code,
                None => {
                    // 单据行: 记录单据号，供后续明细使用
                    if let Some(document) = projection.text(row, columns::DOCUMENT) {
                        debug!(row = row_idx, document = %document, "单据行");
                        document_numbers.push(document.clone());
                        current_document = Some(document);
                    }
                    continue;
                }
            };

            let resolved_product_id = resolver.resolve(MappingKind::Product, &material);

            let store_key = projection.text(row, columns::CENTER).unwrap_or_default();
            let resolved_store_id = resolver.resolve(MappingKind::Store, &store_key);

            let quantity = projection
                .first_number(row, columns::QUANTITY)
                .unwrap_or(0.0);
            let quantity = cleaner.non_negative(quantity, "quantity", row_idx + 1);
            let unit_price = projection
                .first_number(row, columns::UNIT_PRICE)
                .unwrap_or(0.0);
            let unit_price = cleaner.non_negative(unit_price, "unit_price", row_idx + 1);

            items.push(LineItem {
                row_number: row_idx + 1,
                source_code: material,
                resolved_product_id,
                description: projection
                    .first_text(row, columns::DESCRIPTION)
                    .unwrap_or_default(),
                packaging: cleaner.normalize_packaging(
                    projection.first_text(row, columns::PACKAGING),
                    DEFAULT_PACKAGING,
                ),
                supplier_ref: None,
                store_key,
                resolved_store_id,
                quantity,
                unit_price,
                line_total: quantity * unit_price,
                order_number: current_document.clone().unwrap_or_default(),
                status: LineStatus::Ok,
                catalog_error: None,
            });
        }

        // 单据行之前的明细使用表内第一个单据号
        if let Some(first_document) = document_numbers.first() {
            for item in items.iter_mut().filter(|i| i.order_number.is_empty()) {
                item.order_number = first_document.clone();
            }
        }

        info!(
            items = items.len(),
            documents = document_numbers.len(),
            "A 版式解析完成"
        );

        ParseOutcome {
            items,
            unresolved: resolver.into_unresolved(),
            metadata: Some(LayoutMetadata::FixedColumn { document_numbers }),
        }
    }
}
