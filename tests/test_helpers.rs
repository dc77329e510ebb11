// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供临时配置库、临时映射文件、三种版式的样例表格
// ==========================================
#![allow(dead_code)]

use retail_order_intake::db::{ensure_config_schema, open_sqlite_connection};
use retail_order_intake::domain::{CellValue, RawSheet};
use retail_order_intake::repository::FileMappingStore;
use std::error::Error;
use std::path::PathBuf;
use tempfile::{NamedTempFile, TempDir};

/// 创建临时配置数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file
        .path()
        .to_str()
        .ok_or("临时路径不是合法 UTF-8")?
        .to_string();

    let conn = open_sqlite_connection(&db_path)?;
    ensure_config_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// 写入一条全局配置
pub fn insert_test_config(db_path: &str, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
    let conn = open_sqlite_connection(db_path)?;
    conn.execute(
        "INSERT OR REPLACE INTO config_kv (scope_id, key, value, updated_at)
         VALUES ('global', ?1, ?2, datetime('now'))",
        rusqlite::params![key, value],
    )?;
    Ok(())
}

/// 临时目录中的映射文件仓储
///
/// # 返回
/// - TempDir: 临时目录（需要保持存活）
/// - FileMappingStore: 指向 conversao.json 的仓储
/// - PathBuf: 映射文件路径
pub fn create_mapping_store() -> (TempDir, FileMappingStore, PathBuf) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("conversao.json");
    let store = FileMappingStore::new(&path);
    (dir, store, path)
}

// ==========================================
// 单元格构造
// ==========================================

pub fn t(s: &str) -> CellValue {
    CellValue::from(s)
}

pub fn n(v: f64) -> CellValue {
    CellValue::from(v)
}

pub fn empty() -> CellValue {
    CellValue::Empty
}

// ==========================================
// A 版式样例（barbosa）
// ==========================================

/// A 版式表头
pub fn barbosa_header() -> Vec<CellValue> {
    vec![
        t("Item"),
        t("Material"),
        t("Texto breve"),
        t("Centro"),
        t("Qtd.do pedido"),
        t("UM pedido"),
        t("Preço líquido"),
    ]
}

/// A 版式全部可识别列
pub fn barbosa_columns() -> Vec<String> {
    [
        "Item",
        "Material",
        "Texto breve",
        "Centro",
        "Qtd.do pedido",
        "UM pedido",
        "Preço líquido",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// A 版式明细行
pub fn barbosa_item(material: f64, desc: &str, center: f64, qty: f64, um: &str, price: f64) -> Vec<CellValue> {
    vec![empty(), n(material), t(desc), n(center), n(qty), t(um), n(price)]
}

/// A 版式单据行（Material 为空，Item 列携带单据号）
pub fn barbosa_document(document: &str) -> Vec<CellValue> {
    vec![t(document), empty(), empty(), empty(), empty(), empty(), empty()]
}

/// 两个商品、两个门店的 A 版式表格
pub fn barbosa_sheet() -> RawSheet {
    RawSheet::new(vec![
        barbosa_header(),
        barbosa_document("4500012345"),
        barbosa_item(110381.0, "Biscoito Recheado", 1005.0, 2.0, "CX1", 50.0),
        barbosa_item(110382.0, "Bolacha Agua e Sal", 1006.0, 1.0, "FD", 30.0),
    ])
}

// ==========================================
// B 版式样例（redex）
// ==========================================

const REDEX_WIDTH: usize = 16;

pub fn redex_title(text: &str) -> Vec<CellValue> {
    vec![t(text)]
}

pub fn redex_header() -> Vec<CellValue> {
    let mut row = vec![empty(); REDEX_WIDTH];
    row[0] = t("Loja");
    row[1] = t("Entrega");
    row[2] = t("GTIN/PLU Unitário");
    row[4] = t("Descrição do Produto");
    row
}

pub fn redex_item(store: &str, gtin: &str, desc: &str, qty: f64, cost: f64) -> Vec<CellValue> {
    let mut row = vec![empty(); REDEX_WIDTH];
    row[0] = t(store);
    row[1] = t("10/03/2025");
    row[2] = t(gtin);
    row[4] = t(desc);
    row[6] = t("REF-77");
    row[13] = n(qty);
    row[14] = n(cost);
    row[15] = n(qty * cost);
    row
}

pub fn redex_totals() -> Vec<CellValue> {
    let mut row = vec![empty(); REDEX_WIDTH];
    row[4] = t("Totais:");
    row[13] = n(99.0);
    row[15] = n(999.0);
    row
}

/// 单段明细的 B 版式表格
pub fn redex_sheet() -> RawSheet {
    RawSheet::new(vec![
        redex_title("Rede X Supermercados"),
        redex_title(""),
        redex_title("Pedido de Compra Número 123456"),
        redex_title(""),
        redex_header(),
        redex_item("12", "7891000100103", "Biscoito", 4.0, 2.5),
        redex_item("12", "7891000100104", "Bolacha", 2.0, 3.0),
        redex_totals(),
    ])
}

// ==========================================
// C 版式样例（元数据块）
// ==========================================

/// 元数据块 + 明细表头 + 两行明细
pub fn metadata_block_sheet() -> RawSheet {
    RawSheet::new(vec![
        vec![t("COND PAGTO"), n(60.0)],
        vec![t("CNPJ"), t("48.076.228/0030-26")],
        vec![t("COD. CLIENTE"), n(24155.0)],
        vec![t("N° PEDIDO"), t("PCSZ000457")],
        vec![t("VENDEDOR"), n(6.0)],
        vec![
            t("Codigo Produto"),
            t("Descrição do produto"),
            t("Quantidade"),
            t("Embalagem"),
            t("Valor Unitário"),
            t("Vl Total"),
        ],
        vec![n(4164.0), t("Biscoito"), n(3.0), t("FD"), n(10.0), n(30.0)],
        vec![n(4165.0), t("Bolacha"), n(2.0), t("CX"), n(4.5), n(9.0)],
    ])
}

/// 与 metadata_block_sheet 相同内容，但交换"Embalagem"与"Valor Unitário"两列
///
/// 前三列属于表头签名，位置固定
pub fn metadata_block_sheet_swapped() -> RawSheet {
    let swapped = metadata_block_sheet()
        .rows()
        .iter()
        .enumerate()
        .map(|(index, row)| {
            let mut row = row.clone();
            if index >= 5 {
                row.swap(3, 4);
            }
            row
        })
        .collect();
    RawSheet::new(swapped)
}

/// 没有任何已知特征的表格
pub fn unrecognized_sheet() -> RawSheet {
    RawSheet::new(vec![
        vec![t("Relatório de vendas")],
        vec![t("Produto"), t("Qtd")],
        vec![t("Biscoito"), n(3.0)],
    ])
}
