// ==========================================
// 解析编排端到端测试
// ==========================================
// 测试目标: 解析 → 人工补录映射 → READY → 结束会话
// 覆盖: 会话隔离、未知零售商探测、拒绝未识别版式、CSV 文件导入
// ==========================================

mod test_helpers;

use retail_order_intake::api::{ApiError, IntakeApi};
use retail_order_intake::config::{config_keys, ConfigManager, IntakeSettings};
use retail_order_intake::domain::{MappingKind, MappingPair, SessionState};
use retail_order_intake::importer::LayoutSelection;
use retail_order_intake::repository::{FileMappingStore, MappingStore};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;
use test_helpers::*;

fn api_with_file_store() -> (TempDir, IntakeApi, Arc<FileMappingStore>) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let store = Arc::new(FileMappingStore::new(dir.path().join("conversao.json")));
    let api = IntakeApi::new(store.clone(), IntakeSettings::default());
    (dir, api, store)
}

#[test]
fn test_full_flow_until_ready_and_finalize() {
    let (_dir, api, store) = api_with_file_store();

    // 1. 首次解析: 全部编码待识别
    let resolution = api
        .resolve_order(&barbosa_sheet(), "barbosa", &barbosa_columns())
        .expect("resolve failed");
    assert_eq!(resolution.state, SessionState::AwaitingOperatorInput);
    assert_eq!(resolution.selection, LayoutSelection::FixedColumn);
    assert_eq!(resolution.items.len(), 2);
    assert_eq!(resolution.unresolved.unresolved_products.len(), 2);
    assert_eq!(resolution.unresolved.unresolved_stores.len(), 2);

    let session_id = resolution.session_id.clone();

    // 2. 补录商品映射（含一条空 para）
    let report = api
        .submit_operator_mappings(
            &session_id,
            MappingKind::Product,
            &[
                MappingPair::new("110381", "4164"),
                MappingPair::new("110382", "4165"),
                MappingPair::new("999999", "  "),
            ],
        )
        .expect("product mappings failed");
    assert_eq!(report.inserted, 2);
    assert_eq!(report.ignored, 1);
    assert_eq!(report.state, Some(SessionState::AwaitingOperatorInput));
    assert!(report.remaining.unresolved_products.is_empty());

    // 尚未 READY 时不能结束
    assert!(matches!(
        api.finalize(&session_id),
        Err(ApiError::InvalidStateTransition { .. })
    ));

    // 3. 补录门店映射（按持久化键指定种类）
    let report = api
        .submit_operator_mappings_by_name(
            &session_id,
            "lojas",
            &[MappingPair::new("1005", "6091"), MappingPair::new("1006", "6092")],
        )
        .expect("store mappings failed");
    assert_eq!(report.state, Some(SessionState::Ready));
    assert!(report.remaining.is_empty());

    // 4. 结束会话: 明细全部带内部编码
    let order = api.finalize(&session_id).expect("finalize failed");
    assert_eq!(order.retailer_tag, "barbosa");
    assert_eq!(order.mapping_bucket, "barbosa");
    assert!(order.items.iter().all(|item| item.is_resolved()));
    assert_eq!(order.items[0].resolved_product_id.as_deref(), Some("4164"));
    assert_eq!(order.items[1].resolved_store_id.as_deref(), Some("6092"));

    // 会话已销毁
    assert!(matches!(api.session(&session_id), Err(ApiError::NotFound(_))));

    // 映射已持久化
    assert_eq!(store.snapshot().len("barbosa", MappingKind::Store), 2);
}

#[test]
fn test_second_import_is_ready_immediately() {
    let (_dir, api, store) = api_with_file_store();
    store.upsert("redex", MappingKind::Product, "7891000100103", "4164");
    store.upsert("redex", MappingKind::Product, "7891000100104", "4165");
    store.upsert("redex", MappingKind::Store, "12", "7001");

    let resolution = api.resolve_order(&redex_sheet(), "redex", &[]).expect("resolve failed");

    assert_eq!(resolution.state, SessionState::Ready);
    assert!(resolution.unresolved.is_empty());
    let order = api.finalize(&resolution.session_id).expect("finalize failed");
    assert_eq!(order.items.len(), 2);
}

#[test]
fn test_sessions_are_isolated() {
    let (_dir, api, _store) = api_with_file_store();

    let barbosa = api
        .resolve_order(&barbosa_sheet(), "barbosa", &barbosa_columns())
        .expect("barbosa resolve failed");
    let redex = api.resolve_order(&redex_sheet(), "redex", &[]).expect("redex resolve failed");
    assert_ne!(barbosa.session_id, redex.session_id);

    api.submit_operator_mappings(
        &redex.session_id,
        MappingKind::Store,
        &[MappingPair::new("12", "7001")],
    )
    .expect("redex mappings failed");

    // barbosa 会话的待识别列表不受影响
    let barbosa_session = api.session(&barbosa.session_id).expect("session missing");
    assert_eq!(barbosa_session.unresolved, barbosa.unresolved);

    let redex_session = api.session(&redex.session_id).expect("session missing");
    assert!(redex_session.unresolved.unresolved_stores.is_empty());
    assert_eq!(redex_session.unresolved.unresolved_products.len(), 2);
}

#[test]
fn test_unknown_retailer_with_detected_layout_uses_generic_bucket() {
    let (_dir, api, store) = api_with_file_store();
    store.upsert("generic", MappingKind::Store, "24155", "6091");

    let resolution = api
        .resolve_order(&metadata_block_sheet(), "atacadao", &[])
        .expect("resolve failed");

    match &resolution.selection {
        LayoutSelection::AutoDetected { detection } => assert!(detection.is_match),
        other => panic!("unexpected selection: {:?}", other),
    }
    assert_eq!(resolution.state, SessionState::Ready);

    let order = api.finalize(&resolution.session_id).expect("finalize failed");
    assert_eq!(order.retailer_tag, "atacadao");
    assert_eq!(order.mapping_bucket, "generic");
    assert!(order.items.iter().all(|item| item.resolved_store_id.as_deref() == Some("6091")));
}

#[test]
fn test_unrecognized_layout_is_parsed_best_effort_by_default() {
    let (_dir, api, _store) = api_with_file_store();

    let resolution = api
        .resolve_order(&unrecognized_sheet(), "desconhecido", &[])
        .expect("resolve failed");

    assert!(resolution.items.is_empty());
    assert!(matches!(
        resolution.selection,
        LayoutSelection::AutoDetected { ref detection } if !detection.is_match
    ));
}

#[tokio::test]
async fn test_unrecognized_layout_rejected_when_configured() {
    let (_db_file, db_path) = create_test_db().expect("Failed to create test db");
    insert_test_config(&db_path, config_keys::REJECT_UNRECOGNIZED_LAYOUTS, "true")
        .expect("Failed to insert config");
    let config = ConfigManager::new(&db_path).expect("Failed to open config");

    let dir = TempDir::new().expect("Failed to create temp dir");
    let store: Arc<dyn MappingStore> = Arc::new(FileMappingStore::new(dir.path().join("m.json")));
    let api = IntakeApi::from_config(store, &config)
        .await
        .expect("Failed to build api");

    let result = api.resolve_order(&unrecognized_sheet(), "desconhecido", &[]);
    assert!(matches!(result, Err(ApiError::LayoutNotRecognized(_))));

    // 已知标签不受影响
    assert!(api.resolve_order(&redex_sheet(), "redex", &[]).is_ok());
}

#[test]
fn test_mappings_for_unknown_session_are_rejected() {
    let (_dir, api, store) = api_with_file_store();

    let result = api.submit_operator_mappings(
        "no-such-session",
        MappingKind::Product,
        &[MappingPair::new("110381", "4164")],
    );

    assert!(matches!(result, Err(ApiError::NotFound(_))));
    // 会话校验先于写入
    assert_eq!(store.lookup("barbosa", MappingKind::Product, "110381"), None);
}

#[test]
fn test_import_csv_file() {
    let (dir, api, store) = api_with_file_store();
    store.upsert("barbosa", MappingKind::Product, "110381", "4164");
    store.upsert("barbosa", MappingKind::Store, "1005", "6091");

    let csv_path = dir.path().join("pedido.csv");
    fs::write(
        &csv_path,
        "Item;Material;Texto breve;Centro;Qtd.do pedido;UM pedido;Preço líquido\n\
         4500012345;;;;;;\n\
         ;110381;Biscoito;1005;2;CX1;50,0\n",
    )
    .expect("Failed to write csv");

    let resolution = api
        .import_file(&csv_path, "barbosa", &barbosa_columns())
        .expect("import failed");

    assert_eq!(resolution.state, SessionState::Ready);
    assert_eq!(resolution.items.len(), 1);
    let item = &resolution.items[0];
    assert_eq!(item.resolved_product_id.as_deref(), Some("4164"));
    assert_eq!(item.packaging, "CX");
    assert_eq!(item.unit_price, 50.0);
    assert_eq!(item.line_total, 100.0);
    assert_eq!(item.order_number, "4500012345");
}

#[test]
fn test_import_rejects_unsupported_extension() {
    let (dir, api, _store) = api_with_file_store();
    let path = dir.path().join("pedido.txt");
    fs::write(&path, "qualquer").expect("Failed to write file");

    let result = api.import_file(&path, "barbosa", &barbosa_columns());
    assert!(matches!(result, Err(ApiError::ImportError(_))));
}
