// ==========================================
// 零售采购订单导入系统 - 命令行入口
// ==========================================
// 用法:
//   order-intake <file> <retailer> [col1,col2,...]
//
// 读取表格并解析；有未映射编码时逐个在终端询问内部编码，
// 全部映射后把可提交的订单以 JSON 输出到 stdout。
// 数据目录: ORDER_INTAKE_DATA_DIR 或用户数据目录
// ==========================================

use retail_order_intake::app::AppState;
use retail_order_intake::domain::{MappingKind, MappingPair, SessionState, UnresolvedSet};
use retail_order_intake::{logging, IntakeApi, APP_NAME, VERSION};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

const USAGE: &str = "用法: order-intake <file> <retailer> [col1,col2,...]";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let mut args = std::env::args().skip(1);
    let (file, retailer) = match (args.next(), args.next()) {
        (Some(file), Some(retailer)) => (PathBuf::from(file), retailer),
        _ => {
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    };
    let selected_columns: Vec<String> = args
        .next()
        .map(|cols| {
            cols.split(',')
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect()
        })
        .unwrap_or_default();

    tracing::info!("{} v{}", APP_NAME, VERSION);

    let state = AppState::with_defaults().await?;
    tracing::info!(
        db_path = %state.db_path,
        mapping_path = %state.mapping_path.display(),
        "数据目录已就绪"
    );
    let api = state.intake_api.as_ref();

    let resolution = api.import_file(&file, &retailer, &selected_columns)?;
    let session_id = resolution.session_id.clone();
    let mut session_state = resolution.state;
    let mut pending = resolution.unresolved;

    while session_state == SessionState::AwaitingOperatorInput {
        let mut progressed = false;
        for kind in [MappingKind::Product, MappingKind::Store] {
            let pairs = prompt_mappings(kind, &pending)?;
            if pairs.is_empty() {
                continue;
            }
            let report = api.submit_operator_mappings(&session_id, kind, &pairs)?;
            progressed |= report.inserted + report.already_mapped > 0;
            session_state = report.state.unwrap_or(session_state);
            pending = report.remaining;
        }
        if !progressed && session_state != SessionState::Ready {
            eprintln!("仍有未映射编码，会话未完成");
            println!("{}", serde_json::to_string_pretty(&pending)?);
            std::process::exit(1);
        }
    }

    print_resolved_order(api, &session_id)
}

/// 逐个询问未映射编码；空输入表示跳过
fn prompt_mappings(kind: MappingKind, pending: &UnresolvedSet) -> anyhow::Result<Vec<MappingPair>> {
    let label = match kind {
        MappingKind::Product => "商品",
        MappingKind::Store => "门店",
    };
    let stdin = io::stdin();
    let mut pairs = Vec::new();

    for code in pending.codes(kind) {
        eprint!("{}编码 {} 对应的内部编码（回车跳过）: ", label, code);
        io::stderr().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let to = line.trim();
        if !to.is_empty() {
            pairs.push(MappingPair::new(code.clone(), to));
        }
    }
    Ok(pairs)
}

fn print_resolved_order(api: &IntakeApi, session_id: &str) -> anyhow::Result<()> {
    let order = api.finalize(session_id)?;
    println!("{}", serde_json::to_string_pretty(&order)?);
    Ok(())
}
