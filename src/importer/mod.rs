// ==========================================
// 零售采购订单导入系统 - 导入层
// ==========================================
// 职责: 文件 → RawSheet → 版式解析 → 标准化明细 + 待识别编码
// 支持: Excel, CSV
// ==========================================

pub mod code_resolver;
pub mod data_cleaner;
pub mod error;
pub mod layout_detector;
pub mod layouts;
pub mod sheet_reader;

pub use code_resolver::CodeResolver;
pub use data_cleaner::DataCleaner;
pub use error::{ImportError, ImportResult};
pub use layout_detector::{LayoutDetection, LayoutDetector, LayoutSignals};
pub use layouts::{
    parser_for, FixedColumnParser, LabeledHeaderParser, LayoutParser, LayoutSelection,
    MetadataBlockParser,
};
pub use sheet_reader::{CsvSheetReader, ExcelSheetReader, SheetReader, UniversalSheetReader};
