// ==========================================
// 零售采购订单导入系统 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 约束: 解析层问题以数据形式返回（空结果/待识别列表），
//       这里只收录真正无法继续的情况
// ==========================================

use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 =====
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件格式不支持: {0}（仅支持 .xlsx/.xls/.xlsm/.ods/.csv）")]
    UnsupportedFormat(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("Excel 解析失败: {0}")]
    ExcelParseError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    #[error("工作簿无工作表: {0}")]
    EmptyWorkbook(String),

    // ===== 版式错误 =====
    #[error("无法识别的版式 (retailer={retailer}): 置信度 {confidence:.2} 低于阈值 {threshold:.2}")]
    LayoutNotRecognized {
        retailer: String,
        confidence: f64,
        threshold: f64,
    },

    // ===== 会话错误 =====
    #[error("解析会话不存在或已过期: {0}")]
    SessionNotFound(String),

    #[error("解析会话状态不允许该操作 (session={session_id}): 当前 {actual}，需要 {expected}")]
    InvalidSessionState {
        session_id: String,
        actual: String,
        expected: String,
    },

    #[error("锁获取失败: {0}")]
    LockError(String),

    // ===== 配置错误 =====
    #[error("配置读取失败 (key: {key}): {message}")]
    ConfigReadError { key: String, message: String },

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

// 实现 From<calamine::Error>
impl From<calamine::Error> for ImportError {
    fn from(err: calamine::Error) -> Self {
        ImportError::ExcelParseError(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
