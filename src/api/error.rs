// ==========================================
// 零售采购订单导入系统 - API 层错误类型
// ==========================================
// 职责: 把导入/仓储/提交层错误转换为面向调用方的错误消息
// ==========================================

use crate::engine::error::SubmissionError;
use crate::importer::error::ImportError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    // ===== 输入错误 =====
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("无效的状态转换: 当前 {from}，需要 {to}")]
    InvalidStateTransition { from: String, to: String },

    // ===== 导入错误 =====
    #[error("文件导入失败: {0}")]
    ImportError(String),

    #[error("无法识别的版式: {0}")]
    LayoutNotRecognized(String),

    // ===== 外部协作方错误 =====
    #[error("外部服务错误: {0}")]
    ExternalServiceError(String),

    // ===== 数据访问错误 =====
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::SessionNotFound(id) => ApiError::NotFound(format!("解析会话(id={})", id)),
            ImportError::InvalidSessionState {
                actual, expected, ..
            } => ApiError::InvalidStateTransition {
                from: actual,
                to: expected,
            },
            e @ ImportError::LayoutNotRecognized { .. } => {
                ApiError::LayoutNotRecognized(e.to_string())
            }
            e @ (ImportError::FileNotFound(_)
            | ImportError::UnsupportedFormat(_)
            | ImportError::FileReadError(_)
            | ImportError::ExcelParseError(_)
            | ImportError::CsvParseError(_)
            | ImportError::EmptyWorkbook(_)) => ApiError::ImportError(e.to_string()),
            ImportError::ConfigReadError { key, message } => {
                ApiError::DatabaseError(format!("配置读取失败 ({}): {}", key, message))
            }
            ImportError::LockError(msg) => ApiError::InternalError(format!("锁获取失败: {}", msg)),
            ImportError::InternalError(msg) => ApiError::InternalError(msg),
            ImportError::Other(e) => ApiError::Other(e),
        }
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg)
            | RepositoryError::UniqueConstraintViolation(msg) => ApiError::DatabaseError(msg),
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("{}: {}", field, message))
            }
            e @ (RepositoryError::MappingFileReadError { .. }
            | RepositoryError::MappingFileCorrupt { .. }
            | RepositoryError::MappingFileWriteError { .. }) => {
                ApiError::InternalError(e.to_string())
            }
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(e) => ApiError::Other(e),
        }
    }
}

impl From<SubmissionError> for ApiError {
    fn from(err: SubmissionError) -> Self {
        match err {
            SubmissionError::Other(e) => ApiError::Other(e),
            e => ApiError::ExternalServiceError(e.to_string()),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_error_conversion() {
        let err: ApiError = ImportError::SessionNotFound("abc".into()).into();
        assert!(matches!(err, ApiError::NotFound(_)));

        let err: ApiError = ImportError::InvalidSessionState {
            session_id: "abc".into(),
            actual: "AWAITING_OPERATOR_INPUT".into(),
            expected: "READY".into(),
        }
        .into();
        match err {
            ApiError::InvalidStateTransition { from, to } => {
                assert_eq!(from, "AWAITING_OPERATOR_INPUT");
                assert_eq!(to, "READY");
            }
            other => panic!("unexpected: {:?}", other),
        }

        let err: ApiError = ImportError::UnsupportedFormat("x.pdf".into()).into();
        assert!(err.to_string().contains("x.pdf"));
    }

    #[test]
    fn test_repository_error_conversion() {
        let err: ApiError = RepositoryError::LockError("poisoned".into()).into();
        assert!(matches!(err, ApiError::DatabaseConnectionError(_)));
    }
}
