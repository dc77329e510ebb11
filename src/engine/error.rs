// ==========================================
// 零售采购订单导入系统 - 外部协作方错误类型
// ==========================================
// 范围: 商品目录查询、ERP 提交
// 约束: 单行/单单失败只做标记，不中断整批
// ==========================================

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SubmissionError {
    #[error("商品目录不可用: {0}")]
    CatalogUnavailable(String),

    #[error("ERP 不可用: {0}")]
    ErpUnavailable(String),

    #[error("ERP 拒绝订单 (order={order_number}): {message}")]
    ErpRejected {
        order_number: String,
        message: String,
    },

    #[error("订单草稿无效: {0}")]
    InvalidDraft(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type SubmissionResult<T> = Result<T, SubmissionError>;
