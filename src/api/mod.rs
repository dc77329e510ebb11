// ==========================================
// 零售采购订单导入系统 - API 层
// ==========================================
// 职责: 提供业务 API 接口，供命令行/上层服务调用
// ==========================================

pub mod error;
pub mod intake_api;

pub use error::{ApiError, ApiResult};
pub use intake_api::{IntakeApi, SubmitOrderResponse};
