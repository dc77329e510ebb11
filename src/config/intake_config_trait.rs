// ==========================================
// 零售采购订单导入系统 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入/编排/提交所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use async_trait::async_trait;
use std::error::Error;

pub type ConfigReadResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

// ==========================================
// IntakeConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）
// 约束: 键不存在或格式错误时返回默认值
#[async_trait]
pub trait IntakeConfigReader: Send + Sync {
    // ===== 版式探测 =====

    /// 探测置信度阈值（严格大于才算命中）
    ///
    /// # 默认值
    /// - 0.6
    async fn get_detector_threshold(&self) -> ConfigReadResult<f64>;

    /// 探测最少命中信号数
    ///
    /// # 默认值
    /// - 3
    async fn get_detector_min_signals(&self) -> ConfigReadResult<usize>;

    /// 未识别版式是否直接拒绝（false = 仍按 C 版式尽力解析）
    ///
    /// # 默认值
    /// - false
    async fn get_reject_unrecognized_layouts(&self) -> ConfigReadResult<bool>;

    // ===== 会话 =====

    /// 解析会话有效期（分钟）
    ///
    /// # 默认值
    /// - 60
    async fn get_session_ttl_minutes(&self) -> ConfigReadResult<i64>;

    // ===== 商品目录回退 =====

    /// 包装回退规则: (原包装, 回退包装)
    ///
    /// # 默认值
    /// - ("CX", "FD")
    async fn get_fallback_packaging(&self) -> ConfigReadResult<(String, String)>;

    // ===== ERP 提交 =====

    /// 零售商默认付款条件（C 版式使用表内值，不读此项）
    ///
    /// # 默认值
    /// - barbosa: 17
    /// - redex: 7
    /// - 其他: None
    async fn get_payment_terms_default(&self, retailer: &str) -> ConfigReadResult<Option<String>>;

    /// ERP 未返回价格表时使用的默认价格表
    ///
    /// # 默认值
    /// - 3
    async fn get_default_price_table(&self) -> ConfigReadResult<i64>;
}
