// ==========================================
// 零售采购订单导入系统 - 运行期配置快照
// ==========================================
// 职责: 启动时从 IntakeConfigReader 读取一次，供编排器/提交层同步使用
// ==========================================

use crate::config::intake_config_trait::IntakeConfigReader;
use crate::domain::types::retailer_tags;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::layout_detector::{
    LayoutDetector, DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_MIN_SIGNALS,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntakeSettings {
    pub detector_threshold: f64,
    pub detector_min_signals: usize,
    pub reject_unrecognized_layouts: bool,
    pub session_ttl_minutes: i64,
    pub fallback_packaging_from: String,
    pub fallback_packaging_to: String,
    /// retailer → 默认付款条件
    pub payment_terms: BTreeMap<String, String>,
    pub default_price_table: i64,
}

impl Default for IntakeSettings {
    fn default() -> Self {
        let mut payment_terms = BTreeMap::new();
        payment_terms.insert(retailer_tags::BARBOSA.to_string(), "17".to_string());
        payment_terms.insert(retailer_tags::REDEX.to_string(), "7".to_string());

        Self {
            detector_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            detector_min_signals: DEFAULT_MIN_SIGNALS,
            reject_unrecognized_layouts: false,
            session_ttl_minutes: 60,
            fallback_packaging_from: "CX".to_string(),
            fallback_packaging_to: "FD".to_string(),
            payment_terms,
            default_price_table: 3,
        }
    }
}

impl IntakeSettings {
    /// 从配置读取器加载
    pub async fn load(reader: &dyn IntakeConfigReader) -> ImportResult<Self> {
        let read_err = |key: &str, e: Box<dyn std::error::Error + Send + Sync>| {
            ImportError::ConfigReadError {
                key: key.to_string(),
                message: e.to_string(),
            }
        };

        let detector_threshold = reader
            .get_detector_threshold()
            .await
            .map_err(|e| read_err("detector_threshold", e))?;
        let detector_min_signals = reader
            .get_detector_min_signals()
            .await
            .map_err(|e| read_err("detector_min_signals", e))?;
        let reject_unrecognized_layouts = reader
            .get_reject_unrecognized_layouts()
            .await
            .map_err(|e| read_err("reject_unrecognized_layouts", e))?;
        let session_ttl_minutes = reader
            .get_session_ttl_minutes()
            .await
            .map_err(|e| read_err("session_ttl_minutes", e))?;
        let (fallback_packaging_from, fallback_packaging_to) = reader
            .get_fallback_packaging()
            .await
            .map_err(|e| read_err("fallback_packaging", e))?;

        let mut payment_terms = BTreeMap::new();
        for retailer in [retailer_tags::BARBOSA, retailer_tags::REDEX] {
            let terms = reader
                .get_payment_terms_default(retailer)
                .await
                .map_err(|e| read_err("payment_terms", e))?;
            if let Some(terms) = terms {
                payment_terms.insert(retailer.to_string(), terms);
            }
        }

        let default_price_table = reader
            .get_default_price_table()
            .await
            .map_err(|e| read_err("default_price_table", e))?;

        let settings = Self {
            detector_threshold,
            detector_min_signals,
            reject_unrecognized_layouts,
            session_ttl_minutes,
            fallback_packaging_from,
            fallback_packaging_to,
            payment_terms,
            default_price_table,
        };
        info!(?settings, "导入配置已加载");
        Ok(settings)
    }

    pub fn detector(&self) -> LayoutDetector {
        LayoutDetector::new(self.detector_threshold, self.detector_min_signals)
    }

    pub fn payment_terms_for(&self, retailer: &str) -> Option<&str> {
        self.payment_terms
            .get(&retailer.trim().to_lowercase())
            .map(String::as_str)
    }
}
