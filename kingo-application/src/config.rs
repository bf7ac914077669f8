use bon::Builder;
use kingo_domain::unit_of_work::UnitOfWorkController;
use serde::{Deserialize, Serialize};

/// 操作上下文配置
///
/// ```rust
/// use kingo_application::config::ContextConfig;
///
/// let config = ContextConfig::builder().max_flush_passes(8).build();
/// assert_eq!(config.max_flush_passes(), 8);
/// assert_eq!(ContextConfig::default().max_flush_passes(), 32);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
pub struct ContextConfig {
    /// 一次 flush 允许的最大轮数；级联登记超过该轮数时返回 `FlushNotConverged`
    #[builder(default = UnitOfWorkController::DEFAULT_MAX_PASSES)]
    #[serde(default = "default_max_flush_passes")]
    max_flush_passes: usize,
}

fn default_max_flush_passes() -> usize {
    UnitOfWorkController::DEFAULT_MAX_PASSES
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_flush_passes: default_max_flush_passes(),
        }
    }
}

impl ContextConfig {
    pub fn max_flush_passes(&self) -> usize {
        self.max_flush_passes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: ContextConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ContextConfig::default());

        let config: ContextConfig = serde_json::from_str(r#"{"max_flush_passes":4}"#).unwrap();
        assert_eq!(config.max_flush_passes(), 4);
    }
}
