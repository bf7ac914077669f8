//! 领域层统一错误定义
//!
//! 覆盖聚合集合、工作单元、事件缓冲与控制器在误用或输入非法时的本地失败，
//! 以及存储/总线在刷新（flush）阶段传出的错误。所有错误均就地返回、从不吞掉。
//!
use crate::validation::ErrorInfo;
use thiserror::Error;

/// 统一错误类型（基础库最小必要集）
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum DomainError {
    // --- 聚合集合/工作单元 ---
    #[error("duplicate key: type={aggregate_type}, key={key}")]
    DuplicateKey {
        aggregate_type: &'static str,
        key: String,
    },
    #[error("invalid state: {reason}")]
    InvalidState { reason: String },

    // --- 版本 ---
    #[error("version overflow: {value} cannot be incremented")]
    Overflow { value: String },
    #[error("version conflict: key={key}, expected={expected}, actual={actual}")]
    VersionConflict {
        key: String,
        expected: String,
        actual: String,
    },

    // --- 事件 ---
    #[error("invalid event: type={event_type}, errors={errors}")]
    InvalidEvent {
        event_type: String,
        errors: ErrorInfo,
    },
    #[error("event bus error: {reason}")]
    EventBus { reason: String },
    #[error("event handler error: handler={handler}, reason={reason}")]
    EventHandler { handler: String, reason: String },

    // --- 生命周期/刷新 ---
    #[error("object disposed: {object}")]
    ObjectDisposed { object: &'static str },
    #[error("flush cancelled before pass {pass}")]
    Cancelled { pass: usize },
    #[error("flush did not converge after {passes} passes")]
    FlushNotConverged { passes: usize },

    // --- 存储/序列化 ---
    #[error("store error: {reason}")]
    Store { reason: String },
    #[error("serialization error: {source}")]
    Serde {
        #[from]
        source: serde_json::Error,
    },
}

/// 统一 Result 类型别名
pub type DomainResult<T> = Result<T, DomainError>;

impl DomainError {
    pub fn store(reason: impl Into<String>) -> Self {
        Self::Store {
            reason: reason.into(),
        }
    }

    pub fn event_bus(reason: impl Into<String>) -> Self {
        Self::EventBus {
            reason: reason.into(),
        }
    }

    pub fn disposed(object: &'static str) -> Self {
        Self::ObjectDisposed { object }
    }
}
