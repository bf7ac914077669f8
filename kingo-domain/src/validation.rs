//! 校验结果（ErrorInfo）
//!
//! 约束 DSL 本身不在本库范围内；这里只定义“校验报告了哪些错误”的载体，
//! 供事件在发布前自检（`DomainEvent::validate`）并随 `InvalidEvent` 一起传出。
//!
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// 校验错误详情：成员级错误 + 可选的整体错误
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    member_errors: BTreeMap<String, Vec<String>>,
    error_message: Option<String>,
}

impl ErrorInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一个成员错误（同一成员可有多条）
    pub fn with_member_error(mut self, member: impl Into<String>, message: impl Into<String>) -> Self {
        self.add_member_error(member, message);
        self
    }

    pub fn with_error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn add_member_error(&mut self, member: impl Into<String>, message: impl Into<String>) {
        self.member_errors
            .entry(member.into())
            .or_default()
            .push(message.into());
    }

    pub fn member_errors(&self) -> &BTreeMap<String, Vec<String>> {
        &self.member_errors
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn has_errors(&self) -> bool {
        !self.member_errors.is_empty() || self.error_message.is_some()
    }

    /// 无错误时返回 `Ok(())`，便于在 `validate` 末尾直接返回
    pub fn into_result(self) -> Result<(), ErrorInfo> {
        if self.has_errors() { Err(self) } else { Ok(()) }
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        if let Some(message) = &self.error_message {
            write!(f, "{message}")?;
            first = false;
        }
        for (member, messages) in &self.member_errors {
            for message in messages {
                if !first {
                    write!(f, "; ")?;
                }
                write!(f, "{member}: {message}")?;
                first = false;
            }
        }
        Ok(())
    }
}
