//! 事件投递模型（SerializedEvent）
//!
//! 事件缓冲在发布时即把强类型事件序列化为该形态，事件总线只与它打交道，
//! 订阅方可按需 `decode` 回具体类型。
//!
use crate::{
    domain_event::{BusinessContext, DomainEvent},
    error::DomainResult,
};
use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
pub struct SerializedEvent {
    /// 事件唯一标识符
    event_id: String,
    /// 事件类型，用于路由到处理器
    event_type: String,
    /// 事件进入缓冲区的时间
    occurred_at: DateTime<Utc>,
    /// 业务上下文（关联/因果/主体）
    #[builder(default)]
    context: BusinessContext,
    /// 事件负载
    payload: Value,
}

impl SerializedEvent {
    /// 序列化一个（已校验的）领域事件
    pub fn from_event<E: DomainEvent>(event: &E, context: BusinessContext) -> DomainResult<Self> {
        Ok(Self {
            event_id: Uuid::new_v4().to_string(),
            event_type: event.event_type().to_string(),
            occurred_at: Utc::now(),
            context,
            payload: serde_json::to_value(event)?,
        })
    }

    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn context(&self) -> &BusinessContext {
        &self.context
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// 反序列化为具体事件类型
    pub fn decode<E: DeserializeOwned>(&self) -> DomainResult<E> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }
}
