use serde::Serialize;

/// 数据传输对象（DTO）
///
/// 查询结果的载体，序列化友好，与聚合解耦。
pub trait Dto: Serialize + Send + Sync + 'static {}
