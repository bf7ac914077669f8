//! Kingo 过程宏（kingo-macros）
//!
//! - `#[aggregate]`：为结构体补齐 `key`/`version` 字段并实现 `Aggregate`；
//! - `#[value_object]`：为值对象合并常用派生。
//!
use proc_macro::TokenStream;

mod aggregate;
mod attr_args;
mod derive_utils;
mod field_utils;
mod value_object;

/// 聚合宏
/// - 若缺失则追加字段：`key: KeyType`, `version: VersionType`，并置于字段最前
/// - 自动实现 `::kingo_domain::aggregate::Aggregate`（`key/version/version_mut`）
/// - 生成 `with_key` 构造函数（其余字段取 `Default`）
/// - 支持参数：`#[aggregate(key = KeyType, version = VersionType, name = "...", debug = true|false)]`
///   - `key` 默认 `String`
///   - `version` 默认 `::kingo_domain::version::AggregateVersion`
///   - `name` 默认结构体名
#[proc_macro_attribute]
pub fn aggregate(attr: TokenStream, item: TokenStream) -> TokenStream {
    aggregate::expand(attr, item)
}

/// 值对象宏
/// - 合并/追加派生：Debug（可关闭）、Default、Clone、Serialize、Deserialize、PartialEq、Eq
/// - 参数：`#[value_object(debug = true|false)]`，默认 true
#[proc_macro_attribute]
pub fn value_object(attr: TokenStream, item: TokenStream) -> TokenStream {
    value_object::expand(attr, item)
}
