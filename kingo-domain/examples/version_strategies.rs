//! 版本策略使用示例
//!
//! 展示 `AggregateVersion` 与 `DateTimeVersion` 如何通过同一个 `Revision` 接口使用。
//!
//! 运行示例：
//! ```bash
//! cargo run -p kingo-domain --example version_strategies
//! ```

use kingo_domain::error::DomainResult;
use kingo_domain::version::{AggregateVersion, DateTimeVersion, Revision};

fn main() -> DomainResult<()> {
    println!("=== 版本策略使用示例 ===\n");

    // 1. 计数器版本
    println!("1. 计数器版本");
    let v0 = AggregateVersion::new();
    let v1 = v0.increment()?;
    println!("   初始版本: {} (is_new = {})", v0, v0.is_new());
    println!("   递增后: {}", v1);
    println!("   v0 < v1: {}\n", v0 < v1);

    // 2. 溢出
    println!("2. 溢出");
    match AggregateVersion::MAX.increment() {
        Ok(v) => println!("   意外递增到 {}", v),
        Err(e) => println!("   {}\n", e),
    }

    // 3. 时间戳版本
    println!("3. 时间戳版本");
    let t0 = DateTimeVersion::now();
    let t1 = t0.increment()?;
    println!("   t0 = {}", t0);
    println!("   t1 = {}", t1);
    println!("   t0 < t1: {}\n", t0 < t1);

    // 4. 泛型使用
    println!("4. 泛型使用");
    println!("   计数器递增三次: {}", bump(AggregateVersion::new(), 3)?);
    println!("   时间戳递增三次: {}", bump(DateTimeVersion::now(), 3)?);

    // 5. 序列化
    println!("\n5. 序列化");
    let json = serde_json::to_string(&AggregateVersion::from_value(100))?;
    println!("   AggregateVersion(100) -> {}", json);

    println!("\n=== 示例完成 ===");
    Ok(())
}

fn bump<V: Revision>(mut version: V, times: usize) -> DomainResult<V> {
    for _ in 0..times {
        version = version.increment()?;
    }
    Ok(version)
}
