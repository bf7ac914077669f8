//! 工作单元使用示例
//!
//! 在一个控制器下登记工作单元与事件缓冲，修改聚合、发布事件，最后统一刷新。
//!
//! 运行示例：
//! ```bash
//! cargo run -p kingo-domain --example unit_of_work_basics
//! ```

use kingo_domain::aggregate::{Aggregate, AggregateRef};
use kingo_domain::domain_event::{BusinessContext, DomainEvent};
use kingo_domain::error::DomainResult;
use kingo_domain::eventing::{EventBuffer, InMemoryEventBus};
use kingo_domain::persist::InMemoryAggregateStore;
use kingo_domain::unit_of_work::{UnitOfWork, UnitOfWorkController};
use kingo_macros::aggregate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[aggregate(key = u64)]
struct Product {
    name: String,
    stock: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StockAdjusted {
    product: u64,
    stock: u32,
}

impl DomainEvent for StockAdjusted {
    fn event_type(&self) -> &str {
        "Product.StockAdjusted"
    }
}

#[tokio::main]
async fn main() -> DomainResult<()> {
    let store = Arc::new(InMemoryAggregateStore::<Product>::new());
    store.seed(Product {
        name: "keyboard".into(),
        stock: 3,
        ..Product::with_key(1)
    });

    let bus = InMemoryEventBus::default();
    let controller = UnitOfWorkController::new(UnitOfWorkController::DEFAULT_MAX_PASSES);
    let products = UnitOfWork::new(store.clone(), controller.clone());
    let events = EventBuffer::new(
        Arc::new(bus.clone()),
        controller.clone(),
        BusinessContext::default(),
    );

    if let Some(keyboard) = products.try_find(&1).await? {
        let mut p = keyboard.write();
        p.stock += 10;
        p.increment_version()?;
        events.publish(&StockAdjusted {
            product: 1,
            stock: p.stock,
        })?;
    }

    let mouse = AggregateRef::new(Product {
        name: "mouse".into(),
        ..Product::with_key(2)
    });
    products.add(mouse)?;

    println!("刷新前: requires_flush = {}", products.requires_flush());
    let passes = controller.flush(&CancellationToken::new()).await?;
    println!("刷新完成，共 {} 轮", passes);

    for key in [1, 2] {
        if let Some(p) = store.get(&key) {
            println!("  {} {} stock={} version={}", key, p.name, p.stock, p.version());
        }
    }
    for e in bus.published() {
        println!("  事件 {} {}", e.event_type(), e.payload());
    }
    Ok(())
}
