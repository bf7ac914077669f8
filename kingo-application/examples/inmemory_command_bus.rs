use async_trait::async_trait;
use kingo_application::InMemoryCommandBus;
use kingo_application::command::Command;
use kingo_application::command_bus::CommandBus;
use kingo_application::command_handler::CommandHandler;
use kingo_application::context::{AppContext, ContextFactory, OperationContext};
use kingo_application::error::AppError;
use kingo_application::repository::Repository;
use kingo_domain::aggregate::Aggregate;
use kingo_domain::domain_event::{BusinessContext, DomainEvent};
use kingo_domain::eventing::InMemoryEventBus;
use kingo_domain::persist::InMemoryAggregateStore;
use kingo_macros::aggregate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[aggregate(key = u32)]
struct User {
    name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct UserRenamed {
    id: u32,
    name: String,
}

impl DomainEvent for UserRenamed {
    fn event_type(&self) -> &str {
        "User.Renamed"
    }
}

#[derive(Debug)]
struct RenameUser {
    id: u32,
    name: String,
}

impl Command for RenameUser {
    const NAME: &'static str = "RenameUser";
}

struct RenameUserHandler {
    users: Repository<User, InMemoryAggregateStore<User>>,
}

#[async_trait]
impl CommandHandler<RenameUser> for RenameUserHandler {
    async fn handle(&self, ctx: &OperationContext, cmd: RenameUser) -> Result<(), AppError> {
        let user = self.users.get(ctx, &cmd.id).await?;
        {
            let mut u = user.write();
            u.name = cmd.name.clone();
            u.increment_version()?;
        }
        ctx.publish(&UserRenamed {
            id: cmd.id,
            name: cmd.name,
        })?;
        Ok(())
    }
}

#[derive(Debug)]
struct DeleteUser;

impl Command for DeleteUser {
    const NAME: &'static str = "DeleteUser";
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(InMemoryAggregateStore::<User>::new());
    store.seed(User {
        name: "alice".into(),
        ..User::with_key(1)
    });

    let events = InMemoryEventBus::default();
    let factory = ContextFactory::builder()
        .event_bus(Arc::new(events.clone()))
        .build();
    let bus = InMemoryCommandBus::new(factory);
    bus.register::<RenameUser, _>(Arc::new(RenameUserHandler {
        users: Repository::new(store.clone()),
    }))?;

    let ctx = AppContext {
        biz: BusinessContext::builder()
            .correlation_id("cor-1".into())
            .actor_type("user".into())
            .actor_id("u-1".into())
            .build(),
        idempotency_key: Some("idem-1".into()),
    };
    bus.dispatch(
        &ctx,
        RenameUser {
            id: 1,
            name: "Alice".into(),
        },
    )
    .await?;

    if let Some(user) = store.get(&1) {
        println!("User 1: name={} version={}", user.name, user.version());
    }
    for e in events.published() {
        println!("Published {} {}", e.event_type(), e.payload());
    }

    // 不存在的聚合 -> AggregateNotFound，本次操作不写出任何变更
    if let Err(err) = bus
        .dispatch(
            &ctx,
            RenameUser {
                id: 7,
                name: "Eve".into(),
            },
        )
        .await
    {
        eprintln!("rename failed as expected: {}", err);
    }

    // 未注册的命令 -> HandlerNotFound
    if let Err(AppError::HandlerNotFound(name)) = bus.dispatch(&ctx, DeleteUser).await {
        eprintln!("HandlerNotFound as expected for command: {}", name);
    }
    Ok(())
}
