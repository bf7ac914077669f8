//! 演示：命令处理器修改账户并发布事件，进程内事件处理器据此更新对账单，
//! 全部变更在一次操作结束时统一写出。
//!
//! 运行：`RUST_LOG=debug cargo run -p demo`

use async_trait::async_trait;
use kingo_application::command::Command;
use kingo_application::command_bus::CommandBus;
use kingo_application::command_handler::CommandHandler;
use kingo_application::context::{AppContext, ContextFactory, OperationContext};
use kingo_application::dto::Dto;
use kingo_application::error::AppError;
use kingo_application::event_handler::{EventHandler, HandledEventType};
use kingo_application::query::Query;
use kingo_application::query_bus::QueryBus;
use kingo_application::query_handler::QueryHandler;
use kingo_application::repository::Repository;
use kingo_application::{InMemoryCommandBus, InMemoryQueryBus, InProcessEventBus};
use kingo_domain::aggregate::Aggregate;
use kingo_domain::domain_event::{BusinessContext, DomainEvent};
use kingo_domain::error::DomainResult;
use kingo_domain::eventing::{InMemoryEventBus, SerializedEvent};
use kingo_domain::persist::InMemoryAggregateStore;
use kingo_domain::validation::ErrorInfo;
use kingo_macros::aggregate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use ulid::Ulid;

#[derive(Debug, thiserror::Error)]
enum AccountError {
    #[error("insufficient funds: balance={balance}, requested={requested}")]
    InsufficientFunds { balance: i64, requested: i64 },
}

impl From<AccountError> for AppError {
    fn from(e: AccountError) -> Self {
        AppError::Validation(e.to_string())
    }
}

#[aggregate(key = String)]
struct Account {
    balance: i64,
}

impl Account {
    fn deposit(&mut self, amount: i64) -> DomainResult<MoneyMoved> {
        self.balance += amount;
        self.increment_version()?;
        Ok(MoneyMoved {
            account: self.key().clone(),
            delta: amount,
        })
    }

    fn withdraw(&mut self, amount: i64) -> Result<MoneyMoved, AppError> {
        if self.balance < amount {
            return Err(AccountError::InsufficientFunds {
                balance: self.balance,
                requested: amount,
            }
            .into());
        }
        self.balance -= amount;
        self.increment_version()?;
        Ok(MoneyMoved {
            account: self.key().clone(),
            delta: -amount,
        })
    }
}

#[aggregate(key = String)]
struct Statement {
    lines: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MoneyMoved {
    account: String,
    delta: i64,
}

impl DomainEvent for MoneyMoved {
    fn event_type(&self) -> &str {
        "Account.MoneyMoved"
    }

    fn validate(&self) -> Result<(), ErrorInfo> {
        let mut info = ErrorInfo::new();
        if self.delta == 0 {
            info.add_member_error("delta", "must not be zero");
        }
        info.into_result()
    }
}

type Accounts = Repository<Account, InMemoryAggregateStore<Account>>;

struct Deposit {
    account: String,
    amount: i64,
}

impl Command for Deposit {
    const NAME: &'static str = "Deposit";
}

struct Withdraw {
    account: String,
    amount: i64,
}

impl Command for Withdraw {
    const NAME: &'static str = "Withdraw";
}

struct AccountHandler {
    accounts: Accounts,
}

#[async_trait]
impl CommandHandler<Deposit> for AccountHandler {
    async fn handle(&self, ctx: &OperationContext, cmd: Deposit) -> Result<(), AppError> {
        let account = match self.accounts.find(ctx, &cmd.account).await? {
            Some(account) => account,
            None => self.accounts.add(ctx, Account::with_key(cmd.account.clone()))?,
        };
        let event = account.write().deposit(cmd.amount)?;
        ctx.publish(&event)
    }
}

#[async_trait]
impl CommandHandler<Withdraw> for AccountHandler {
    async fn handle(&self, ctx: &OperationContext, cmd: Withdraw) -> Result<(), AppError> {
        let account = self.accounts.get(ctx, &cmd.account).await?;
        let event = account.write().withdraw(cmd.amount)?;
        ctx.publish(&event)
    }
}

/// 根据资金变动事件维护对账单
struct StatementProjection {
    statements: Repository<Statement, InMemoryAggregateStore<Statement>>,
}

#[async_trait]
impl EventHandler for StatementProjection {
    fn handler_name(&self) -> &str {
        "statement-projection"
    }

    fn handled_event_type(&self) -> HandledEventType {
        HandledEventType::One("Account.MoneyMoved".into())
    }

    async fn handle(&self, ctx: &OperationContext, event: &SerializedEvent) -> anyhow::Result<()> {
        let moved: MoneyMoved = event.decode()?;
        let statement = match self.statements.find(ctx, &moved.account).await? {
            Some(statement) => statement,
            None => self
                .statements
                .add(ctx, Statement::with_key(moved.account.clone()))?,
        };
        let mut s = statement.write();
        s.lines.push(moved.delta);
        s.increment_version()?;
        Ok(())
    }
}

struct GetBalance {
    account: String,
}

#[derive(Debug, Serialize)]
struct BalanceDto {
    account: String,
    balance: i64,
    version: u32,
}

impl Dto for BalanceDto {}

impl Query for GetBalance {
    const NAME: &'static str = "GetBalance";
    type Dto = BalanceDto;
}

#[async_trait]
impl QueryHandler<GetBalance> for AccountHandler {
    async fn handle(&self, ctx: &OperationContext, q: GetBalance) -> Result<BalanceDto, AppError> {
        let account = self.accounts.get(ctx, &q.account).await?;
        let a = account.read();
        Ok(BalanceDto {
            account: a.key().clone(),
            balance: a.balance,
            version: a.version().value(),
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let accounts = Arc::new(InMemoryAggregateStore::<Account>::new());
    let statements = Arc::new(InMemoryAggregateStore::<Statement>::new());
    let outbox = InMemoryEventBus::default();

    let events = InProcessEventBus::new(vec![Arc::new(StatementProjection {
        statements: Repository::new(statements.clone()),
    })])
    .forward_to(Arc::new(outbox.clone()));
    let factory = ContextFactory::builder().event_bus(Arc::new(events)).build();

    let handler = Arc::new(AccountHandler {
        accounts: Repository::new(accounts.clone()),
    });
    let commands = InMemoryCommandBus::new(factory.clone());
    commands.register::<Deposit, _>(handler.clone())?;
    commands.register::<Withdraw, _>(handler.clone())?;
    let queries = InMemoryQueryBus::new(factory);
    queries.register::<GetBalance, _>(handler)?;

    let app = AppContext {
        biz: BusinessContext::builder()
            .correlation_id(Ulid::new().to_string())
            .actor_type("user".into())
            .actor_id("demo".into())
            .build(),
        idempotency_key: None,
    };

    commands
        .dispatch(
            &app,
            Deposit {
                account: "acc-1".into(),
                amount: 100,
            },
        )
        .await?;
    commands
        .dispatch(
            &app,
            Withdraw {
                account: "acc-1".into(),
                amount: 30,
            },
        )
        .await?;

    if let Err(err) = commands
        .dispatch(
            &app,
            Withdraw {
                account: "acc-1".into(),
                amount: 1_000,
            },
        )
        .await
    {
        warn!(error = %err, "withdraw rejected, nothing was written");
    }

    let balance = queries
        .dispatch(
            &app,
            GetBalance {
                account: "acc-1".into(),
            },
        )
        .await?;
    info!(
        account = %balance.account,
        balance = balance.balance,
        version = balance.version,
        "balance"
    );

    if let Some(statement) = statements.get(&"acc-1".to_string()) {
        info!(lines = ?statement.lines, "statement");
    }
    for event in outbox.published() {
        info!(
            event_type = event.event_type(),
            correlation_id = ?event.context().correlation_id(),
            payload = %event.payload(),
            "published"
        );
    }
    Ok(())
}
