use kingo_domain::aggregate::Aggregate;
use kingo_domain::version::{AggregateVersion, DateTimeVersion};
use kingo_macros::aggregate;

#[aggregate]
struct Account {
    name: String,
}

#[aggregate(key = u64, name = "order")]
struct Order {
    lines: Vec<String>,
}

#[aggregate(key = u32, version = DateTimeVersion, debug = false)]
struct Shipment {
    version: DateTimeVersion,
    carrier: String,
}

fn main() {
    let account = Account::with_key("acc-1".to_string());
    assert_eq!(account.key(), "acc-1");
    assert_eq!(account.version(), AggregateVersion::new());
    assert_eq!(Account::TYPE, "Account");
    let _ = format!("{account:?}");

    let mut order = Order::with_key(7);
    assert_eq!(*order.key(), 7);
    assert_eq!(Order::TYPE, "order");
    order.lines.push("book".into());
    let v = order.increment_version().unwrap();
    assert_eq!(v.value(), 1);

    let shipment = Shipment::with_key(3);
    assert_eq!(shipment.version(), DateTimeVersion::default());
    let _ = shipment.carrier.clone();
}
