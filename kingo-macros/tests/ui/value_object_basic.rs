use kingo_macros::value_object;

#[value_object]
struct Amount {
    value: i64,
}

#[value_object(debug = false)]
struct NonDebugVO(i32);

#[value_object(ordered = true)]
struct Sequence(u64);

#[value_object]
enum Level {
    #[default]
    Low,
    High,
}

fn main() {
    // Debug 默认开启，应可格式化
    let _ = format!("{:?}", Amount { value: 0 });

    let a = Amount::default();
    let _b = a.clone();
    let _eq = a == Amount { value: 0 };

    let _ = NonDebugVO(1);

    // ordered = true：可比较、可复制、可哈希
    let s1 = Sequence(1);
    let s2 = s1;
    assert!(Sequence(2) > s1);
    let mut set = std::collections::HashSet::new();
    set.insert(s2);

    let _lv: Level = Default::default();
    let _ = Level::High;
}
