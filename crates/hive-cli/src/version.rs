pub const FULL: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "+git.",
    env!("HIVE_GIT_COUNT"),
    ".",
    env!("HIVE_GIT_SHA"),
    env!("HIVE_GIT_DIRTY")
);
