//! Tests for ActiveObjectConfig builder and defaults.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ao::{ActiveObjectConfig, DEFAULT_STACK_SIZE};

#[test]
fn config_builder() {
    let config = ActiveObjectConfig::builder()
        .name("telemetry")
        .stack_size(16 * 1024)
        .build();

    assert_eq!(config.name, "telemetry");
    assert_eq!(config.stack_size, 16 * 1024);
}

#[test]
fn config_default() {
    let config = ActiveObjectConfig::default();

    assert_eq!(config.name, "active");
    assert_eq!(config.stack_size, DEFAULT_STACK_SIZE);
    (config.background_task)();
}

#[test]
fn config_background_task_is_shared_by_clones() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let config = ActiveObjectConfig::new(
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
        },
        4096,
    );
    let copy = config.clone();

    (config.background_task)();
    (copy.background_task)();

    assert_eq!(copy.stack_size, 4096);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}
