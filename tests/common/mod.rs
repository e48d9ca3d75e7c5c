use tracing_subscriber::EnvFilter;

/// 测试日志，`RUST_LOG=utpl=debug cargo test` 查看引擎输出
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
