use std::sync::Once;

static INIT: Once = Once::new();

fn builder() -> env_logger::Builder {
    let env = env_logger::Env::default().default_filter_or("info");
    let mut builder = env_logger::Builder::from_env(env);
    builder.format_timestamp_millis();
    builder
}

/// Installs `env_logger` with an `info` default. `RUST_LOG` overrides the filter.
/// Safe to call more than once.
pub fn init() {
    INIT.call_once(|| {
        let _ = builder().try_init();
    });
}

/// Like [`init`], but output goes through the test harness capture.
pub fn init_captured() {
    INIT.call_once(|| {
        let _ = builder().is_test(true).try_init();
    });
}
