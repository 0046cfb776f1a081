//! Testing utilities for strategies

/// Route tracing output through the test harness; safe to call from every test
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "debug".into()),
        )
        .try_init();
}

/// Float comparison for derived scores
pub fn approx_eq(left: f64, right: f64) -> bool {
    (left - right).abs() < 1e-9
}

/// Test utilities for strategy validation
pub mod test_utils {
    pub fn assert_approx_eq(left: f64, right: f64) {
        assert!(
            super::approx_eq(left, right),
            "expected {} ≈ {}",
            left,
            right
        );
    }
}
