// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]

mod fps;

pub use fps::FpsCounter;

/// Installs the process-wide fmt subscriber. `RUST_LOG` controls filtering;
/// a second call is a no-op.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .try_init();
}
