//! Shared helpers for the sealfs-crypto integration tests.

#![allow(dead_code)]

use std::sync::Once;

use sealfs_core::config::KdfConfig;
use tracing_subscriber::EnvFilter;

/// KDF costs low enough to keep tests fast. Never use outside tests.
pub fn fast_kdf() -> KdfConfig {
    KdfConfig {
        scrypt_cost_param: 1024,
        argon2_mem_cost_kib: 1024,
        argon2_time_cost: 1,
        argon2_parallelism: 1,
        ..KdfConfig::default()
    }
}

/// Route `tracing` output through the test harness; honours `RUST_LOG`.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}
