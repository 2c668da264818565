//! Subscriber installation for hosts that want the runtime's logs.

use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Environment variable selecting the hierarchical log layout.
pub const LOG_TREE_ENV: &str = "OPAL_LOG_TREE";

/// Install a global subscriber filtered by `RUST_LOG`.
///
/// Does nothing when `RUST_LOG` is unset or a subscriber is already
/// installed. Set `OPAL_LOG_TREE` for indented, span-nested output.
/// Safe to call more than once.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_err() {
            return;
        }
        let filter = EnvFilter::from_default_env();
        let installed = if std::env::var_os(LOG_TREE_ENV).is_some() {
            tracing_subscriber::registry()
                .with(
                    tracing_tree::HierarchicalLayer::new(2)
                        .with_targets(true)
                        .with_bracketed_fields(true),
                )
                .with(filter)
                .try_init()
        } else {
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .try_init()
        };
        if installed.is_err() {
            tracing::debug!("a global subscriber was already installed");
        }
    });
}
