//! Opal Runtime - an embeddable instance of the Opal dynamic-value runtime.
//!
//! [`Runtime`] ties the layers together: values from `opal_value`, keys
//! from `opal_hash`, lexical pads from `opal_pad`, packages and method
//! resolution from `opal_mro`, and the advisory queue from
//! `opal_diagnostic`.
//!
//! ```text
//! let mut runtime = Runtime::builder().default_mro(MroAlgorithm::C3).build();
//! runtime.set_parents("Dog", &["Animal"])?;
//! let speak = runtime.resolve_method("Dog", "speak")?;
//! ```
//!
//! Hosts that want the runtime's logs call [`init_tracing`] once.

mod config;
mod runtime;
mod tracing_setup;

pub use config::{RuntimeBuilder, RuntimeConfig};
pub use runtime::Runtime;
pub use tracing_setup::{init_tracing, LOG_TREE_ENV};

pub use opal_diagnostic::{Advisory, AdvisoryKind, DiagnosticConfig, Site};
pub use opal_hash::{set_process_wide_interning, InterningMode};
pub use opal_mro::{MroAlgorithm, ReverseIndexPolicy};
pub use opal_value::{RuntimeError, RuntimeResult, Sv};
