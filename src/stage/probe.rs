use std::{
    collections::HashMap,
    sync::{Arc, Mutex, OnceLock, PoisonError},
};

use tokio::{
    runtime::{Handle, RuntimeFlavor},
    task::block_in_place,
};

use crate::transform::{probe_options, Transformer};

/// What is known about a transformer's support for the `caller` option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Unknown,
    Supported,
    Unsupported,
}

/// Checks once whether a transformer accepts the `caller` option and remembers the answer.
///
/// The answer is never recomputed, even if the transformer behind it changes.
#[derive(Debug, Default)]
pub struct CapabilityProbe {
    supports_caller: OnceLock<bool>,
}

impl CapabilityProbe {
    pub const fn new() -> Self {
        Self {
            supports_caller: OnceLock::new(),
        }
    }

    /// The process-wide probe for the transformer called `name`.
    pub fn shared(name: &str) -> Arc<CapabilityProbe> {
        static PROBES: OnceLock<Mutex<HashMap<String, Arc<CapabilityProbe>>>> = OnceLock::new();

        let mut probes = PROBES
            .get_or_init(Default::default)
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        probes.entry(name.to_string()).or_default().clone()
    }

    /// Whether `transformer` accepts the `caller` option.
    ///
    /// The first call blocks while the transformer loads a partial config. On a multi-threaded
    /// tokio runtime the worker is handed over with [`tokio::task::block_in_place`] for the duration.
    pub fn supports_caller_option(&self, transformer: &dyn Transformer) -> bool {
        *self.supports_caller.get_or_init(|| {
            // NOTE: Rather than matching versions, see whether a partial config load rejects `caller`.
            match blocking(|| transformer.load_partial_config(&probe_options())) {
                Ok(()) => {
                    tracing::debug!(transformer = transformer.name(), "transformer supports the caller option");
                    true
                }
                Err(err) => {
                    tracing::debug!(
                        transformer = transformer.name(),
                        error = %err,
                        "transformer rejected the caller option"
                    );
                    false
                }
            }
        })
    }

    pub fn state(&self) -> Capability {
        match self.supports_caller.get() {
            None => Capability::Unknown,
            Some(true) => Capability::Supported,
            Some(false) => Capability::Unsupported,
        }
    }
}

fn blocking<T>(work: impl FnOnce() -> T) -> T {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => block_in_place(work),
        _ => work(),
    }
}
