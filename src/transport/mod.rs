//! HTTP transport to the coordinator
//!
//! Handles:
//! - The one-time probe deciding whether the custom trust bundle is usable
//! - GET/HEAD/PATCH requests carrying the auth token header

mod client;
mod trust;

pub use client::*;
pub use trust::*;

#[cfg(test)]
pub(crate) mod testing {
    use std::path::PathBuf;
    use std::sync::Arc;

    use crate::config::TransportSettings;

    use super::{Transport, TrustResolver};

    /// PEM bundle checked into the test fixtures
    pub(crate) fn fixture_bundle() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures")
            .join("trust.pem")
    }

    pub(crate) fn transport_with_bundle(bundle: impl Into<PathBuf>, token: &str) -> Transport {
        let trust = Arc::new(TrustResolver::new(bundle));
        Transport::new(&TransportSettings::default(), token, trust).unwrap()
    }

    /// Transport whose trust bundle does not exist, so no probe is sent
    pub(crate) fn plain_transport(token: &str) -> Transport {
        transport_with_bundle("/nonexistent/trust.pem", token)
    }
}
