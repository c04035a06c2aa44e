//! Custom certificate authority trust decision
//!
//! The coordinator may sit behind a certificate issued by a private CA that
//! is mounted into the container as a PEM bundle. Whether that bundle can be
//! used is decided once per process by probing the first URI contacted; the
//! decision is never revisited, so a transient probe failure disables the
//! bundle for the rest of the run.

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use reqwest::header::HeaderMap;
use reqwest::{Certificate, Client};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

const PEM_END: &str = "-----END CERTIFICATE-----";

/// Cached outcome of the trust probe
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrustState {
    /// Whether the probe has run
    pub probed: bool,
    /// Whether requests should verify against the custom bundle
    pub use_custom_ca: bool,
}

/// Decides once per process whether the custom CA bundle is usable
pub struct TrustResolver {
    bundle_path: PathBuf,
    custom_client: Option<Client>,
    state: Mutex<TrustState>,
}

impl TrustResolver {
    /// Create a resolver for the bundle at `bundle_path`
    ///
    /// A missing or unparsable bundle is not an error here; the probe simply
    /// resolves to "unusable" without touching the network.
    pub fn new(bundle_path: impl Into<PathBuf>) -> Self {
        let bundle_path = bundle_path.into();
        let custom_client = match build_custom_client(&bundle_path) {
            Ok(client) => Some(client),
            Err(e) => {
                debug!(error = %e, "Custom trust bundle not available");
                None
            }
        };

        Self {
            bundle_path,
            custom_client,
            state: Mutex::new(TrustState::default()),
        }
    }

    /// Path of the trust bundle
    pub fn bundle_path(&self) -> &Path {
        &self.bundle_path
    }

    /// Current cached state
    pub fn state(&self) -> TrustState {
        *self.state.lock()
    }

    /// Client verifying against the custom bundle, if one could be built
    pub fn custom_client(&self) -> Option<&Client> {
        self.custom_client.as_ref()
    }

    /// Resolve the trust decision, probing `uri` on the first call only
    ///
    /// The probe is a HEAD request through the custom-CA client. Any response
    /// below 400 makes the bundle usable; an error status or a transport
    /// failure makes it unusable.
    pub async fn resolve(&self, uri: &str, headers: &HeaderMap) -> bool {
        {
            let state = self.state.lock();
            if state.probed {
                return state.use_custom_ca;
            }
        }

        let use_custom_ca = match &self.custom_client {
            Some(client) => match client.head(uri).headers(headers.clone()).send().await {
                Ok(response) => {
                    let status = response.status();
                    debug!(uri, status = status.as_u16(), "Trust probe answered");
                    !status.is_client_error() && !status.is_server_error()
                }
                Err(e) => {
                    warn!(uri, error = %e, "Trust probe failed, using default verification");
                    false
                }
            },
            None => false,
        };

        let mut state = self.state.lock();
        if !state.probed {
            *state = TrustState {
                probed: true,
                use_custom_ca,
            };
            info!(
                bundle = %self.bundle_path.display(),
                use_custom_ca,
                "Trust strategy resolved"
            );
        }
        state.use_custom_ca
    }
}

/// Build a client that trusts only the certificates in the bundle
fn build_custom_client(bundle_path: &Path) -> Result<Client> {
    let pem = fs::read_to_string(bundle_path).map_err(|e| Error::IoRead {
        path: bundle_path.to_path_buf(),
        source: e,
    })?;

    let bundle_error = |message: String| Error::TrustBundle {
        path: bundle_path.to_path_buf(),
        message,
    };

    let mut builder = Client::builder().tls_built_in_root_certs(false);
    let mut count = 0;
    for block in pem.split_inclusive(PEM_END).filter(|b| b.contains(PEM_END)) {
        let certificate =
            Certificate::from_pem(block.trim().as_bytes()).map_err(|e| bundle_error(e.to_string()))?;
        builder = builder.add_root_certificate(certificate);
        count += 1;
    }

    if count == 0 {
        return Err(bundle_error("no certificates found".to_string()));
    }

    let client = builder.build().map_err(|e| bundle_error(e.to_string()))?;
    debug!(bundle = %bundle_path.display(), certificates = count, "Custom trust bundle loaded");
    Ok(client)
}
