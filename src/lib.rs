//! # certmill: unattended ACME certificate client
//!
//! certmill obtains and renews X.509 server certificates from an ACME CA,
//! holding its key material in a file-backed keystore. Renewal happens "in
//! place": the fresh certificate replaces the prior one under the same
//! friendly name, so consumers keyed to that name pick it up without
//! reconfiguration. It speaks the legacy boulder dialect first and the
//! modern key space best-effort.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use certmill::{Config, Driver};
//!
//! #[tokio::main]
//! async fn main() -> certmill::Result<()> {
//!     let config = Config::load("certmill.toml").await?;
//!     Driver::new(config).run().await
//! }
//! ```

pub mod account;
pub mod challenge;
pub mod config;
pub mod crypto;
pub mod csr;
pub mod directory;
pub mod driver;
pub mod encoding;
pub mod error;
pub mod export;
pub mod keystore;
pub mod lifecycle;
pub mod lockfile;
pub mod transport;
pub mod types;

pub use account::{AccountConfig, AccountManager, AccountOptions};
pub use challenge::{
    AuthzOrchestrator, ChallengeHandler, Dns01ManualHandler, Http01FileHandler,
};
pub use config::{CertSpec, Config};
pub use crypto::{Jwk, JwsSigner, KeyAlgorithm, KeyMaterial};
pub use csr::CsrParams;
pub use directory::{AcmeDialect, Directory};
pub use driver::Driver;
pub use error::{AcmeError, Result};
pub use export::Exporter;
pub use keystore::{CertificateStore, FileStore, KeyStore, StoreContext, StoredCertificate};
pub use lifecycle::{Disposition, LifecycleManager};
pub use lockfile::Lockfile;
pub use transport::{AcmeResponse, Transport};
pub use types::{Authorization, Challenge, ChallengeType, Identifier, Problem};
