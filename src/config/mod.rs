//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ReceiverConfig (validated, immutable)
//!     → passed by value into the receiver service
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - TLS identity paths may come from the environment, resolved at startup
//!   without writing any process-wide state

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::ReceiverConfig;
pub use schema::{AuthConfig, ConnectionConfig, ObservabilityConfig};
pub use schema::{TcpTransportConfig, TlsTransportConfig, UserCredentials};
