//! Binary protocol event receiver library.

pub mod backend;
pub mod config;
pub mod dispatch;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod protocol;
pub mod receiver;

pub use config::ReceiverConfig;
pub use dispatch::Dispatcher;
pub use lifecycle::Shutdown;
pub use receiver::{BinaryReceiver, ReceiverError};
