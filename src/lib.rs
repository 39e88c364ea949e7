//! socks5-rust is a standalone SOCKS5 proxy server.
//!
//! The SOCKS5 protocol state machine (method negotiation, RFC 1929
//! username/password authentication, CONNECT and UDP ASSOCIATE handling)
//! is provided by the embedded [`fast-socks5`](https://crates.io/crates/fast-socks5)
//! engine. This crate owns everything around it: deriving the IP address
//! advertised to clients for UDP relay, raising the process file-descriptor
//! ceiling to a platform-appropriate level, and assembling the engine
//! configuration from command line flags and an optional configuration file.
//!
//! ## Usage
//!
//! Build the crate and you will get the `socks5d` binary:
//!
//! ```bash
//! socks5d --listen :1080 --server-ip 203.0.113.9
//! ```
//!
//! ## API Usage
//!
//! ```no_run
//! use socks5_rust::{run_server, Config};
//!
//! let config = Config::default();
//! # let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
//! # rt.block_on(async {
//! run_server(config).await.unwrap();
//! # });
//! ```

/// socks5-rust version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod config;
#[cfg(unix)]
pub mod daemonize;
pub mod error;
#[cfg(feature = "logging")]
pub mod logging;
pub mod monitor;
pub mod server;
pub mod service;
pub mod sys;
pub mod vparser;

pub use self::{
    config::{Config, ListenAddr},
    error::{ServiceError, ServiceResult},
    server::run_server,
};
