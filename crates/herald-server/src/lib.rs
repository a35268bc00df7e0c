//! # Herald Server
//!
//! Server binary and request layer of the herald notification service.
//!
//! [`NotificationService`] ties the topic registry, the visitor tracker and
//! the account store together and is the only thing HTTP handlers talk to.
//! Reservation changes made through it are persisted first and then applied
//! to the live topic before the call returns.
//!
//! ## Features
//!
//! - **Publish / subscribe**: NDJSON streams with replay and keepalives
//! - **Reservations**: live re-authorization of open streams
//! - **Background manager**: idle visitor eviction and topic pruning
//! - **Graceful shutdown**: signal handling that ends every open stream
//!
//! ## Usage
//!
//! ```rust,no_run
//! use herald_config::Config;
//! use herald_server::HeraldServer;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let server = HeraldServer::new(Config::default()).await?;
//!     server.start().await?;
//!     Ok(())
//! }
//! ```

pub mod account;
pub mod caller;
pub mod cli;
pub mod error;
pub mod handlers;
pub mod manager;
pub mod routes;
pub mod server;
pub mod service;
pub mod shutdown;
pub mod stream;

pub use account::AccountInfo;
pub use error::{ApiError, Result, ServerError};
pub use manager::{Manager, ManagerStats};
pub use routes::create_router;
pub use server::HeraldServer;
pub use service::{ActiveSubscription, AttachmentUpload, NotificationService, PublishRequest};
pub use shutdown::{ShutdownHandle, ShutdownSignal};
