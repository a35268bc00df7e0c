//! # Herald Core
//!
//! Foundational types shared by every herald crate: the error taxonomy,
//! identifiers, identities and roles, tiers, reservations, the permission
//! model and the account store interface.
//!
//! ## Key Components
//!
//! - **Permissions**: the closed set of access levels and the single pure
//!   function that resolves them
//! - **Identities**: anonymous visitors and authenticated accounts
//! - **Messages**: immutable records delivered to subscribers
//! - **Traits**: the account store consumed by the service layer

pub mod error;
pub mod id;
pub mod identity;
pub mod message;
pub mod permission;
pub mod reservation;
pub mod tier;
pub mod traits;

// Re-export commonly used types
pub use error::{Error, Result};
pub use id::{MessageId, SubscriberId, generate_id_with_prefix};
pub use identity::{ANONYMOUS_USERNAME, Identity, Role, User, VisitorKey};
pub use message::{Attachment, DEFAULT_MESSAGE_BODY, EventKind, Message};
pub use permission::{Permission, resolve_permission};
pub use reservation::Reservation;
pub use tier::Tier;
pub use traits::AccountStore;
