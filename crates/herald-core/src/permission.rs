use crate::identity::Identity;
use crate::reservation::Reservation;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Access level an identity holds on a topic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Permission {
    DenyAll,
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl Permission {
    pub fn can_read(self) -> bool {
        matches!(self, Self::ReadOnly | Self::ReadWrite)
    }

    pub fn can_write(self) -> bool {
        matches!(self, Self::WriteOnly | Self::ReadWrite)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::DenyAll => "deny-all",
            Self::ReadOnly => "read-only",
            Self::WriteOnly => "write-only",
            Self::ReadWrite => "read-write",
        }
    }
}

impl Default for Permission {
    fn default() -> Self {
        Self::ReadWrite
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "deny-all" | "deny" | "none" => Ok(Self::DenyAll),
            "read-only" | "read" | "ro" => Ok(Self::ReadOnly),
            "write-only" | "write" | "wo" => Ok(Self::WriteOnly),
            "read-write" | "rw" | "all" => Ok(Self::ReadWrite),
            other => Err(Error::validation(format!("invalid permission: {other}"))),
        }
    }
}

/// Compute the permission an identity holds on a topic.
///
/// Admins and the reservation owner always get read-write. Everyone else
/// gets the reservation's everyone-permission, or `default` when the topic
/// is unreserved.
pub fn resolve_permission(
    identity: &Identity,
    reservation: Option<&Reservation>,
    default: Permission,
) -> Permission {
    if identity.is_admin() {
        return Permission::ReadWrite;
    }
    match reservation {
        Some(reservation) if identity.username() == Some(reservation.owner.as_str()) => {
            Permission::ReadWrite
        }
        Some(reservation) => reservation.everyone,
        None => default,
    }
}
