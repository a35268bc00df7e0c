use crate::tier::Tier;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

/// Username reported for anonymous visitors
pub const ANONYMOUS_USERNAME: &str = "*";

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Anonymous,
    User,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Anonymous => "anonymous",
            Self::User => "user",
            Self::Admin => "admin",
        };
        f.write_str(s)
    }
}

/// Authenticated account as seen by a single request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub role: Role,
    pub tier: Option<Tier>,
}

impl User {
    /// Create a new user without a tier
    pub fn new(username: impl Into<String>, role: Role) -> Self {
        Self {
            username: username.into(),
            role,
            tier: None,
        }
    }

    /// Attach a tier to the user
    pub fn with_tier(mut self, tier: Tier) -> Self {
        self.tier = Some(tier);
        self
    }
}

/// Who is making a request
#[derive(Debug, Clone, PartialEq)]
pub enum Identity {
    Anonymous { ip: IpAddr },
    User(User),
}

impl Identity {
    pub fn anonymous(ip: IpAddr) -> Self {
        Self::Anonymous { ip }
    }

    pub fn user(user: User) -> Self {
        Self::User(user)
    }

    /// Account name, `None` for anonymous visitors
    pub fn username(&self) -> Option<&str> {
        match self {
            Self::Anonymous { .. } => None,
            Self::User(user) => Some(&user.username),
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Self::Anonymous { .. } => Role::Anonymous,
            Self::User(user) => user.role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role() == Role::Admin
    }

    pub fn tier(&self) -> Option<&Tier> {
        match self {
            Self::Anonymous { .. } => None,
            Self::User(user) => user.tier.as_ref(),
        }
    }

    /// Key of the visitor record charged for this identity's requests
    pub fn visitor_key(&self) -> VisitorKey {
        match self {
            Self::Anonymous { ip } => VisitorKey::Ip(*ip),
            Self::User(user) => VisitorKey::User(user.username.clone()),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous { ip } => write!(f, "{ANONYMOUS_USERNAME}@{ip}"),
            Self::User(user) => f.write_str(&user.username),
        }
    }
}

/// Rate-limit accounting key: authenticated accounts are keyed by name,
/// anonymous visitors by IP address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VisitorKey {
    Ip(IpAddr),
    User(String),
}

impl fmt::Display for VisitorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ip(ip) => write!(f, "ip:{ip}"),
            Self::User(username) => write!(f, "user:{username}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::net::Ipv4Addr;

    #[test]
    fn test_anonymous_identity() {
        let fixture = Identity::anonymous(IpAddr::V4(Ipv4Addr::new(1, 2, 3, 4)));
        assert_eq!(fixture.username(), None);
        assert_eq!(fixture.role(), Role::Anonymous);
        assert_eq!(fixture.visitor_key().to_string(), "ip:1.2.3.4");
    }

    #[test]
    fn test_user_identity_keyed_by_username() {
        let fixture = Identity::user(User::new("phil", Role::User));
        let actual = fixture.visitor_key();
        let expected = VisitorKey::User("phil".to_string());
        assert_eq!(actual, expected);
        assert!(!fixture.is_admin());
    }

    #[test]
    fn test_identity_carries_tier() {
        let fixture = Identity::user(User::new("phil", Role::User).with_tier(Tier::new("pro")));
        let actual = fixture.tier().map(|tier| tier.code.as_str());
        let expected = Some("pro");
        assert_eq!(actual, expected);
    }
}
