use crate::duration::humantime_serde;
use derive_setters::Setters;
use herald_core::{Permission, Role, Tier};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Access control configuration and account seed data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Setters)]
#[setters(strip_option, into)]
#[serde(default)]
pub struct AuthConfig {
    /// Permission on topics that have no reservation
    pub default_access: Permission,
    /// Tiers created at startup
    pub tiers: Vec<TierSeed>,
    /// Accounts created at startup
    pub users: Vec<UserSeed>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            default_access: Permission::ReadWrite,
            tiers: Vec::new(),
            users: Vec::new(),
        }
    }
}

/// Tier definition in the configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Setters)]
#[setters(strip_option, into)]
#[serde(default)]
pub struct TierSeed {
    /// Explicit tier id; generated when absent
    pub id: Option<String>,
    pub code: String,
    pub name: String,
    pub messages_limit: u64,
    #[serde(with = "humantime_serde")]
    pub messages_expiry_duration: Duration,
    pub emails_limit: u64,
    pub reservations_limit: u64,
    pub attachment_file_size_limit: u64,
    pub attachment_total_size_limit: u64,
    #[serde(with = "humantime_serde")]
    pub attachment_expiry_duration: Duration,
    pub attachment_bandwidth_limit: u64,
}

impl Default for TierSeed {
    fn default() -> Self {
        Self {
            id: None,
            code: String::new(),
            name: String::new(),
            messages_limit: 1000,
            messages_expiry_duration: Duration::from_secs(12 * 3600),
            emails_limit: 0,
            reservations_limit: 0,
            attachment_file_size_limit: 0,
            attachment_total_size_limit: 0,
            attachment_expiry_duration: Duration::from_secs(3 * 3600),
            attachment_bandwidth_limit: 0,
        }
    }
}

impl From<&TierSeed> for Tier {
    fn from(seed: &TierSeed) -> Self {
        let name = if seed.name.is_empty() {
            seed.code.clone()
        } else {
            seed.name.clone()
        };
        Tier {
            id: seed.id.clone().unwrap_or_default(),
            code: seed.code.clone(),
            name,
            messages_limit: seed.messages_limit,
            messages_expiry_duration: seed.messages_expiry_duration,
            emails_limit: seed.emails_limit,
            reservations_limit: seed.reservations_limit,
            attachment_file_size_limit: seed.attachment_file_size_limit,
            attachment_total_size_limit: seed.attachment_total_size_limit,
            attachment_expiry_duration: seed.attachment_expiry_duration,
            attachment_bandwidth_limit: seed.attachment_bandwidth_limit,
        }
    }
}

/// Account definition in the configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Setters)]
#[setters(strip_option, into)]
pub struct UserSeed {
    pub username: String,
    #[serde(default = "default_role")]
    pub role: Role,
    /// Code of one of the configured tiers
    #[serde(default)]
    pub tier: Option<String>,
    /// Bearer tokens accepted for this account
    #[serde(default)]
    pub tokens: Vec<String>,
}

fn default_role() -> Role {
    Role::User
}

impl UserSeed {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            role: Role::User,
            tier: None,
            tokens: Vec::new(),
        }
    }
}

impl AuthConfig {
    /// Validate tier and account seeds
    pub fn validate(&self) -> crate::Result<()> {
        let mut codes = HashSet::new();
        for tier in &self.tiers {
            if tier.code.is_empty() {
                return Err(crate::ConfigError::validation("Tier code cannot be empty"));
            }
            if !codes.insert(tier.code.as_str()) {
                return Err(crate::ConfigError::validation(format!(
                    "Duplicate tier code: {}",
                    tier.code
                )));
            }
        }

        let mut usernames = HashSet::new();
        for user in &self.users {
            if user.username.is_empty() {
                return Err(crate::ConfigError::validation("Username cannot be empty"));
            }
            if !usernames.insert(user.username.as_str()) {
                return Err(crate::ConfigError::validation(format!(
                    "Duplicate username: {}",
                    user.username
                )));
            }
            if user.role == Role::Anonymous {
                return Err(crate::ConfigError::validation(format!(
                    "User {} cannot have the anonymous role",
                    user.username
                )));
            }
            if let Some(code) = &user.tier {
                if !codes.contains(code.as_str()) {
                    return Err(crate::ConfigError::validation(format!(
                        "User {} references unknown tier: {}",
                        user.username, code
                    )));
                }
            }
        }

        Ok(())
    }
}
