//! User account records.

use chrono::{DateTime, Utc};
use serde::Serialize;

use mercato_core::{Address, Email, Role, UserId};

/// A registered account, without its password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: Email,
    pub mobile: Option<String>,
    pub role: Role,
    pub addresses: Vec<Address>,
    pub created_at: DateTime<Utc>,
}

/// An account to create.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: Email,
    pub mobile: Option<String>,
    pub role: Role,
    pub password_hash: String,
}

/// How a login names its account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginKey<'a> {
    Email(&'a Email),
    Mobile(&'a str),
    /// Both given; they must belong to the same account.
    EmailAndMobile(&'a Email, &'a str),
}

impl LoginKey<'_> {
    /// Whether `user` is the account this key names.
    #[must_use]
    pub fn matches(&self, user: &User) -> bool {
        match *self {
            Self::Email(email) => &user.email == email,
            Self::Mobile(mobile) => user.mobile.as_deref() == Some(mobile),
            Self::EmailAndMobile(email, mobile) => {
                &user.email == email && user.mobile.as_deref() == Some(mobile)
            }
        }
    }
}

/// The public part of an account, as listed to admins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: UserId,
    pub name: String,
    pub email: Email,
    pub mobile: Option<String>,
    pub role: Role,
}

impl From<User> for UserSummary {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            mobile: user.mobile,
            role: user.role,
        }
    }
}
