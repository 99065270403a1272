use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::ParseEnumError;

/// Account role, stored as text and carried in the access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    Customer,
    Saler,
    SaleManager,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Saler => "saler",
            Role::SaleManager => "saleManager",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Role::Customer),
            "saler" => Ok(Role::Saler),
            "saleManager" => Ok(Role::SaleManager),
            "admin" => Ok(Role::Admin),
            other => Err(ParseEnumError {
                kind: "role",
                value: other.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = ParseEnumError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    M,
    F,
    D,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Gender::M => "M",
            Gender::F => "F",
            Gender::D => "D",
        }
    }
}

impl FromStr for Gender {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "M" => Ok(Gender::M),
            "F" => Ok(Gender::F),
            "D" => Ok(Gender::D),
            other => Err(ParseEnumError {
                kind: "gender",
                value: other.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for Gender {
    type Error = ParseEnumError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// User record in the database.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 hash, not exposed in JSON
    pub full_name: String,
    #[sqlx(try_from = "String")]
    pub gender: Gender,
    pub phone: String,
    pub address: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub active: bool,
    #[serde(skip_serializing)]
    pub avatar_key: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Fields needed to insert a user; the password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub gender: Gender,
    pub phone: String,
    pub address: String,
    pub role: Role,
}

#[cfg(test)]
impl NewUser {
    pub fn sample(email: &str, role: Role) -> Self {
        NewUser {
            email: email.to_string(),
            password_hash: "not-a-real-hash".into(),
            full_name: email.split('@').next().unwrap_or(email).to_string(),
            gender: Gender::D,
            phone: "0387897777".into(),
            address: "Ho Chi Minh City".into(),
            role,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_names_match_storage_and_json() {
        for role in [Role::Customer, Role::Saler, Role::SaleManager, Role::Admin] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
            let json = serde_json::to_string(&role).unwrap();
            assert_eq!(json, format!("\"{}\"", role.as_str()));
        }
        assert!("manager".parse::<Role>().is_err());
    }

    #[test]
    fn gender_parse() {
        assert_eq!(" F ".parse::<Gender>().unwrap(), Gender::F);
        assert!("X".parse::<Gender>().is_err());
    }
}
