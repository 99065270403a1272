use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::Gender;
use crate::error::ParseEnumError;

/// Sales funnel stage of a CRM record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomerStatus {
    Contact,
    Potential,
    Customer,
}

impl CustomerStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CustomerStatus::Contact => "contact",
            CustomerStatus::Potential => "potential",
            CustomerStatus::Customer => "customer",
        }
    }
}

impl FromStr for CustomerStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "contact" => Ok(CustomerStatus::Contact),
            "potential" => Ok(CustomerStatus::Potential),
            "customer" => Ok(CustomerStatus::Customer),
            _ => Err(ParseEnumError {
                kind: "customer status",
                value: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for CustomerStatus {
    type Error = ParseEnumError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for CustomerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to the person behind a CRM record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomerEvent {
    /// A customer account was registered.
    SignedUp,
    /// An order was placed or cancelled.
    OrderActivity,
    /// An order was completed.
    OrderSucceeded,
}

impl CustomerEvent {
    /// Status the record should have after the event; `None` for a record
    /// that does not exist yet.
    pub fn next_status(self, current: Option<CustomerStatus>) -> CustomerStatus {
        match (self, current) {
            (CustomerEvent::OrderSucceeded, _) => CustomerStatus::Customer,
            (_, None) => CustomerStatus::Contact,
            (CustomerEvent::OrderActivity, Some(CustomerStatus::Contact)) => {
                CustomerStatus::Potential
            }
            (_, Some(status)) => status,
        }
    }
}

/// Identity copied into a CRM record when it is first created.
#[derive(Debug, Clone)]
pub struct ContactInfo {
    pub email: String,
    pub full_name: String,
    pub gender: Gender,
    pub phone: String,
    pub address: String,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Customer {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    #[sqlx(try_from = "String")]
    pub gender: Gender,
    pub phone: String,
    pub address: String,
    #[sqlx(try_from = "String")]
    pub status: CustomerStatus,
    /// `None` when the last change was made by the order pipeline.
    pub updated_by: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;
    use CustomerStatus::*;

    #[test]
    fn sign_up_creates_contact_and_never_demotes() {
        let ev = CustomerEvent::SignedUp;
        assert_eq!(ev.next_status(None), Contact);
        assert_eq!(ev.next_status(Some(Contact)), Contact);
        assert_eq!(ev.next_status(Some(Potential)), Potential);
        assert_eq!(ev.next_status(Some(Customer)), Customer);
    }

    #[test]
    fn order_activity_promotes_contact_only() {
        let ev = CustomerEvent::OrderActivity;
        assert_eq!(ev.next_status(None), Contact);
        assert_eq!(ev.next_status(Some(Contact)), Potential);
        assert_eq!(ev.next_status(Some(Potential)), Potential);
        assert_eq!(ev.next_status(Some(Customer)), Customer);
    }

    #[test]
    fn success_always_lands_on_customer() {
        let ev = CustomerEvent::OrderSucceeded;
        assert_eq!(ev.next_status(None), Customer);
        assert_eq!(ev.next_status(Some(Contact)), Customer);
        assert_eq!(ev.next_status(Some(Potential)), Customer);
    }

    #[test]
    fn status_parse_is_case_insensitive() {
        assert_eq!("Potential".parse::<CustomerStatus>().unwrap(), Potential);
        assert!("lead".parse::<CustomerStatus>().is_err());
    }
}
