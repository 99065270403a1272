use serde::Deserialize;
use uuid::Uuid;

use crate::auth::repo_types::User;
use crate::orders::dto::ContactRequest;

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub quantity: i32,
}

/// Receiver of a cart checkout. Missing fields are taken from the buyer's
/// profile.
#[derive(Debug, Default, Deserialize)]
pub struct CheckoutRequest {
    pub receiver_name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub gender: Option<String>,
    pub note: Option<String>,
}

impl CheckoutRequest {
    pub fn into_contact(self, buyer: &User) -> ContactRequest {
        ContactRequest {
            receiver_name: self.receiver_name.unwrap_or_else(|| buyer.full_name.clone()),
            address: self.address.unwrap_or_else(|| buyer.address.clone()),
            phone: self.phone.unwrap_or_else(|| buyer.phone.clone()),
            email: self.email.unwrap_or_else(|| buyer.email.clone()),
            gender: self
                .gender
                .unwrap_or_else(|| buyer.gender.as_str().to_string()),
            note: self.note,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repo_types::{Gender, Role};
    use time::OffsetDateTime;

    fn buyer() -> User {
        User {
            id: Uuid::new_v4(),
            email: "anh@example.com".into(),
            password_hash: String::new(),
            full_name: "Anh".into(),
            gender: Gender::F,
            phone: "0387897777".into(),
            address: "Can Tho".into(),
            role: Role::Customer,
            active: true,
            avatar_key: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn checkout_defaults_to_profile() {
        let contact = CheckoutRequest::default().into_contact(&buyer());
        assert_eq!(contact.receiver_name, "Anh");
        assert_eq!(contact.email, "anh@example.com");
        assert_eq!(contact.gender, "F");
        assert!(contact.validate().is_ok());
    }

    #[test]
    fn checkout_fields_override_profile() {
        let req = CheckoutRequest {
            receiver_name: Some("Binh".into()),
            address: Some("Ha Noi".into()),
            note: Some("gift".into()),
            ..CheckoutRequest::default()
        };
        let contact = req.into_contact(&buyer()).validate().unwrap();
        assert_eq!(contact.receiver_name, "Binh");
        assert_eq!(contact.address, "Ha Noi");
        assert_eq!(contact.phone, "0387897777");
        assert_eq!(contact.note.as_deref(), Some("gift"));
    }
}
