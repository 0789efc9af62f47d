//! Customer, address and authentication payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::{FieldError, Validator};
use crate::{AddressId, CustomerId, Email};

/// Minimum password length, in characters.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum password length in characters (bounds hashing cost).
pub const MAX_PASSWORD_LENGTH: usize = 128;

/// A customer as returned by the API. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub email: Email,
    #[serde(default)]
    pub phone: Option<String>,
    pub loyalty_points: i32,
    pub created_at: DateTime<Utc>,
}

/// Result of a successful register or login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthPayload {
    pub customer: Customer,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Check a phone number: 8 to 15 digits, optional leading `+`, spaces allowed.
#[must_use]
pub fn is_valid_phone(phone: &str) -> bool {
    let compact: String = phone.chars().filter(|c| !c.is_whitespace()).collect();
    let digits = compact.strip_prefix('+').unwrap_or(&compact);
    (8..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit())
}

impl RegisterRequest {
    /// Field-level validation of a registration form.
    ///
    /// # Errors
    ///
    /// Returns every failing field.
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        Validator::new()
            .required(&self.name, "name", 100)
            .check(
                Email::normalized(&self.email).is_ok(),
                "email",
                "a valid email address is required",
            )
            .check(
                (MIN_PASSWORD_LENGTH..=MAX_PASSWORD_LENGTH).contains(&self.password.chars().count()),
                "password",
                "password must be between 8 and 128 characters",
            )
            .check(
                self.phone.as_deref().is_none_or(is_valid_phone),
                "phone",
                "phone number must contain 8 to 15 digits",
            )
            .finish()
    }
}

impl UpdateProfileRequest {
    /// # Errors
    ///
    /// Returns every failing field.
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut v = Validator::new();
        if let Some(name) = &self.name {
            v.required(name, "name", 100);
        }
        v.check(
            self.phone.as_deref().is_none_or(is_valid_phone),
            "phone",
            "phone number must contain 8 to 15 digits",
        )
        .finish()
    }
}

impl ChangePasswordRequest {
    /// # Errors
    ///
    /// Returns every failing field.
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        Validator::new()
            .check(
                !self.current_password.is_empty(),
                "currentPassword",
                "current password is required",
            )
            .check(
                (MIN_PASSWORD_LENGTH..=MAX_PASSWORD_LENGTH).contains(&self.new_password.chars().count()),
                "newPassword",
                "password must be between 8 and 128 characters",
            )
            .check(
                self.current_password != self.new_password,
                "newPassword",
                "new password must differ from the current one",
            )
            .finish()
    }
}

/// A saved shipping address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub id: AddressId,
    pub label: String,
    pub street: String,
    pub city: String,
    pub governorate: String,
    pub postal_code: String,
    pub country: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub is_default: bool,
}

/// Body for creating or replacing an address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressInput {
    pub label: String,
    pub street: String,
    pub city: String,
    pub governorate: String,
    pub postal_code: String,
    #[serde(default = "default_country")]
    pub country: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

fn default_country() -> String {
    "Tunisia".to_owned()
}

impl AddressInput {
    /// # Errors
    ///
    /// Returns every failing field.
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        Validator::new()
            .required(&self.label, "label", 50)
            .required(&self.street, "street", 200)
            .required(&self.city, "city", 80)
            .required(&self.governorate, "governorate", 80)
            .required(&self.country, "country", 80)
            .check(
                self.postal_code.len() == 4 && self.postal_code.chars().all(|c| c.is_ascii_digit()),
                "postalCode",
                "postal code must be 4 digits",
            )
            .check(
                self.phone.as_deref().is_none_or(is_valid_phone),
                "phone",
                "phone number must contain 8 to 15 digits",
            )
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn address() -> AddressInput {
        AddressInput {
            label: "Maison".to_owned(),
            street: "12 rue de la Piscine".to_owned(),
            city: "La Marsa".to_owned(),
            governorate: "Tunis".to_owned(),
            postal_code: "2070".to_owned(),
            country: default_country(),
            phone: Some("+216 22 123 456".to_owned()),
            is_default: false,
        }
    }

    #[test]
    fn test_phone_validation() {
        assert!(is_valid_phone("+216 22 123 456"));
        assert!(is_valid_phone("22123456"));
        assert!(!is_valid_phone("1234"));
        assert!(!is_valid_phone("22-123-456"));
    }

    #[test]
    fn test_register_validation_reports_fields() {
        let req = RegisterRequest {
            name: String::new(),
            email: "not-an-email".to_owned(),
            password: "short".to_owned(),
            phone: None,
        };
        let fields: Vec<String> = req
            .validate()
            .unwrap_err()
            .into_iter()
            .map(|e| e.field)
            .collect();
        assert_eq!(fields, ["name", "email", "password"]);
    }

    #[test]
    fn test_register_validation_ok() {
        let req = RegisterRequest {
            name: "Amira".to_owned(),
            email: "Amira@STES.tn".to_owned(),
            password: "piscine-2024".to_owned(),
            phone: None,
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_password_length_counts_characters() {
        // Eight bytes, four characters
        let req = ChangePasswordRequest {
            current_password: "old-password".to_owned(),
            new_password: "éééé".to_owned(),
        };
        assert_eq!(req.validate().unwrap_err()[0].field, "newPassword");

        let req = ChangePasswordRequest {
            new_password: "piscineé".to_owned(),
            ..req
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_change_password_must_differ() {
        let req = ChangePasswordRequest {
            current_password: "same-password".to_owned(),
            new_password: "same-password".to_owned(),
        };
        let errors = req.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "newPassword");
    }

    #[test]
    fn test_address_validation() {
        assert!(address().validate().is_ok());

        let bad = AddressInput {
            postal_code: "20700".to_owned(),
            city: " ".to_owned(),
            ..address()
        };
        let fields: Vec<String> = bad
            .validate()
            .unwrap_err()
            .into_iter()
            .map(|e| e.field)
            .collect();
        assert_eq!(fields, ["city", "postalCode"]);
    }

    #[test]
    fn test_address_country_defaults_to_tunisia() {
        let input: AddressInput = serde_json::from_value(serde_json::json!({
            "label": "Bureau",
            "street": "Avenue Habib Bourguiba",
            "city": "Sousse",
            "governorate": "Sousse",
            "postalCode": "4000"
        }))
        .unwrap();
        assert_eq!(input.country, "Tunisia");
        assert!(!input.is_default);
    }
}
