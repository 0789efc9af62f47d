//! Authentication service.
//!
//! Provides password registration and login, bearer token issuance and
//! password changes.

mod error;
mod token;

pub use error::AuthError;
pub use token::{Claims, TokenKeys};

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sqlx::PgPool;

use stes_core::customer::{
    AuthPayload, ChangePasswordRequest, Customer, LoginRequest, MAX_PASSWORD_LENGTH,
    MIN_PASSWORD_LENGTH, RegisterRequest, UpdateProfileRequest,
};
use stes_core::{CustomerId, Email};

use crate::db::{CustomerRepository, RepositoryError};

/// Authentication service.
///
/// Handles customer registration, login, and credential management.
pub struct AuthService<'a> {
    customers: CustomerRepository<'a>,
    keys: &'a TokenKeys,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool, keys: &'a TokenKeys) -> Self {
        Self {
            customers: CustomerRepository::new(pool),
            keys,
        }
    }

    // =========================================================================
    // Password Authentication
    // =========================================================================

    /// Register a new customer and sign them in.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::CustomerAlreadyExists` if the email is already registered.
    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthPayload, AuthError> {
        let email = Email::normalized(&request.email)?;
        validate_password(&request.password)?;

        let password_hash = hash_password(&request.password)?;
        let phone = request
            .phone
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty());

        let customer = self
            .customers
            .create(request.name.trim(), &email, phone, &password_hash)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::CustomerAlreadyExists,
                other => AuthError::Repository(other),
            })?;

        tracing::info!(customer_id = %customer.id, "Customer registered");
        self.payload(customer)
    }

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    pub async fn login(&self, request: &LoginRequest) -> Result<AuthPayload, AuthError> {
        // Malformed and unknown emails are indistinguishable to the caller
        let email = Email::normalized(&request.email).map_err(|_| AuthError::InvalidCredentials)?;

        let (customer, password_hash) = self
            .customers
            .get_password_hash_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(&request.password, &password_hash)?;

        self.payload(customer)
    }

    // =========================================================================
    // Account
    // =========================================================================

    /// Get the customer behind a verified token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::CustomerNotFound` if the account was removed.
    pub async fn current(&self, customer_id: CustomerId) -> Result<Customer, AuthError> {
        self.customers
            .get_by_id(customer_id)
            .await?
            .ok_or(AuthError::CustomerNotFound)
    }

    /// Update name and phone.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::CustomerNotFound` if the account was removed.
    pub async fn update_profile(
        &self,
        customer_id: CustomerId,
        request: &UpdateProfileRequest,
    ) -> Result<Customer, AuthError> {
        self.customers
            .update_profile(
                customer_id,
                request.name.as_deref().map(str::trim),
                request.phone.as_deref(),
            )
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => AuthError::CustomerNotFound,
                other => AuthError::Repository(other),
            })
    }

    /// Change the password after re-checking the current one.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the current password is wrong.
    /// Returns `AuthError::WeakPassword` if the new password doesn't meet requirements.
    pub async fn change_password(
        &self,
        customer_id: CustomerId,
        request: &ChangePasswordRequest,
    ) -> Result<(), AuthError> {
        let current_hash = self
            .customers
            .get_password_hash(customer_id)
            .await?
            .ok_or(AuthError::CustomerNotFound)?;

        verify_password(&request.current_password, &current_hash)?;
        validate_password(&request.new_password)?;

        let new_hash = hash_password(&request.new_password)?;
        self.customers
            .update_password_hash(customer_id, &new_hash)
            .await?;

        tracing::info!(customer_id = %customer_id, "Password changed");
        Ok(())
    }

    fn payload(&self, customer: Customer) -> Result<AuthPayload, AuthError> {
        let token = self.keys.issue(&customer)?;
        Ok(AuthPayload { customer, token })
    }
}

// =============================================================================
// Password Utilities
// =============================================================================

/// Validate password strength.
fn validate_password(password: &str) -> Result<(), AuthError> {
    let length = password.chars().count();
    if length < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    if length > MAX_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at most {MAX_PASSWORD_LENGTH} characters"
        )));
    }

    Ok(())
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}
