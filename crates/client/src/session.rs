//! Customer session: credentials, profile and address book.

use reqwest::Method;
use serde::de::IgnoredAny;

use stes_core::AddressId;
use stes_core::customer::{
    Address, AddressInput, AuthPayload, ChangePasswordRequest, Customer, LoginRequest,
    RegisterRequest, UpdateProfileRequest,
};

use crate::error::{ClientError, Result};
use crate::http::ApiClient;

/// Holds the customer's token and the calls that act on their account.
#[derive(Debug, Clone)]
pub struct CustomerSession {
    api: ApiClient,
}

impl CustomerSession {
    #[must_use]
    pub const fn new(api: ApiClient) -> Self {
        Self { api }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.api.is_authenticated()
    }

    /// The signed-in customer, if known.
    #[must_use]
    pub fn customer(&self) -> Option<Customer> {
        self.api.customer()
    }

    // -------------------------------------------------------------------------
    // Credentials
    // -------------------------------------------------------------------------

    /// Create an account and sign in as it.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server rejects it. No
    /// token is stored on failure.
    pub async fn register(&self, request: &RegisterRequest) -> Result<Customer> {
        let payload: AuthPayload = self
            .api
            .send(
                self.api
                    .request(Method::POST, "api/customers/register")?
                    .json(request),
            )
            .await?;

        tracing::info!(customer_id = %payload.customer.id, "Registered");
        self.adopt(payload)
    }

    /// # Errors
    ///
    /// Returns an error if the credentials are rejected. No token is stored
    /// on failure.
    pub async fn login(&self, email: &str, password: &str) -> Result<Customer> {
        let request = LoginRequest {
            email: email.to_owned(),
            password: password.to_owned(),
        };
        let payload: AuthPayload = self
            .api
            .send(
                self.api
                    .request(Method::POST, "api/customers/login")?
                    .json(&request),
            )
            .await?;

        tracing::info!(customer_id = %payload.customer.id, "Logged in");
        self.adopt(payload)
    }

    fn adopt(&self, payload: AuthPayload) -> Result<Customer> {
        self.api
            .start_session(&payload.token, payload.customer.clone())?;
        Ok(payload.customer)
    }

    /// Forget the token. Logging out twice is the same as logging out once.
    pub fn logout(&self) {
        if self.api.end_session() {
            tracing::info!("Logged out");
        }
    }

    /// Re-validate a persisted token. Call once at startup.
    ///
    /// Returns `Ok(false)` when there is no token or the server rejected it
    /// (which logs out).
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure; the token is kept so a later
    /// check can succeed.
    pub async fn check_auth_status(&self) -> Result<bool> {
        if !self.api.is_authenticated() {
            return Ok(false);
        }

        match self.me().await {
            Ok(_) => Ok(true),
            Err(ClientError::NotAuthenticated) => Ok(false),
            Err(e) if e.is_unauthorized() => Ok(false),
            Err(e) => {
                tracing::warn!(error = %e, "Could not verify session; keeping token");
                Err(e)
            }
        }
    }

    // -------------------------------------------------------------------------
    // Profile
    // -------------------------------------------------------------------------

    /// Fetch the current customer and cache it.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotAuthenticated`] without a session.
    pub async fn me(&self) -> Result<Customer> {
        let customer: Customer = self
            .api
            .send_authed(self.api.authed(Method::GET, "api/customers/me")?)
            .await?;
        self.api.set_customer(customer.clone());
        Ok(customer)
    }

    /// # Errors
    ///
    /// Returns an error if the request fails or a field is invalid.
    pub async fn update_profile(&self, request: &UpdateProfileRequest) -> Result<Customer> {
        let customer: Customer = self
            .api
            .send_authed(
                self.api
                    .authed(Method::PUT, "api/customers/profile")?
                    .json(request),
            )
            .await?;
        self.api.set_customer(customer.clone());
        Ok(customer)
    }

    /// A wrong current password is a field error, not a logout.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or a field is invalid.
    pub async fn change_password(&self, current_password: &str, new_password: &str) -> Result<()> {
        let request = ChangePasswordRequest {
            current_password: current_password.to_owned(),
            new_password: new_password.to_owned(),
        };
        let _: IgnoredAny = self
            .api
            .send_authed(
                self.api
                    .authed(Method::PUT, "api/customers/password")?
                    .json(&request),
            )
            .await?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Addresses
    // -------------------------------------------------------------------------

    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn addresses(&self) -> Result<Vec<Address>> {
        self.api
            .send_authed(self.api.authed(Method::GET, "api/customers/addresses")?)
            .await
    }

    /// # Errors
    ///
    /// Returns an error if the request fails or a field is invalid.
    pub async fn add_address(&self, input: &AddressInput) -> Result<Address> {
        self.api
            .send_authed(
                self.api
                    .authed(Method::POST, "api/customers/addresses")?
                    .json(input),
            )
            .await
    }

    /// # Errors
    ///
    /// Returns an error if the request fails or the address is not found.
    pub async fn update_address(&self, id: AddressId, input: &AddressInput) -> Result<Address> {
        self.api
            .send_authed(
                self.api
                    .authed(Method::PUT, &format!("api/customers/addresses/{id}"))?
                    .json(input),
            )
            .await
    }

    /// # Errors
    ///
    /// Returns an error if the request fails or the address is not found.
    pub async fn delete_address(&self, id: AddressId) -> Result<()> {
        let _: IgnoredAny = self
            .api
            .send_authed(
                self.api
                    .authed(Method::DELETE, &format!("api/customers/addresses/{id}"))?,
            )
            .await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if the request fails or the address is not found.
    pub async fn set_default_address(&self, id: AddressId) -> Result<Address> {
        self.api
            .send_authed(self.api.authed(
                Method::PUT,
                &format!("api/customers/addresses/{id}/default"),
            )?)
            .await
    }
}
