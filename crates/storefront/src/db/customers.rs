//! Customer repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use stes_core::customer::Customer;
use stes_core::{CustomerId, Email};

use super::RepositoryError;

const CUSTOMER_COLUMNS: &str = "id, name, email, phone, loyalty_points, created_at";

#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    id: CustomerId,
    name: String,
    email: String,
    phone: Option<String>,
    loyalty_points: i32,
    created_at: DateTime<Utc>,
}

impl TryFrom<CustomerRow> for Customer {
    type Error = RepositoryError;

    fn try_from(row: CustomerRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: row.id,
            name: row.name,
            email,
            phone: row.phone,
            loyalty_points: row.loyalty_points,
            created_at: row.created_at,
        })
    }
}

/// Repository for customer database operations.
pub struct CustomerRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CustomerRepository<'a> {
    /// Create a new customer repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a customer by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored email is invalid.
    pub async fn get_by_id(&self, id: CustomerId) -> Result<Option<Customer>, RepositoryError> {
        let row: Option<CustomerRow> = sqlx::query_as(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM stes.customer WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(Customer::try_from).transpose()
    }

    /// Create a customer with a password hash.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(
        &self,
        name: &str,
        email: &Email,
        phone: Option<&str>,
        password_hash: &str,
    ) -> Result<Customer, RepositoryError> {
        let row: CustomerRow = sqlx::query_as(&format!(
            "INSERT INTO stes.customer (name, email, phone, password_hash)
             VALUES ($1, $2, $3, $4)
             RETURNING {CUSTOMER_COLUMNS}"
        ))
        .bind(name)
        .bind(email)
        .bind(phone)
        .bind(password_hash)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique_violation(e, "email already exists"))?;

        row.try_into()
    }

    /// Get a customer and their password hash by email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_password_hash_by_email(
        &self,
        email: &Email,
    ) -> Result<Option<(Customer, String)>, RepositoryError> {
        let row: Option<HashedRow> = sqlx::query_as(&format!(
            "SELECT {CUSTOMER_COLUMNS}, password_hash FROM stes.customer WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(self.pool)
        .await?;

        match row {
            Some(r) => Ok(Some((Customer::try_from(r.customer)?, r.password_hash))),
            None => Ok(None),
        }
    }

    /// Get the password hash of a customer.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_password_hash(&self, id: CustomerId) -> Result<Option<String>, RepositoryError> {
        let hash = sqlx::query_scalar("SELECT password_hash FROM stes.customer WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(hash)
    }

    /// Update name and/or phone. `None` leaves a field unchanged; an empty
    /// phone clears it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the customer does not exist.
    pub async fn update_profile(
        &self,
        id: CustomerId,
        name: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Customer, RepositoryError> {
        let row: Option<CustomerRow> = sqlx::query_as(&format!(
            "UPDATE stes.customer
             SET name = COALESCE($2, name),
                 phone = CASE WHEN $3::text IS NULL THEN phone ELSE NULLIF(btrim($3), '') END,
                 updated_at = NOW()
             WHERE id = $1
             RETURNING {CUSTOMER_COLUMNS}"
        ))
        .bind(id)
        .bind(name)
        .bind(phone)
        .fetch_optional(self.pool)
        .await?;

        row.ok_or(RepositoryError::NotFound)?.try_into()
    }

    /// Replace a customer's password hash.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the customer does not exist.
    pub async fn update_password_hash(
        &self,
        id: CustomerId,
        password_hash: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE stes.customer SET password_hash = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct HashedRow {
    #[sqlx(flatten)]
    customer: CustomerRow,
    password_hash: String,
}
