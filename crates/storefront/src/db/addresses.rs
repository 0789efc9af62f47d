//! Address book repository.
//!
//! A customer has at most one default address (partial unique index
//! `address_one_default`). Every write that can move the default runs in a
//! transaction that clears the old default first.

use sqlx::{PgConnection, PgPool};

use stes_core::customer::{Address, AddressInput};
use stes_core::{AddressId, CustomerId};

use super::RepositoryError;

const ADDRESS_COLUMNS: &str =
    "id, label, street, city, governorate, postal_code, country, phone, is_default";

#[derive(Debug, sqlx::FromRow)]
struct AddressRow {
    id: AddressId,
    label: String,
    street: String,
    city: String,
    governorate: String,
    postal_code: String,
    country: String,
    phone: Option<String>,
    is_default: bool,
}

impl From<AddressRow> for Address {
    fn from(row: AddressRow) -> Self {
        Self {
            id: row.id,
            label: row.label,
            street: row.street,
            city: row.city,
            governorate: row.governorate,
            postal_code: row.postal_code,
            country: row.country,
            phone: row.phone,
            is_default: row.is_default,
        }
    }
}

/// Repository for customer addresses.
pub struct AddressRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AddressRepository<'a> {
    /// Create a new address repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All addresses of a customer, default first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, customer_id: CustomerId) -> Result<Vec<Address>, RepositoryError> {
        let rows: Vec<AddressRow> = sqlx::query_as(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM stes.address
             WHERE customer_id = $1
             ORDER BY is_default DESC, id"
        ))
        .bind(customer_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Address::from).collect())
    }

    /// Get one address owned by `customer_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &self,
        customer_id: CustomerId,
        id: AddressId,
    ) -> Result<Option<Address>, RepositoryError> {
        let row: Option<AddressRow> = sqlx::query_as(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM stes.address WHERE id = $1 AND customer_id = $2"
        ))
        .bind(id)
        .bind(customer_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Address::from))
    }

    /// Add an address. The first address of a customer is always the default.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn create(
        &self,
        customer_id: CustomerId,
        input: &AddressInput,
    ) -> Result<Address, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let existing: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM stes.address WHERE customer_id = $1")
                .bind(customer_id)
                .fetch_one(&mut *tx)
                .await?;
        let is_default = input.is_default || existing == 0;
        if is_default {
            clear_default(&mut tx, customer_id).await?;
        }

        let row: AddressRow = sqlx::query_as(&format!(
            "INSERT INTO stes.address (
                 customer_id, label, street, city, governorate, postal_code, country, phone, is_default
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {ADDRESS_COLUMNS}"
        ))
        .bind(customer_id)
        .bind(input.label.trim())
        .bind(input.street.trim())
        .bind(input.city.trim())
        .bind(input.governorate.trim())
        .bind(input.postal_code.trim())
        .bind(input.country.trim())
        .bind(input.phone.as_deref().map(str::trim))
        .bind(is_default)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row.into())
    }

    /// Replace an address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address does not belong to the customer.
    pub async fn update(
        &self,
        customer_id: CustomerId,
        id: AddressId,
        input: &AddressInput,
    ) -> Result<Address, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        if input.is_default {
            clear_default(&mut tx, customer_id).await?;
        }

        let row: Option<AddressRow> = sqlx::query_as(&format!(
            "UPDATE stes.address
             SET label = $3, street = $4, city = $5, governorate = $6,
                 postal_code = $7, country = $8, phone = $9,
                 is_default = $10
             WHERE id = $1 AND customer_id = $2
             RETURNING {ADDRESS_COLUMNS}"
        ))
        .bind(id)
        .bind(customer_id)
        .bind(input.label.trim())
        .bind(input.street.trim())
        .bind(input.city.trim())
        .bind(input.governorate.trim())
        .bind(input.postal_code.trim())
        .bind(input.country.trim())
        .bind(input.phone.as_deref().map(str::trim))
        .bind(input.is_default)
        .fetch_optional(&mut *tx)
        .await?;

        let row = row.ok_or(RepositoryError::NotFound)?;
        tx.commit().await?;
        Ok(row.into())
    }

    /// Delete an address. If it was the default, the most recent remaining
    /// address becomes the default.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address does not belong to the customer.
    pub async fn delete(&self, customer_id: CustomerId, id: AddressId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let was_default: Option<bool> = sqlx::query_scalar(
            "DELETE FROM stes.address WHERE id = $1 AND customer_id = $2 RETURNING is_default",
        )
        .bind(id)
        .bind(customer_id)
        .fetch_optional(&mut *tx)
        .await?;

        match was_default {
            None => return Err(RepositoryError::NotFound),
            Some(true) => {
                sqlx::query(
                    r"
                    UPDATE stes.address SET is_default = TRUE
                    WHERE id = (
                        SELECT id FROM stes.address
                        WHERE customer_id = $1
                        ORDER BY created_at DESC, id DESC
                        LIMIT 1
                    )
                    ",
                )
                .bind(customer_id)
                .execute(&mut *tx)
                .await?;
            }
            Some(false) => {}
        }

        tx.commit().await?;
        Ok(())
    }

    /// Make an address the customer's default.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address does not belong to the customer.
    pub async fn set_default(
        &self,
        customer_id: CustomerId,
        id: AddressId,
    ) -> Result<Address, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        clear_default(&mut tx, customer_id).await?;
        let row: Option<AddressRow> = sqlx::query_as(&format!(
            "UPDATE stes.address SET is_default = TRUE
             WHERE id = $1 AND customer_id = $2
             RETURNING {ADDRESS_COLUMNS}"
        ))
        .bind(id)
        .bind(customer_id)
        .fetch_optional(&mut *tx)
        .await?;

        // Dropping the transaction rolls back the cleared default.
        let row = row.ok_or(RepositoryError::NotFound)?;
        tx.commit().await?;
        Ok(row.into())
    }
}

async fn clear_default(conn: &mut PgConnection, customer_id: CustomerId) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE stes.address SET is_default = FALSE WHERE customer_id = $1 AND is_default")
        .bind(customer_id)
        .execute(conn)
        .await?;
    Ok(())
}
