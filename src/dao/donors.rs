use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use tracing::{Instrument, instrument};
use uuid::Uuid;

use crate::{
    dao::{handle_database_error, query_error},
    model::{
        apperror::{ApplicationError, ErrorType},
        models::{BloodType, DonorAddInputType, DonorDetailType, DonorListInputType},
    },
};

/**
 * Database response type for querying donors joined with their neighborhood.
 */
pub type QueryDonorListDbResp = (Uuid, String, String, String, Option<String>, Option<String>, String, DateTime<Utc>, DateTime<Utc>, Uuid, String);

/**
 * SQL query to retrieve donors in registration order, optionally restricted to one neighborhood.
 */
const QUERY_DONOR_LIST: &str = "SELECT d.id, d.first_name, d.last_name, d.national_id, d.phone, d.email, d.blood_type, d.donation_date, d.created_at, n.id, n.name
                                FROM donor d JOIN neighborhood n ON d.neighborhood_id = n.id
                                WHERE ($1::uuid IS NULL OR d.neighborhood_id = $1)
                                ORDER BY d.created_at ASC, d.id ASC";

/**
 * SQL query to add a donor and return it joined with its neighborhood.
 */
const ADD_DONOR: &str = "WITH inserted AS (
                             INSERT INTO donor (id, first_name, last_name, national_id, phone, email, blood_type, donation_date, neighborhood_id)
                             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                             RETURNING id, first_name, last_name, national_id, phone, email, blood_type, donation_date, created_at, neighborhood_id
                         )
                         SELECT i.id, i.first_name, i.last_name, i.national_id, i.phone, i.email, i.blood_type, i.donation_date, i.created_at, n.id, n.name
                         FROM inserted i JOIN neighborhood n ON i.neighborhood_id = n.id";

/**
 * SQL query to delete a donor.
 */
const DELETE_DONOR: &str = "DELETE FROM donor WHERE id = $1";

impl TryFrom<QueryDonorListDbResp> for DonorDetailType {
    type Error = ApplicationError;

    fn try_from(row: QueryDonorListDbResp) -> Result<Self, Self::Error> {
        let blood_type = BloodType::from_str(&row.6).map_err(|_| ApplicationError::new(ErrorType::DatabaseError, format!("Stored blood type {} is not recognized", row.6)))?;
        Ok(DonorDetailType {
            id: row.0,
            first_name: row.1,
            last_name: row.2,
            national_id: row.3,
            phone: row.4,
            email: row.5,
            blood_type,
            donation_date: row.7,
            created_at: row.8,
            neighborhood_id: row.9,
            neighborhood_name: row.10,
        })
    }
}

/**
 * DAO for donor-related database operations.
 */
#[derive(Default)]
pub struct DonorDao {}

impl DonorDao {
    pub fn new() -> Self {
        DonorDao {}
    }

    /**
     * Retrieves donors in registration order.
     *
     * # Arguments
     * `connection`: The database connection.
     * `filter_params`: Optional neighborhood restriction.
     *
     * # Returns
     * A Result containing the donors or an `ApplicationError`.
     */
    #[instrument(skip(self, connection))]
    pub async fn get_donor_list(&self, connection: &mut PgConnection, filter_params: DonorListInputType) -> Result<Vec<DonorDetailType>, ApplicationError> {
        let span = tracing::Span::current();
        let results: Vec<QueryDonorListDbResp> = sqlx::query_as(QUERY_DONOR_LIST)
            .bind(filter_params.neighborhood_id)
            .fetch_all(connection)
            .instrument(span)
            .await
            .map_err(|err| query_error("get donor list", &err))?;
        results.into_iter().map(DonorDetailType::try_from).collect()
    }

    /**
     * Adds a new donor to the database.
     *
     * # Arguments
     * `transaction`: The database transaction to execute the query within.
     * `donor_add_input`: The validated donor.
     * `donation_date`: The resolved donation date.
     *
     * # Returns
     * The stored donor, or a conflict error when the national id is already registered.
     */
    #[instrument(skip(self, transaction, donor_add_input), fields(donor_id = %donor_add_input.id))]
    pub async fn add_donor(&self, transaction: &mut PgConnection, donor_add_input: DonorAddInputType, donation_date: DateTime<Utc>) -> Result<DonorDetailType, ApplicationError> {
        let span = tracing::Span::current();
        let result: QueryDonorListDbResp = sqlx::query_as(ADD_DONOR)
            .bind(donor_add_input.id)
            .bind(donor_add_input.first_name)
            .bind(donor_add_input.last_name)
            .bind(donor_add_input.national_id)
            .bind(donor_add_input.phone)
            .bind(donor_add_input.email)
            .bind(donor_add_input.blood_type.as_str())
            .bind(donation_date)
            .bind(donor_add_input.neighborhood_id)
            .fetch_one(transaction)
            .instrument(span)
            .await
            .map_err(|err| handle_database_error(&err, "A donor with this national ID already exists", "Neighborhood does not exist"))?;
        DonorDetailType::try_from(result)
    }

    /**
     * Deletes a donor from the database by its ID.
     *
     * # Arguments
     * `transaction`: The database transaction to execute the query within.
     * `donor_id`: The ID of the donor to be deleted.
     *
     * # Returns
     * A result indicating success or failure of the operation.
     */
    #[instrument(skip(self, transaction))]
    pub async fn delete_donor(&self, transaction: &mut PgConnection, donor_id: Uuid) -> Result<(), ApplicationError> {
        let span = tracing::Span::current();
        let result = sqlx::query(DELETE_DONOR)
            .bind(donor_id)
            .execute(transaction)
            .instrument(span)
            .await
            .map_err(|err| query_error("delete donor", &err))?;
        if result.rows_affected() == 0 {
            tracing::debug!("Donor with ID {} not found for deletion", donor_id);
            return Err(ApplicationError::new(ErrorType::NotFound, "Donor not found".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn row(blood_type: &str) -> QueryDonorListDbResp {
        let now = Utc::now();
        (Uuid::new_v4(), "Ana".to_string(), "López".to_string(), "01234567-8".to_string(), None, Some("ana@example.com".to_string()), blood_type.to_string(), now, now, Uuid::new_v4(), "Centro".to_string())
    }

    #[test]
    fn test_row_conversion() {
        let row = row("AB-");
        let donor = DonorDetailType::try_from(row.clone()).unwrap();
        assert_eq!(donor.id, row.0);
        assert_eq!(donor.blood_type, BloodType::AbNegative);
        assert_eq!(donor.neighborhood_id, row.9);
        assert_eq!(donor.neighborhood_name, "Centro");
        assert_eq!(donor.phone, None);
    }

    #[test]
    fn test_row_conversion_unknown_blood_type() {
        let error = DonorDetailType::try_from(row("Z")).unwrap_err();
        assert_eq!(error.error_type, ErrorType::DatabaseError);
    }
}
