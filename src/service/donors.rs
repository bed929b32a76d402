use chrono::Utc;
use sqlx::{PgConnection, Pool, Postgres};
use uuid::Uuid;

use crate::{
    dao::{donors::DonorDao, neighborhoods::NeighborhoodDao},
    model::{
        apperror::ApplicationError,
        models::{DonorAddInputType, DonorDetailType, DonorListInputType},
    },
    service::{acquire, begin, finish},
};

/**
 * Lists, registers and deletes donors.
 */
pub struct DonorService {
    /**
     * The DAO for donor operations.
     */
    donor_dao: DonorDao,
    /**
     * Used to verify the referenced neighborhood before registering.
     */
    neighborhood_dao: NeighborhoodDao,
    /**
     * Optional connection pool for database operations. Optional for test purposes until we have a better way to mock the database.
     */
    connection_pool: Option<Pool<Postgres>>,
}

impl DonorService {
    /**
     * Creates a new instance of `DonorService`.
     *
     * # Arguments
     * `donor_dao`: The DAO for donor operations.
     * `neighborhood_dao`: The DAO for neighborhood lookups.
     * `connection_pool`: Optional connection pool for database operations.
     */
    pub fn new(donor_dao: DonorDao, neighborhood_dao: NeighborhoodDao, connection_pool: Option<Pool<Postgres>>) -> Self {
        DonorService { donor_dao, neighborhood_dao, connection_pool }
    }

    /**
     * Retrieves donors in registration order, optionally only those of one neighborhood.
     */
    pub async fn get_donor_list(&self, filter_params: DonorListInputType) -> Result<Vec<DonorDetailType>, ApplicationError> {
        let mut connection = acquire(&self.connection_pool).await?;
        self.donor_dao.get_donor_list(&mut connection, filter_params).await
    }

    /**
     * Registers a donor. The neighborhood must exist and the national id must be unused.
     * A missing donation date is set to the registration time.
     *
     * # Arguments
     * `donor_add_input`: The validated donor.
     *
     * # Returns
     * The stored donor joined with its neighborhood.
     */
    pub async fn add_donor(&self, donor_add_input: DonorAddInputType) -> Result<DonorDetailType, ApplicationError> {
        let mut transaction = begin(&self.connection_pool).await?;
        let result = self.add_donor_in_transaction(&mut transaction, donor_add_input).await;
        finish(transaction, result).await
    }

    async fn add_donor_in_transaction(&self, transaction: &mut PgConnection, donor_add_input: DonorAddInputType) -> Result<DonorDetailType, ApplicationError> {
        if !self.neighborhood_dao.neighborhood_exists(&mut *transaction, donor_add_input.neighborhood_id).await? {
            return Err(ApplicationError::validation("Neighborhood does not exist"));
        }
        let donation_date = donor_add_input.donation_date.unwrap_or_else(Utc::now);
        let donor = self.donor_dao.add_donor(transaction, donor_add_input, donation_date).await?;
        tracing::info!(donor_id = %donor.id, neighborhood = %donor.neighborhood_name, "Donor registered");
        Ok(donor)
    }

    /**
     * Deletes a donor by its ID.
     *
     * # Arguments
     * `donor_id`: The ID of the donor to be deleted.
     *
     * # Returns
     * A Result indicating success or a not found `ApplicationError`.
     */
    pub async fn delete_donor(&self, donor_id: Uuid) -> Result<(), ApplicationError> {
        let mut transaction = begin(&self.connection_pool).await?;
        let result = self.donor_dao.delete_donor(&mut transaction, donor_id).await;
        finish(transaction, result).await?;
        tracing::info!(donor_id = %donor_id, "Donor deleted");
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::{apperror::ErrorType, models::BloodType};

    #[tokio::test]
    async fn test_without_pool_is_database_error() {
        let service = DonorService::new(DonorDao::new(), NeighborhoodDao::new(), None);
        let error = service.get_donor_list(DonorListInputType::default()).await.unwrap_err();
        assert_eq!(error.error_type, ErrorType::DatabaseError);
        let input = DonorAddInputType {
            id: Uuid::new_v4(),
            first_name: "Ana".to_string(),
            last_name: "López".to_string(),
            national_id: "01234567".to_string(),
            phone: None,
            email: None,
            blood_type: BloodType::APositive,
            neighborhood_id: Uuid::new_v4(),
            donation_date: None,
        };
        assert_eq!(service.add_donor(input).await.unwrap_err().error_type, ErrorType::DatabaseError);
        assert_eq!(service.delete_donor(Uuid::new_v4()).await.unwrap_err().error_type, ErrorType::DatabaseError);
    }
}
