use sqlx::{Pool, Postgres};

use crate::{
    dao::neighborhoods::NeighborhoodDao,
    model::{
        apperror::ApplicationError,
        models::{NeighborhoodAddInputType, NeighborhoodDetailType},
    },
    service::{acquire, begin, finish},
};

/**
 * Represents the service for managing neighborhoods.
 */
pub struct NeighborhoodService {
    neighborhood_dao: NeighborhoodDao,
    /**
     * Optional connection pool for database operations. Optional for test purposes until we have a better way to mock the database.
     */
    connection_pool: Option<Pool<Postgres>>,
}

impl NeighborhoodService {
    pub fn new(neighborhood_dao: NeighborhoodDao, connection_pool: Option<Pool<Postgres>>) -> Self {
        NeighborhoodService { neighborhood_dao, connection_pool }
    }

    /**
     * Retrieves all neighborhoods in alphabetical order with their donor counts.
     */
    pub async fn get_neighborhood_list(&self) -> Result<Vec<NeighborhoodDetailType>, ApplicationError> {
        let mut connection = acquire(&self.connection_pool).await?;
        self.neighborhood_dao.get_neighborhood_list(&mut connection).await
    }

    /**
     * Adds a new neighborhood.
     *
     * # Arguments
     * `neighborhood_add_input`: The validated neighborhood.
     *
     * # Returns
     * The stored neighborhood, or a conflict `ApplicationError` when the name is taken.
     */
    pub async fn add_neighborhood(&self, neighborhood_add_input: NeighborhoodAddInputType) -> Result<NeighborhoodDetailType, ApplicationError> {
        let mut transaction = begin(&self.connection_pool).await?;
        let result = self.neighborhood_dao.add_neighborhood(&mut transaction, neighborhood_add_input).await;
        let neighborhood = finish(transaction, result).await?;
        tracing::info!(neighborhood_id = %neighborhood.id, name = %neighborhood.name, "Neighborhood created");
        Ok(neighborhood)
    }
}

#[cfg(test)]
mod test {
    use uuid::Uuid;

    use super::*;
    use crate::model::apperror::ErrorType;

    #[tokio::test]
    async fn test_without_pool_is_database_error() {
        let service = NeighborhoodService::new(NeighborhoodDao::new(), None);
        let error = service.get_neighborhood_list().await.unwrap_err();
        assert_eq!(error.error_type, ErrorType::DatabaseError);
        let input = NeighborhoodAddInputType { id: Uuid::new_v4(), name: "Centro".to_string(), description: None };
        let error = service.add_neighborhood(input).await.unwrap_err();
        assert_eq!(error.error_type, ErrorType::DatabaseError);
    }
}

#[cfg(feature = "integration-test")]
#[cfg(test)]
mod integration_test {
    use sqlx::PgPool;
    use uuid::Uuid;

    use super::*;
    use crate::model::apperror::ErrorType;

    #[sqlx::test(migrations = "./migrations")]
    async fn test_add_and_list(pool: PgPool) {
        let service = NeighborhoodService::new(NeighborhoodDao::new(), Some(pool));
        let input = NeighborhoodAddInputType { id: Uuid::new_v4(), name: "Los Llanitos".to_string(), description: Some("Barrio tradicional".to_string()) };
        let stored = service.add_neighborhood(input.clone()).await.unwrap();
        assert_eq!(stored.id, input.id);
        assert_eq!(stored.description, input.description);
        assert_eq!(stored.donor_count, 0);
        let list = service.get_neighborhood_list().await.unwrap();
        assert_eq!(list, vec![stored]);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_duplicate_name(pool: PgPool) {
        let service = NeighborhoodService::new(NeighborhoodDao::new(), Some(pool));
        service.add_neighborhood(NeighborhoodAddInputType { id: Uuid::new_v4(), name: "Centro".to_string(), description: None }).await.unwrap();
        let error = service.add_neighborhood(NeighborhoodAddInputType { id: Uuid::new_v4(), name: "Centro".to_string(), description: None }).await.unwrap_err();
        assert_eq!(error.error_type, ErrorType::Conflict);
        assert_eq!(service.get_neighborhood_list().await.unwrap().len(), 1);
    }
}
