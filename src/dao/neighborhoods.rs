use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use tracing::{Instrument, instrument};
use uuid::Uuid;

use crate::{
    dao::{handle_database_error, query_error},
    model::{
        apperror::ApplicationError,
        models::{NeighborhoodAddInputType, NeighborhoodDetailType},
    },
};

/**
 * Database response type for querying the neighborhood list.
 */
pub type QueryNeighborhoodListDbResp = (Uuid, String, Option<String>, DateTime<Utc>, i64);

/**
 * SQL query to retrieve all neighborhoods with their donor counts.
 */
const QUERY_NEIGHBORHOOD_LIST: &str = "SELECT n.id, n.name, n.description, n.created_at, COUNT(d.id) AS donor_count
                                       FROM neighborhood n LEFT JOIN donor d ON d.neighborhood_id = n.id
                                       GROUP BY n.id
                                       ORDER BY n.name ASC";

/**
 * SQL query to add a new neighborhood.
 */
const ADD_NEIGHBORHOOD: &str = "INSERT INTO neighborhood (id, name, description) VALUES ($1, $2, $3) RETURNING id, name, description, created_at, 0::bigint";

/**
 * SQL query to check that a neighborhood exists.
 */
const NEIGHBORHOOD_EXISTS: &str = "SELECT EXISTS (SELECT 1 FROM neighborhood WHERE id = $1)";

impl From<QueryNeighborhoodListDbResp> for NeighborhoodDetailType {
    fn from(row: QueryNeighborhoodListDbResp) -> Self {
        NeighborhoodDetailType { id: row.0, name: row.1, description: row.2, created_at: row.3, donor_count: row.4 }
    }
}

/**
 * DAO for neighborhood-related database operations.
 */
#[derive(Default)]
pub struct NeighborhoodDao {}

impl NeighborhoodDao {
    pub fn new() -> Self {
        NeighborhoodDao {}
    }

    /**
     * Retrieves all neighborhoods ordered by name, each with its number of donors.
     *
     * # Arguments
     * `connection`: The database connection.
     *
     * # Returns
     * A Result containing the neighborhoods or an `ApplicationError`.
     */
    #[instrument(skip(self, connection))]
    pub async fn get_neighborhood_list(&self, connection: &mut PgConnection) -> Result<Vec<NeighborhoodDetailType>, ApplicationError> {
        let span = tracing::Span::current();
        let results: Vec<QueryNeighborhoodListDbResp> =
            sqlx::query_as(QUERY_NEIGHBORHOOD_LIST).fetch_all(connection).instrument(span).await.map_err(|err| query_error("get neighborhood list", &err))?;
        Ok(results.into_iter().map(NeighborhoodDetailType::from).collect())
    }

    /**
     * Adds a new neighborhood to the database.
     *
     * # Arguments
     * `transaction`: The database transaction to execute the query within.
     * `neighborhood_add_input`: The validated neighborhood.
     *
     * # Returns
     * The stored neighborhood, or a conflict error if the name is taken.
     */
    #[instrument(skip(self, transaction))]
    pub async fn add_neighborhood(&self, transaction: &mut PgConnection, neighborhood_add_input: NeighborhoodAddInputType) -> Result<NeighborhoodDetailType, ApplicationError> {
        let span = tracing::Span::current();
        let result: QueryNeighborhoodListDbResp = sqlx::query_as(ADD_NEIGHBORHOOD)
            .bind(neighborhood_add_input.id)
            .bind(neighborhood_add_input.name)
            .bind(neighborhood_add_input.description)
            .fetch_one(transaction)
            .instrument(span)
            .await
            .map_err(|err| handle_database_error(&err, "A neighborhood with this name already exists", "Missing parent value"))?;
        Ok(NeighborhoodDetailType::from(result))
    }

    /**
     * Checks whether a neighborhood with the given id exists.
     */
    #[instrument(skip(self, connection))]
    pub async fn neighborhood_exists(&self, connection: &mut PgConnection, neighborhood_id: Uuid) -> Result<bool, ApplicationError> {
        let span = tracing::Span::current();
        let exists: (bool,) = sqlx::query_as(NEIGHBORHOOD_EXISTS)
            .bind(neighborhood_id)
            .fetch_one(connection)
            .instrument(span)
            .await
            .map_err(|err| query_error("check neighborhood existence", &err))?;
        Ok(exists.0)
    }
}
