use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use tracing::{Instrument, instrument};
use uuid::Uuid;

use crate::{
    dao::query_error,
    model::{
        apperror::{ApplicationError, ErrorType},
        models::{BloodType, BloodTypeCountType, NeighborhoodCountType},
    },
};

/**
 * Database response type for donor counts per neighborhood.
 */
pub type QueryNeighborhoodCountDbResp = (Uuid, String, i64);

/**
 * Database response type for donor counts per blood type.
 */
pub type QueryBloodTypeCountDbResp = (String, i64);

/**
 * Pins every following read of the transaction to one snapshot.
 */
const SNAPSHOT_TRANSACTION: &str = "SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY";

/**
 * SQL query counting all donors.
 */
const COUNT_DONORS: &str = "SELECT COUNT(*) FROM donor";

/**
 * SQL query counting donors of every neighborhood, including empty ones.
 */
const COUNT_BY_NEIGHBORHOOD: &str = "SELECT n.id, n.name, COUNT(d.id)
                                     FROM neighborhood n LEFT JOIN donor d ON d.neighborhood_id = n.id
                                     GROUP BY n.id
                                     ORDER BY n.name ASC";

/**
 * SQL query counting donors per blood type. Only types present in the table are returned.
 */
const COUNT_BY_BLOOD_TYPE: &str = "SELECT blood_type, COUNT(*) FROM donor GROUP BY blood_type ORDER BY COUNT(*) DESC, blood_type ASC";

/**
 * SQL query for donation dates within a time window.
 */
const DONATION_DATES_BETWEEN: &str = "SELECT donation_date FROM donor WHERE donation_date >= $1 AND donation_date <= $2";

/**
 * DAO for the aggregate queries behind the statistics summary.
 */
#[derive(Default)]
pub struct StatisticsDao {}

impl StatisticsDao {
    pub fn new() -> Self {
        StatisticsDao {}
    }

    /**
     * Makes the current transaction read only with repeatable read isolation.
     * Must be the first statement of the transaction.
     */
    #[instrument(skip(self, transaction))]
    pub async fn begin_snapshot(&self, transaction: &mut PgConnection) -> Result<(), ApplicationError> {
        let span = tracing::Span::current();
        sqlx::query(SNAPSHOT_TRANSACTION).execute(transaction).instrument(span).await.map_err(|err| query_error("set snapshot isolation", &err))?;
        Ok(())
    }

    #[instrument(skip(self, connection))]
    pub async fn count_donors(&self, connection: &mut PgConnection) -> Result<i64, ApplicationError> {
        let span = tracing::Span::current();
        let count: (i64,) = sqlx::query_as(COUNT_DONORS).fetch_one(connection).instrument(span).await.map_err(|err| query_error("count donors", &err))?;
        Ok(count.0)
    }

    /**
     * Counts donors per neighborhood, ordered by neighborhood name.
     *
     * # Arguments
     * `connection`: The database connection.
     *
     * # Returns
     * One entry for every neighborhood, zero counts included.
     */
    #[instrument(skip(self, connection))]
    pub async fn count_by_neighborhood(&self, connection: &mut PgConnection) -> Result<Vec<NeighborhoodCountType>, ApplicationError> {
        let span = tracing::Span::current();
        let results: Vec<QueryNeighborhoodCountDbResp> =
            sqlx::query_as(COUNT_BY_NEIGHBORHOOD).fetch_all(connection).instrument(span).await.map_err(|err| query_error("count donors by neighborhood", &err))?;
        Ok(results.into_iter().map(|(id, name, count)| NeighborhoodCountType { id, name, count }).collect())
    }

    /**
     * Counts donors per blood type.
     *
     * # Arguments
     * `connection`: The database connection.
     *
     * # Returns
     * Blood types with at least one donor, most common first.
     */
    #[instrument(skip(self, connection))]
    pub async fn count_by_blood_type(&self, connection: &mut PgConnection) -> Result<Vec<BloodTypeCountType>, ApplicationError> {
        let span = tracing::Span::current();
        let results: Vec<QueryBloodTypeCountDbResp> =
            sqlx::query_as(COUNT_BY_BLOOD_TYPE).fetch_all(connection).instrument(span).await.map_err(|err| query_error("count donors by blood type", &err))?;
        results
            .into_iter()
            .map(|(blood_type, count)| {
                BloodType::from_str(&blood_type)
                    .map(|blood_type| BloodTypeCountType { blood_type, count })
                    .map_err(|_| ApplicationError::new(ErrorType::DatabaseError, format!("Stored blood type {blood_type} is not recognized")))
            })
            .collect()
    }

    /**
     * Retrieves the donation dates that fall within `[from, to]`.
     */
    #[instrument(skip(self, connection))]
    pub async fn get_donation_dates(&self, connection: &mut PgConnection, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<DateTime<Utc>>, ApplicationError> {
        let span = tracing::Span::current();
        let results: Vec<(DateTime<Utc>,)> = sqlx::query_as(DONATION_DATES_BETWEEN)
            .bind(from)
            .bind(to)
            .fetch_all(connection)
            .instrument(span)
            .await
            .map_err(|err| query_error("get donation dates", &err))?;
        Ok(results.into_iter().map(|row| row.0).collect())
    }
}
