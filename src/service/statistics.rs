use std::collections::BTreeMap;

use chrono::{DateTime, Months, Utc};
use sqlx::{PgConnection, Pool, Postgres};

use crate::{
    dao::statistics::StatisticsDao,
    model::{
        apperror::ApplicationError,
        models::{MonthCountType, StatisticsSummaryType},
    },
    service::{begin, finish},
};

/**
 * Length of the trailing window reported per month.
 */
const MONTH_WINDOW: u32 = 6;

/**
 * Represents the service computing the statistics summary.
 */
pub struct StatisticsService {
    /**
     * The DAO for the aggregate queries.
     */
    statistics_dao: StatisticsDao,
    /**
     * Optional connection pool for database operations. Optional for test purposes until we have a better way to mock the database.
     */
    connection_pool: Option<Pool<Postgres>>,
}

impl StatisticsService {
    /**
     * Creates a new instance of `StatisticsService`.
     *
     * # Arguments
     * `statistics_dao`: The DAO for the aggregate queries.
     * `connection_pool`: Optional connection pool for database operations.
     *
     * # Returns
     * A new instance of `StatisticsService`.
     */
    pub fn new(statistics_dao: StatisticsDao, connection_pool: Option<Pool<Postgres>>) -> Self {
        StatisticsService { statistics_dao, connection_pool }
    }

    /**
     * Computes the statistics summary from the current state of the store.
     *
     * All reads share one repeatable read snapshot, so the per neighborhood counts always add up to the total.
     * Any failure fails the whole summary.
     *
     * # Returns
     * A Result containing `StatisticsSummaryType` or an `ApplicationError`.
     */
    pub async fn get_summary(&self) -> Result<StatisticsSummaryType, ApplicationError> {
        let mut transaction = begin(&self.connection_pool).await?;
        let result = self.get_summary_in_transaction(&mut transaction, Utc::now()).await;
        finish(transaction, result).await
    }

    async fn get_summary_in_transaction(&self, transaction: &mut PgConnection, now: DateTime<Utc>) -> Result<StatisticsSummaryType, ApplicationError> {
        self.statistics_dao.begin_snapshot(&mut *transaction).await?;
        let total_donors = self.statistics_dao.count_donors(&mut *transaction).await?;
        let by_neighborhood = self.statistics_dao.count_by_neighborhood(&mut *transaction).await?;
        let by_blood_type = self.statistics_dao.count_by_blood_type(&mut *transaction).await?;
        let donation_dates = self.statistics_dao.get_donation_dates(transaction, month_window_start(now), now).await?;
        Ok(StatisticsSummaryType { total_donors, by_neighborhood, by_blood_type, by_month: group_by_month(&donation_dates) })
    }
}

/**
 * Start of the trailing month window ending at `now`.
 */
fn month_window_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now.checked_sub_months(Months::new(MONTH_WINDOW)).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/**
 * Counts donation dates per calendar month (UTC), ascending by `YYYY-MM`.
 */
fn group_by_month(donation_dates: &[DateTime<Utc>]) -> Vec<MonthCountType> {
    let mut counts: BTreeMap<String, i64> = BTreeMap::new();
    for donation_date in donation_dates {
        *counts.entry(donation_date.format("%Y-%m").to_string()).or_insert(0) += 1;
    }
    counts.into_iter().map(|(month, count)| MonthCountType { month, count }).collect()
}

#[cfg(test)]
mod test {
    use chrono::TimeZone;

    use super::*;
    use crate::model::apperror::ErrorType;

    fn date(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_group_by_month_sorted_ascending() {
        let dates = vec![date(2025, 7, 18), date(2025, 3, 1), date(2025, 7, 1), date(2024, 12, 31), date(2025, 3, 15), date(2025, 7, 30)];
        let grouped = group_by_month(&dates);
        assert_eq!(
            grouped,
            vec![
                MonthCountType { month: "2024-12".to_string(), count: 1 },
                MonthCountType { month: "2025-03".to_string(), count: 2 },
                MonthCountType { month: "2025-07".to_string(), count: 3 },
            ]
        );
    }

    #[test]
    fn test_group_by_month_empty() {
        assert!(group_by_month(&[]).is_empty());
    }

    #[test]
    fn test_group_by_month_uses_utc() {
        let late_evening = Utc.with_ymd_and_hms(2025, 1, 31, 23, 59, 59).unwrap();
        let grouped = group_by_month(&[late_evening]);
        assert_eq!(grouped[0].month, "2025-01");
    }

    #[test]
    fn test_month_window_start() {
        assert_eq!(month_window_start(date(2025, 7, 18)), date(2025, 1, 18));
        assert_eq!(month_window_start(date(2025, 3, 10)), date(2024, 9, 10));
    }

    #[test]
    fn test_month_window_start_clamps_day() {
        let start = month_window_start(Utc.with_ymd_and_hms(2025, 8, 31, 0, 0, 0).unwrap());
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 2, 28, 0, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn test_summary_without_pool() {
        let service = StatisticsService::new(StatisticsDao::new(), None);
        let error = service.get_summary().await.unwrap_err();
        assert_eq!(error.error_type, ErrorType::DatabaseError);
    }
}
