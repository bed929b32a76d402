use crate::{
    api::security::AccessKeyService,
    service::{donors::DonorService, neighborhoods::NeighborhoodService, statistics::StatisticsService},
};

/**
* Represents the application state shared across the Actix web application.
*/
pub struct AppState {
    /**
     * Checks the access keys of the protected donor operations.
     */
    pub access_key_service: AccessKeyService,
    pub neighborhood_service: NeighborhoodService,
    pub donor_service: DonorService,
    /**
     * Computes the statistics summary.
     */
    pub statistics_service: StatisticsService,
}

impl AppState {
    /**
     * Creates a new instance of `AppState`.
     */
    pub fn new(access_key_service: AccessKeyService, neighborhood_service: NeighborhoodService, donor_service: DonorService, statistics_service: StatisticsService) -> Self {
        AppState { access_key_service, neighborhood_service, donor_service, statistics_service }
    }
}
