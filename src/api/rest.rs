use std::str::FromStr;
use std::sync::LazyLock;

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{
    apperror::{ApplicationError, ErrorType},
    models::{
        BloodType, BloodTypeCountType, DonorAddInputType, DonorDetailType, DonorListInputType, MonthCountType, NeighborhoodAddInputType, NeighborhoodCountType, NeighborhoodDetailType,
        StatisticsSummaryType,
    },
};

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("Invalid email pattern"));

const MIN_NAME_LENGTH: usize = 2;
const MIN_NATIONAL_ID_LENGTH: usize = 8;

/***************** Neighborhood models *********************/

/**
 * Request body for creating a neighborhood.
 */
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NeighborhoodAddRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl TryFrom<NeighborhoodAddRequest> for NeighborhoodAddInputType {
    type Error = ApplicationError;

    fn try_from(request: NeighborhoodAddRequest) -> Result<Self, Self::Error> {
        let Some(name) = non_blank(request.name) else {
            return Err(ApplicationError::validation("Neighborhood name is required"));
        };
        Ok(NeighborhoodAddInputType { id: Uuid::new_v4(), name, description: non_blank(request.description) })
    }
}

/**
 * A neighborhood as returned by the API.
 */
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NeighborhoodElement {
    id: Uuid,
    name: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
    /**
     * Number of donors registered in the neighborhood.
     */
    donor_count: i64,
}

impl From<NeighborhoodDetailType> for NeighborhoodElement {
    fn from(neighborhood: NeighborhoodDetailType) -> Self {
        NeighborhoodElement { id: neighborhood.id, name: neighborhood.name, description: neighborhood.description, created_at: neighborhood.created_at, donor_count: neighborhood.donor_count }
    }
}

/***************** Donor models *********************/

/**
 * Query parameters for the donor listing.
 */
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonorListQuery {
    pub neighborhood_id: Option<String>,
}

impl TryFrom<DonorListQuery> for DonorListInputType {
    type Error = ApplicationError;

    fn try_from(query: DonorListQuery) -> Result<Self, Self::Error> {
        let neighborhood_id = match non_blank(query.neighborhood_id) {
            Some(neighborhood_id) => Some(Uuid::parse_str(&neighborhood_id).map_err(|_| ApplicationError::validation("Invalid neighborhoodId"))?),
            None => None,
        };
        Ok(DonorListInputType { neighborhood_id })
    }
}

/**
 * Request body for registering a donor.
 *
 * Every field is optional here so that missing values are reported as validation errors rather than JSON errors.
 */
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonorAddRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub national_id: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub blood_type: Option<String>,
    pub neighborhood_id: Option<String>,
    pub donation_date: Option<String>,
}

impl TryFrom<DonorAddRequest> for DonorAddInputType {
    type Error = ApplicationError;

    fn try_from(request: DonorAddRequest) -> Result<Self, Self::Error> {
        let (Some(first_name), Some(last_name), Some(national_id), Some(blood_type), Some(neighborhood_id)) =
            (non_blank(request.first_name), non_blank(request.last_name), non_blank(request.national_id), non_blank(request.blood_type), non_blank(request.neighborhood_id))
        else {
            return Err(ApplicationError::validation("Missing required fields"));
        };
        if first_name.chars().count() < MIN_NAME_LENGTH || last_name.chars().count() < MIN_NAME_LENGTH {
            return Err(ApplicationError::validation("First and last name must have at least 2 characters"));
        }
        if national_id.chars().count() < MIN_NATIONAL_ID_LENGTH {
            return Err(ApplicationError::validation("National ID must have at least 8 characters"));
        }
        let email = non_blank(request.email);
        if email.as_deref().is_some_and(|email| !EMAIL_PATTERN.is_match(email)) {
            return Err(ApplicationError::validation("Invalid email"));
        }
        let blood_type = BloodType::from_str(&blood_type)?;
        let neighborhood_id = Uuid::parse_str(&neighborhood_id).map_err(|_| ApplicationError::validation("Neighborhood does not exist"))?;
        let donation_date = non_blank(request.donation_date).map(|value| parse_donation_date(&value)).transpose()?;
        Ok(DonorAddInputType {
            id: Uuid::new_v4(),
            first_name,
            last_name,
            national_id,
            phone: non_blank(request.phone),
            email,
            blood_type,
            neighborhood_id,
            donation_date,
        })
    }
}

/**
 * Accepts an RFC 3339 timestamp or a plain `YYYY-MM-DD` date (midnight UTC).
 */
fn parse_donation_date(value: &str) -> Result<DateTime<Utc>, ApplicationError> {
    if let Ok(date_time) = DateTime::parse_from_rfc3339(value) {
        return Ok(date_time.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|date_time| date_time.and_utc())
        .ok_or_else(|| ApplicationError::validation("Invalid donationDate"))
}

/**
 * Trims the value and drops it when nothing is left.
 */
fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

/**
 * Reference to the neighborhood of a donor.
 */
#[derive(Debug, Serialize)]
pub struct NeighborhoodReferenceElement {
    id: Uuid,
    name: String,
}

/**
 * A donor as returned by the API.
 */
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DonorElement {
    id: Uuid,
    first_name: String,
    last_name: String,
    national_id: String,
    phone: Option<String>,
    email: Option<String>,
    blood_type: BloodType,
    donation_date: DateTime<Utc>,
    created_at: DateTime<Utc>,
    neighborhood_id: Uuid,
    neighborhood: NeighborhoodReferenceElement,
}

impl From<DonorDetailType> for DonorElement {
    fn from(donor: DonorDetailType) -> Self {
        DonorElement {
            id: donor.id,
            first_name: donor.first_name,
            last_name: donor.last_name,
            national_id: donor.national_id,
            phone: donor.phone,
            email: donor.email,
            blood_type: donor.blood_type,
            donation_date: donor.donation_date,
            created_at: donor.created_at,
            neighborhood_id: donor.neighborhood_id,
            neighborhood: NeighborhoodReferenceElement { id: donor.neighborhood_id, name: donor.neighborhood_name },
        }
    }
}

/**
 * Confirmation returned after a deletion.
 */
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/***************** Statistics models *********************/

/**
 * Response for the statistics summary.
 */
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsResponse {
    total_donors: i64,
    donors_by_neighborhood: Vec<NeighborhoodCountElement>,
    /**
     * No ordering is promised for this list.
     */
    donors_by_blood_type: Vec<BloodTypeCountElement>,
    donors_by_month: Vec<MonthCountElement>,
}

#[derive(Debug, Serialize)]
pub struct NeighborhoodCountElement {
    id: Uuid,
    name: String,
    count: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BloodTypeCountElement {
    blood_type: BloodType,
    count: i64,
}

#[derive(Debug, Serialize)]
pub struct MonthCountElement {
    month: String,
    count: i64,
}

impl From<NeighborhoodCountType> for NeighborhoodCountElement {
    fn from(value: NeighborhoodCountType) -> Self {
        NeighborhoodCountElement { id: value.id, name: value.name, count: value.count }
    }
}

impl From<BloodTypeCountType> for BloodTypeCountElement {
    fn from(value: BloodTypeCountType) -> Self {
        BloodTypeCountElement { blood_type: value.blood_type, count: value.count }
    }
}

impl From<MonthCountType> for MonthCountElement {
    fn from(value: MonthCountType) -> Self {
        MonthCountElement { month: value.month, count: value.count }
    }
}

impl From<StatisticsSummaryType> for StatisticsResponse {
    fn from(summary: StatisticsSummaryType) -> Self {
        StatisticsResponse {
            total_donors: summary.total_donors,
            donors_by_neighborhood: summary.by_neighborhood.into_iter().map(NeighborhoodCountElement::from).collect(),
            donors_by_blood_type: summary.by_blood_type.into_iter().map(BloodTypeCountElement::from).collect(),
            donors_by_month: summary.by_month.into_iter().map(MonthCountElement::from).collect(),
        }
    }
}

/***************** Error models *********************/

/**
 * Custom error response for the application.
 */
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /**
     * A human-readable message describing the error.
     */
    pub error: String,
}

impl ResponseError for ApplicationError {
    fn status_code(&self) -> StatusCode {
        get_statuscode(&self.error_type)
    }

    /**
     * Generates an error response for the application error.
     */
    fn error_response(&self) -> HttpResponse {
        if matches!(self.error_type, ErrorType::DatabaseError | ErrorType::Initialization) {
            tracing::error!("Request failed: {}", self.message);
        }
        HttpResponse::build(self.status_code()).json(ErrorResponse { error: self.message.clone() })
    }
}

/**
* Maps application errors to HTTP status codes.
*
* # Arguments
* `application_error`: The type of error that occurred.
*
* # Returns
* The corresponding HTTP status code.
*/
fn get_statuscode(application_error: &ErrorType) -> StatusCode {
    match application_error {
        ErrorType::Validation => StatusCode::BAD_REQUEST,
        ErrorType::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorType::NotFound => StatusCode::NOT_FOUND,
        ErrorType::Conflict => StatusCode::CONFLICT,
        ErrorType::Initialization | ErrorType::DatabaseError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
