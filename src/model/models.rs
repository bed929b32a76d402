use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::apperror::ApplicationError;

/***************** Blood types *********************/

/**
 * The eight ABO/Rh blood groups accepted by the registration.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BloodType {
    #[serde(rename = "A+")]
    APositive,
    #[serde(rename = "A-")]
    ANegative,
    #[serde(rename = "B+")]
    BPositive,
    #[serde(rename = "B-")]
    BNegative,
    #[serde(rename = "AB+")]
    AbPositive,
    #[serde(rename = "AB-")]
    AbNegative,
    #[serde(rename = "O+")]
    OPositive,
    #[serde(rename = "O-")]
    ONegative,
}

impl BloodType {
    pub const ALL: [BloodType; 8] =
        [BloodType::APositive, BloodType::ANegative, BloodType::BPositive, BloodType::BNegative, BloodType::AbPositive, BloodType::AbNegative, BloodType::OPositive, BloodType::ONegative];

    /**
     * The textual form used both on the wire and in the `donor.blood_type` column.
     */
    pub fn as_str(&self) -> &'static str {
        match self {
            BloodType::APositive => "A+",
            BloodType::ANegative => "A-",
            BloodType::BPositive => "B+",
            BloodType::BNegative => "B-",
            BloodType::AbPositive => "AB+",
            BloodType::AbNegative => "AB-",
            BloodType::OPositive => "O+",
            BloodType::ONegative => "O-",
        }
    }
}

impl FromStr for BloodType {
    type Err = ApplicationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_uppercase();
        BloodType::ALL
            .into_iter()
            .find(|blood_type| blood_type.as_str() == normalized)
            .ok_or_else(|| ApplicationError::validation("Blood type must be one of A+, A-, B+, B-, AB+, AB-, O+, O-"))
    }
}

impl fmt::Display for BloodType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/***************** Neighborhood models *********************/

/**
 * Validated input for creating a neighborhood.
 */
#[derive(Debug, Clone)]
pub struct NeighborhoodAddInputType {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
}

/**
 * A neighborhood together with the number of donors registered in it.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct NeighborhoodDetailType {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub donor_count: i64,
}

/***************** Donor models *********************/

/**
 * Validated input for registering a donor.
 */
#[derive(Debug, Clone)]
pub struct DonorAddInputType {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub national_id: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub blood_type: BloodType,
    pub neighborhood_id: Uuid,
    /**
     * When absent the registration time is used.
     */
    pub donation_date: Option<DateTime<Utc>>,
}

/**
 * Filter for the donor listing.
 */
#[derive(Debug, Clone, Default)]
pub struct DonorListInputType {
    pub neighborhood_id: Option<Uuid>,
}

/**
 * A donor joined with the name of its neighborhood.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct DonorDetailType {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub national_id: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub blood_type: BloodType,
    pub donation_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub neighborhood_id: Uuid,
    pub neighborhood_name: String,
}

/***************** Statistics models *********************/

#[derive(Debug, Clone, PartialEq)]
pub struct NeighborhoodCountType {
    pub id: Uuid,
    pub name: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BloodTypeCountType {
    pub blood_type: BloodType,
    pub count: i64,
}

/**
 * Number of donations in one calendar month, `month` formatted as `YYYY-MM`.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct MonthCountType {
    pub month: String,
    pub count: i64,
}

/**
 * Aggregate view over all donors, computed on request.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct StatisticsSummaryType {
    pub total_donors: i64,
    pub by_neighborhood: Vec<NeighborhoodCountType>,
    pub by_blood_type: Vec<BloodTypeCountType>,
    pub by_month: Vec<MonthCountType>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_blood_type_parse_all() {
        for blood_type in BloodType::ALL {
            assert_eq!(BloodType::from_str(blood_type.as_str()).unwrap(), blood_type);
        }
    }

    #[test]
    fn test_blood_type_parse_lowercase_and_whitespace() {
        assert_eq!(BloodType::from_str(" ab- ").unwrap(), BloodType::AbNegative);
        assert_eq!(BloodType::from_str("o+").unwrap(), BloodType::OPositive);
    }

    #[test]
    fn test_blood_type_parse_invalid() {
        assert!(BloodType::from_str("C+").is_err());
        assert!(BloodType::from_str("").is_err());
        assert!(BloodType::from_str("A").is_err());
    }

    #[test]
    fn test_blood_type_serialization() {
        assert_eq!(serde_json::to_string(&BloodType::AbPositive).unwrap(), "\"AB+\"");
        let deserialized: BloodType = serde_json::from_str("\"O-\"").unwrap();
        assert_eq!(deserialized, BloodType::ONegative);
    }
}
