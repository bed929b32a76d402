use actix_web::{FromRequest, HttpRequest};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use subtle::ConstantTimeEq;

use crate::model::{
    apperror::{ApplicationError, ErrorType},
    config::AppSecurity,
};

/**
 * Access key service for the protected donor operations.
 *
 * Each operation is guarded by its own shared key sent as `Authorization: Bearer <key>`.
 * An operation without a configured key is open.
 */
#[derive(Clone)]
pub struct AccessKeyService {
    /**
     * Key required to register donors.
     */
    registration_key: Option<String>,
    /**
     * Key required to delete donors.
     */
    deletion_key: Option<String>,
}

impl AccessKeyService {
    /**
     * Creates a new instance of AccessKeyService.
     *
     * # Arguments
     * `app_security`: The security section of the configuration.
     */
    pub fn new(app_security: &AppSecurity) -> Self {
        AccessKeyService { registration_key: non_empty(&app_security.registration_key), deletion_key: non_empty(&app_security.deletion_key) }
    }

    pub fn registration_open(&self) -> bool {
        self.registration_key.is_none()
    }

    pub fn deletion_open(&self) -> bool {
        self.deletion_key.is_none()
    }

    /**
     * Validates the key presented for registering a donor.
     */
    pub fn validate_registration(&self, http_request: &HttpRequest) -> Result<(), ApplicationError> {
        Self::validate(self.registration_key.as_deref(), http_request)
    }

    /**
     * Validates the key presented for deleting a donor.
     */
    pub fn validate_deletion(&self, http_request: &HttpRequest) -> Result<(), ApplicationError> {
        Self::validate(self.deletion_key.as_deref(), http_request)
    }

    /**
     * Validates the bearer token of the request against the expected key.
     *
     * # Arguments
     * `expected_key`: The configured key, `None` when the operation is open.
     * `http_request`: The HTTP request containing the key in the Authorization header.
     *
     * # Returns
     * A Result indicating success or an unauthorized ApplicationError.
     */
    fn validate(expected_key: Option<&str>, http_request: &HttpRequest) -> Result<(), ApplicationError> {
        let Some(expected_key) = expected_key else {
            return Ok(());
        };
        let credentials = BearerAuth::from_request(http_request, &mut actix_web::dev::Payload::None).into_inner().ok();
        let Some(credentials) = credentials else {
            return Err(ApplicationError::new(ErrorType::Unauthorized, "Unauthorized".to_string()));
        };
        if !keys_match(credentials.token(), expected_key) {
            tracing::warn!("Rejected request to {} with invalid access key", http_request.path());
            return Err(ApplicationError::new(ErrorType::Unauthorized, "Unauthorized".to_string()));
        }
        Ok(())
    }
}

/**
 * Compares a presented key with the configured one in constant time.
 */
fn keys_match(presented_key: &str, expected_key: &str) -> bool {
    bool::from(presented_key.as_bytes().ct_eq(expected_key.as_bytes()))
}

fn non_empty(key: &Option<String>) -> Option<String> {
    key.as_ref().filter(|key| !key.is_empty()).cloned()
}

#[cfg(test)]
mod test {
    use actix_web::test::TestRequest;

    use super::*;

    fn service() -> AccessKeyService {
        AccessKeyService::new(&AppSecurity { registration_key: Some("register-key".to_string()), deletion_key: Some("delete-key".to_string()) })
    }

    #[test]
    fn test_validate_registration_success() {
        let req = TestRequest::default().insert_header(("Authorization", "Bearer register-key")).to_http_request();
        assert!(service().validate_registration(&req).is_ok());
    }

    #[test]
    fn test_keys_are_not_interchangeable() {
        let req = TestRequest::default().insert_header(("Authorization", "Bearer register-key")).to_http_request();
        let error = service().validate_deletion(&req).unwrap_err();
        assert_eq!(error.error_type, ErrorType::Unauthorized);
    }

    #[test]
    fn test_keys_match() {
        assert!(keys_match("register-key", "register-key"));
        assert!(!keys_match("register-kez", "register-key"));
        assert!(!keys_match("register", "register-key"));
        assert!(!keys_match("", "register-key"));
    }

    #[test]
    fn test_key_prefix_rejected() {
        let req = TestRequest::default().insert_header(("Authorization", "Bearer register")).to_http_request();
        let error = service().validate_registration(&req).unwrap_err();
        assert_eq!(error.error_type, ErrorType::Unauthorized);
    }

    #[test]
    fn test_missing_header() {
        let req = TestRequest::default().to_http_request();
        assert!(service().validate_registration(&req).is_err());
        assert!(service().validate_deletion(&req).is_err());
    }

    #[test]
    fn test_wrong_scheme() {
        let req = TestRequest::default().insert_header(("Authorization", "Basic cmVnaXN0ZXIta2V5")).to_http_request();
        assert!(service().validate_registration(&req).is_err());
    }

    #[test]
    fn test_open_when_not_configured() {
        let service = AccessKeyService::new(&AppSecurity { registration_key: None, deletion_key: Some(String::new()) });
        let req = TestRequest::default().to_http_request();
        assert!(service.registration_open());
        assert!(service.deletion_open());
        assert!(service.validate_registration(&req).is_ok());
        assert!(service.validate_deletion(&req).is_ok());
    }
}
