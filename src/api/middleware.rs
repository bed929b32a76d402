use std::time::{Duration, Instant};

use actix_web::{
    Error,
    body::MessageBody,
    dev::{ServiceRequest, ServiceResponse},
    middleware::Next,
};
use tracing::{debug, warn};

/**
 * Requests slower than this are logged as warnings.
 */
const SLOW_REQUEST_THRESHOLD: Duration = Duration::from_millis(500);

/**
 * Middleware for timing requests.
 *
 * The matched route pattern is logged instead of the raw path so that donor ids do not end up in the performance log.
 */
pub async fn timing_middleware(request: ServiceRequest, next: Next<impl MessageBody>) -> Result<ServiceResponse<impl MessageBody>, Error> {
    let start_time = Instant::now();
    let route = request.match_pattern().unwrap_or_else(|| "UNKNOWN".to_string());
    let method = request.method().clone();
    let response = next.call(request).await;
    let status = match &response {
        Ok(service_response) => service_response.status().as_u16(),
        Err(err) => err.as_response_error().status_code().as_u16(),
    };
    let elapsed = start_time.elapsed();
    if elapsed > SLOW_REQUEST_THRESHOLD {
        warn!(target: "performance", "Slow request {} {} with status {} took {}ms", method, route, status, elapsed.as_millis());
    } else {
        debug!(target: "performance", "Request {} {} with status {} took {}ms", method, route, status, elapsed.as_millis());
    }
    response
}

#[cfg(test)]
mod test {
    use super::*;
    use actix_web::{App, HttpResponse, middleware::from_fn, test, web};

    #[actix_web::test]
    async fn test_passes_response_through() {
        let app = test::init_service(
            App::new().wrap(from_fn(timing_middleware)).route("/donors/{donorId}", web::delete().to(|| async { HttpResponse::Ok().body("deleted") })),
        )
        .await;
        let request = test::TestRequest::delete().uri("/donors/123").to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status().as_u16(), 200);
        let body = test::read_body(response).await;
        assert_eq!(body, "deleted");
    }

    #[actix_web::test]
    async fn test_unmatched_route() {
        let app = test::init_service(App::new().wrap(from_fn(timing_middleware))).await;
        let request = test::TestRequest::get().uri("/unknown").to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status().as_u16(), 404);
    }
}
