use actix_web::{
    HttpRequest, HttpResponse, delete, get, post,
    web::{self, Path},
};
use tracing::{Instrument, instrument};
use uuid::Uuid;

use crate::{
    api::{
        rest::{DonorAddRequest, DonorElement, DonorListQuery, MessageResponse, NeighborhoodAddRequest, NeighborhoodElement, StatisticsResponse},
        state::AppState,
    },
    model::{
        apperror::{ApplicationError, ErrorType},
        models::{DonorAddInputType, DonorListInputType, NeighborhoodAddInputType},
    },
};

/**
 * Registers the endpoints together with extractor configs that report malformed input as `{error}` responses.
 */
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| ApplicationError::new(ErrorType::Validation, format!("Invalid request body: {err}")).into()))
        .app_data(web::QueryConfig::default().error_handler(|err, _req| ApplicationError::new(ErrorType::Validation, format!("Invalid query: {err}")).into()))
        .app_data(web::PathConfig::default().error_handler(|_err, _req| ApplicationError::new(ErrorType::NotFound, "Not found".to_string()).into()))
        .service(neighborhoods_list)
        .service(neighborhoods_add)
        .service(donors_list)
        .service(donors_add)
        .service(donors_delete)
        .service(statistics_get);
}

/**
 * Endpoint to retrieve all neighborhoods with their donor counts.
 */
#[instrument(skip(http_request, app_state), fields(service = "listNeighborhoods", trace_id = %get_trace_id(&http_request)))]
#[get("/neighborhoods")]
pub async fn neighborhoods_list(http_request: HttpRequest, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    let neighborhoods = app_state.neighborhood_service.get_neighborhood_list().instrument(span).await?;
    Ok(HttpResponse::Ok().json(neighborhoods.into_iter().map(NeighborhoodElement::from).collect::<Vec<_>>()))
}

/**
 * Endpoint to add a neighborhood.
 */
#[instrument(skip(http_request, request_body, app_state), fields(service = "addNeighborhood", trace_id = %get_trace_id(&http_request)))]
#[post("/neighborhoods")]
pub async fn neighborhoods_add(http_request: HttpRequest, request_body: web::Json<NeighborhoodAddRequest>, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    let neighborhood_add_input = NeighborhoodAddInputType::try_from(request_body.into_inner())?;
    let neighborhood = app_state.neighborhood_service.add_neighborhood(neighborhood_add_input).instrument(span).await?;
    Ok(HttpResponse::Created().json(NeighborhoodElement::from(neighborhood)))
}

/**
 * Endpoint to list donors, optionally of a single neighborhood.
 */
#[instrument(skip(http_request, query, app_state), fields(service = "listDonors", trace_id = %get_trace_id(&http_request)))]
#[get("/donors")]
pub async fn donors_list(http_request: HttpRequest, query: web::Query<DonorListQuery>, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    let filter_params = DonorListInputType::try_from(query.into_inner())?;
    let donors = app_state.donor_service.get_donor_list(filter_params).instrument(span).await?;
    Ok(HttpResponse::Ok().json(donors.into_iter().map(DonorElement::from).collect::<Vec<_>>()))
}

/**
 * Endpoint to register a donor.
 *
 * The access key is checked before the body is looked at, so an unauthorized caller never learns whether the body was valid.
 */
#[instrument(skip(http_request, request_body, app_state), fields(service = "addDonor", trace_id = %get_trace_id(&http_request)))]
#[post("/donors")]
pub async fn donors_add(http_request: HttpRequest, request_body: Result<web::Json<DonorAddRequest>, actix_web::Error>, app_state: web::Data<AppState>) -> Result<HttpResponse, actix_web::Error> {
    let span = tracing::Span::current();
    app_state.access_key_service.validate_registration(&http_request)?;
    let donor_add_input = DonorAddInputType::try_from(request_body?.into_inner())?;
    let donor = app_state.donor_service.add_donor(donor_add_input).instrument(span).await?;
    Ok(HttpResponse::Created().json(DonorElement::from(donor)))
}

/**
 * Endpoint to delete a donor. The access key is checked before the id is parsed.
 */
#[instrument(skip(path, http_request, app_state), fields(service = "deleteDonor", trace_id = %get_trace_id(&http_request)))]
#[delete("/donors/{donorId}")]
pub async fn donors_delete(path: Result<Path<Uuid>, actix_web::Error>, http_request: HttpRequest, app_state: web::Data<AppState>) -> Result<HttpResponse, actix_web::Error> {
    let span = tracing::Span::current();
    app_state.access_key_service.validate_deletion(&http_request)?;
    let donor_id = path?.into_inner();
    app_state.donor_service.delete_donor(donor_id).instrument(span).await?;
    Ok(HttpResponse::Ok().json(MessageResponse { message: "Donor deleted".to_string() }))
}

/**
 * Endpoint to retrieve the statistics summary.
 */
#[instrument(skip(http_request, app_state), fields(service = "getStatistics", trace_id = %get_trace_id(&http_request)))]
#[get("/statistics")]
pub async fn statistics_get(http_request: HttpRequest, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    let summary = app_state.statistics_service.get_summary().instrument(span).await?;
    Ok(HttpResponse::Ok().json(StatisticsResponse::from(summary)))
}

/**
 * Retrieves the trace ID from the HTTP request headers.
 * If the trace ID is not present, a new UUID is generated.
 */
fn get_trace_id(http_request: &HttpRequest) -> String {
    http_request.headers().get("X-Trace-ID").and_then(|v| v.to_str().ok().map(std::string::ToString::to_string)).unwrap_or_else(|| Uuid::new_v4().to_string())
}


#[cfg(feature = "integration-test")]
#[cfg(test)]
mod integration_test {
    use actix_web::{
        App,
        http::StatusCode,
        test::{self, TestRequest},
    };
    use serde_json::{Value, json};
    use sqlx::PgPool;

    use super::*;
    use crate::{
        api::security::AccessKeyService,
        dao::{donors::DonorDao, neighborhoods::NeighborhoodDao, statistics::StatisticsDao},
        model::config::AppSecurity,
        service::{donors::DonorService, neighborhoods::NeighborhoodService, statistics::StatisticsService},
    };

    fn state(pool: &PgPool) -> web::Data<AppState> {
        web::Data::new(AppState::new(
            AccessKeyService::new(&AppSecurity::default()),
            NeighborhoodService::new(NeighborhoodDao::new(), Some(pool.clone())),
            DonorService::new(DonorDao::new(), NeighborhoodDao::new(), Some(pool.clone())),
            StatisticsService::new(StatisticsDao::new(), Some(pool.clone())),
        ))
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_register_list_delete_flow(pool: PgPool) {
        let app = test::init_service(App::new().app_data(state(&pool)).configure(configure)).await;

        let request = TestRequest::post().uri("/neighborhoods").set_json(json!({ "name": "Centro" })).to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let neighborhood: Value = test::read_body_json(response).await;
        let neighborhood_id = neighborhood["id"].as_str().unwrap().to_string();

        let request = TestRequest::post().uri("/neighborhoods").set_json(json!({ "name": "Centro" })).to_request();
        assert_eq!(test::call_service(&app, request).await.status(), StatusCode::CONFLICT);

        let donor = json!({
            "firstName": "Ana",
            "lastName": "López",
            "nationalId": "01234567-8",
            "email": "ana@example.com",
            "bloodType": "AB+",
            "neighborhoodId": neighborhood_id,
            "donationDate": "2025-07-18"
        });
        let request = TestRequest::post().uri("/donors").set_json(&donor).to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let created: Value = test::read_body_json(response).await;
        assert_eq!(created["bloodType"], "AB+");
        assert_eq!(created["neighborhood"]["name"], "Centro");
        assert_eq!(created["donationDate"], "2025-07-18T00:00:00Z");

        let request = TestRequest::post().uri("/donors").set_json(&donor).to_request();
        assert_eq!(test::call_service(&app, request).await.status(), StatusCode::CONFLICT);

        let request = TestRequest::get().uri(&format!("/donors?neighborhoodId={neighborhood_id}")).to_request();
        let donors: Value = test::call_and_read_body_json(&app, request).await;
        assert_eq!(donors.as_array().unwrap().len(), 1);
        let listed = &donors[0];
        assert_eq!(listed["id"], created["id"]);
        assert_eq!(listed["firstName"], "Ana");
        assert_eq!(listed["nationalId"], "01234567-8");
        assert_eq!(listed["neighborhoodId"], neighborhood_id.as_str());
        assert_eq!(listed["neighborhood"]["id"], neighborhood_id.as_str());
        assert_eq!(listed["neighborhood"]["name"], "Centro");
        assert!(listed["createdAt"].is_string());

        let request = TestRequest::get().uri("/neighborhoods").to_request();
        let neighborhoods: Value = test::call_and_read_body_json(&app, request).await;
        let listed = &neighborhoods[0];
        assert_eq!(listed["id"], neighborhood_id.as_str());
        assert_eq!(listed["name"], "Centro");
        assert_eq!(listed["donorCount"], 1);
        assert!(listed["createdAt"].is_string());
        assert!(listed.get("description").is_some());

        let request = TestRequest::get().uri("/statistics").to_request();
        let statistics: Value = test::call_and_read_body_json(&app, request).await;
        assert_eq!(statistics["totalDonors"], 1);
        assert_eq!(statistics["donorsByNeighborhood"][0]["count"], 1);

        let request = TestRequest::delete().uri(&format!("/donors/{}", created["id"].as_str().unwrap())).to_request();
        assert_eq!(test::call_service(&app, request).await.status(), StatusCode::OK);

        let request = TestRequest::delete().uri(&format!("/donors/{}", created["id"].as_str().unwrap())).to_request();
        assert_eq!(test::call_service(&app, request).await.status(), StatusCode::NOT_FOUND);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_register_with_unknown_neighborhood(pool: PgPool) {
        let app = test::init_service(App::new().app_data(state(&pool)).configure(configure)).await;
        let donor = json!({
            "firstName": "Ana",
            "lastName": "López",
            "nationalId": "01234567-8",
            "bloodType": "O-",
            "neighborhoodId": Uuid::new_v4().to_string()
        });
        let request = TestRequest::post().uri("/donors").set_json(&donor).to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(response).await;
        assert_eq!(body["error"], "Neighborhood does not exist");
    }
}
