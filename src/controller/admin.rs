//! Operator endpoints
//!
//! Not listed on the index page. Each call costs one upstream query per
//! cached metric.

use actix_web::{get, http::header::ContentType, web, HttpResponse};
use tracing::info;

use crate::{
    configuration::{AppState, State},
    error::Error,
};

#[get("/supply-refresh-cache")]
pub async fn refresh_cache(
    state: web::Data<AppState<State>>,
) -> Result<HttpResponse, Error> {
    info!("Cache refresh requested");

    state.cache.force_invalidate_all();
    state.cache.refresh_all().await?;

    Ok(HttpResponse::Ok()
        .content_type(ContentType::plaintext())
        .body("Cache refreshed"))
}
