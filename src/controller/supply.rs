//! Supply API endpoints
//!
//! Each endpoint refreshes the cached on-chain values its formula reads,
//! computes the derived quantity and answers with a plain decimal string.

use actix_web::{get, http::header::ContentType, web, HttpResponse};
use alloy_primitives::U256;
use futures::future::join_all;
use tracing::{error, warn};

use crate::{
    cache_keys::MetricKey,
    configuration::{AppState, State},
    error::Error,
    helpers::format_amount,
    supply::SupplyMetric,
};

#[get("/supply-total")]
pub async fn total(
    state: web::Data<AppState<State>>,
) -> Result<HttpResponse, Error> {
    respond(&state, SupplyMetric::Total).await
}

#[get("/supply-circulating")]
pub async fn circulating(
    state: web::Data<AppState<State>>,
) -> Result<HttpResponse, Error> {
    respond(&state, SupplyMetric::Circulating).await
}

#[get("/supply-liquid")]
pub async fn liquid(
    state: web::Data<AppState<State>>,
) -> Result<HttpResponse, Error> {
    respond(&state, SupplyMetric::Liquid).await
}

#[get("/supply-locked")]
pub async fn locked(
    state: web::Data<AppState<State>>,
) -> Result<HttpResponse, Error> {
    respond(&state, SupplyMetric::Locked).await
}

#[get("/supply-staked")]
pub async fn staked(
    state: web::Data<AppState<State>>,
) -> Result<HttpResponse, Error> {
    respond(&state, SupplyMetric::Staked).await
}

#[get("/supply-staked-circulating")]
pub async fn staked_circulating(
    state: web::Data<AppState<State>>,
) -> Result<HttpResponse, Error> {
    respond(&state, SupplyMetric::StakedCirculating).await
}

#[get("/supply-staked-locked")]
pub async fn staked_locked(
    state: web::Data<AppState<State>>,
) -> Result<HttpResponse, Error> {
    respond(&state, SupplyMetric::StakedLocked).await
}

async fn respond(
    state: &State,
    metric: SupplyMetric,
) -> Result<HttpResponse, Error> {
    let value = match resolve(state, metric).await {
        Ok(value) => value,
        Err(e) => {
            error!("Failed to compute {}: {}", metric, e);
            return Err(e);
        },
    };
    let body = format_amount(value, state.config.token_decimals)?;

    Ok(HttpResponse::Ok()
        .content_type(ContentType::plaintext())
        .body(body))
}

/// Make the dependencies of `metric` fresh, then compute it from one
/// snapshot of the cache.
pub async fn resolve(
    state: &State,
    metric: SupplyMetric,
) -> Result<U256, Error> {
    let keys = state.calculator.dependencies(metric);

    let results =
        join_all(keys.iter().map(|key| refresh_or_fallback(state, *key)))
            .await;
    for result in results {
        result?;
    }

    let values = state.cache.snapshot();
    state.calculator.compute(metric, &values)
}

/// A failed refresh is only fatal when there is no earlier value to serve.
async fn refresh_or_fallback(
    state: &State,
    key: MetricKey,
) -> Result<(), Error> {
    match state.cache.ensure_fresh(key).await {
        Ok(()) => Ok(()),
        Err(e) if state.cache.entry(key).fetched => {
            warn!("Serving last known {} after failed refresh: {}", key, e);
            Ok(())
        },
        Err(e) => Err(e),
    }
}
