use actix_web::{get, http::header::ContentType, web, HttpResponse};

use crate::{
    configuration::{AppState, State},
    supply::SupplyMetric,
};

const API_VERSION: &str = "v0";

/// Public endpoint listing; the cache refresh endpoint is not listed.
#[get("/")]
pub async fn index(state: web::Data<AppState<State>>) -> HttpResponse {
    HttpResponse::Ok()
        .content_type(ContentType::html())
        .body(endpoint_listing(&state.config.public_url))
}

pub fn endpoint_listing(public_url: &str) -> String {
    let links = SupplyMetric::ALL
        .iter()
        .map(|metric| {
            let url = format!("{}/{}/{}", public_url, API_VERSION, metric);
            format!("<a href='{url}'>{url}</a><br />")
        })
        .collect::<Vec<String>>()
        .join("\n");

    format!("<p>Supply API {}:<br />\n{}</p>", API_VERSION, links)
}
