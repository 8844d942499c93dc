use actix_cors::Cors;
use actix_web::{dev::Server, http::header, middleware, web, App, HttpServer};
use tracing::info;

use crate::{
    configuration::{AppState, Config, State},
    controller::{admin, index, supply},
    error::Error,
};

pub async fn server_task(app_state: &AppState<State>) -> Result<(), Error> {
    let app = app_state.clone();
    tokio::spawn(async move {
        let server = init_server(app)?;
        server.await?;
        Ok(())
    })
    .await?
}

fn init_server(app_state: AppState<State>) -> Result<Server, Error> {
    let host = app_state.config.server_host.to_owned();
    let port = app_state.config.port;

    info!("Listening on {}:{}", host, port);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(cors(&app_state.config))
            .wrap(security_headers())
            .wrap(middleware::Compress::default())
            .app_data(web::Data::new(app_state.clone()))
            .configure(routes)
    })
    .bind((host, port))?
    .run();
    Ok(server)
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(index::index).service(
        web::scope("/v0")
            .service(supply::total)
            .service(supply::circulating)
            .service(supply::liquid)
            .service(supply::locked)
            .service(supply::staked)
            .service(supply::staked_circulating)
            .service(supply::staked_locked)
            .service(admin::refresh_cache),
    );
}

pub fn cors(config: &Config) -> Cors {
    let allowed_origins = config.allowed_origins.clone();
    let allowed_cors = String::from("*");
    let cors_access_all = allowed_origins.contains(&allowed_cors);

    Cors::default()
        .allowed_origin_fn(move |origin, _| {
            if cors_access_all {
                return true;
            }
            if let Ok(origin) = origin.to_str() {
                return allowed_origins.contains(&origin.to_owned());
            }
            false
        })
        .allowed_methods(vec!["GET"])
        .allowed_headers(vec![header::ACCEPT])
        .allowed_header(header::CONTENT_TYPE)
}

/// Hardening headers added to every response
pub fn security_headers() -> middleware::DefaultHeaders {
    middleware::DefaultHeaders::new()
        .add(("Content-Security-Policy", "default-src 'self'"))
        .add(("Cross-Origin-Opener-Policy", "same-origin"))
        .add(("Cross-Origin-Resource-Policy", "same-origin"))
        .add(("Referrer-Policy", "no-referrer"))
        .add((
            "Strict-Transport-Security",
            "max-age=15552000; includeSubDomains",
        ))
        .add(("X-Content-Type-Options", "nosniff"))
        .add(("X-DNS-Prefetch-Control", "off"))
        .add(("X-Frame-Options", "SAMEORIGIN"))
}
