use std::sync::Arc;

use tracing::{error, info, Level};

use supply_api::{
    configuration::{
        get_configuration, set_configuration, AppState, Config, State,
    },
    error::Error,
    handler::cache_warmup,
    provider::Chain,
    server,
};

#[tokio::main]
async fn main() -> Result<(), Error> {
    let result = app_main().await;

    if let Err(err) = &result {
        error!("{}", err);
    }

    result
}

async fn app_main() -> Result<(), Error> {
    let subscriber = tracing_subscriber::fmt()
        .compact()
        .with_level(true)
        .with_max_level(Level::INFO)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config = init()?;
    info!("Loaded configuration {:?}", config);

    let chain = Arc::new(Chain::new(&config));
    let state = State::new(config, chain);
    let app_state = AppState::new(state);

    if app_state.config.warm_cache {
        cache_warmup::warm_up(&app_state).await;
    }

    server::server_task(&app_state).await
}

fn init() -> Result<Config, Error> {
    set_configuration()?;
    let config = get_configuration()?;
    Ok(config)
}
