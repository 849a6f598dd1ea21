use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use std::sync::Arc;

mod auth;
mod config;
mod controllers;
mod db;
mod ledger;
mod models;
mod payments;

use config::Config;
use db::Database;
use ledger::{EvmLedgerGateway, LedgerGateway};
use payments::{HttpServiceInvoker, ServiceInvoker, ServiceOrchestrator, TransferRecorder};

pub struct AppState {
    pub db: Arc<Database>,
    pub config: Config,
    pub gateway: Arc<dyn LedgerGateway>,
    pub recorder: TransferRecorder,
    pub orchestrator: ServiceOrchestrator,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = Config::from_env();
    let port = config.port;

    log::info!("Initializing database at {}", config.database_url);
    let db = Database::new(&config.database_url).expect("Failed to initialize database");
    let db = Arc::new(db);

    log::info!(
        "Connecting ledger gateway: chain {} via {}",
        config.chain_id,
        config.rpc_url
    );
    let gateway: Arc<dyn LedgerGateway> = Arc::new(
        EvmLedgerGateway::new(&config.rpc_url, config.chain_id, &config.token_address)
            .expect("Failed to initialize ledger gateway"),
    );
    let invoker: Arc<dyn ServiceInvoker> =
        Arc::new(HttpServiceInvoker::new().expect("Failed to initialize service invoker"));

    let recorder = TransferRecorder::new(
        db.clone(),
        gateway.clone(),
        &config.currency,
        config.token_decimals,
    );
    let orchestrator = ServiceOrchestrator::new(db.clone(), recorder.clone(), invoker);

    log::info!("Starting Vypr server on port {}", port);

    let db_for_app = db.clone();
    let config_for_app = config.clone();
    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(AppState {
                db: Arc::clone(&db_for_app),
                config: config_for_app.clone(),
                gateway: Arc::clone(&gateway),
                recorder: recorder.clone(),
                orchestrator: orchestrator.clone(),
            }))
            .wrap(Logger::default())
            .wrap(cors)
            .configure(controllers::health::config)
            .configure(controllers::auth::config)
            .configure(controllers::wallets::config)
            .configure(controllers::transactions::config)
            .configure(controllers::services::config)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
