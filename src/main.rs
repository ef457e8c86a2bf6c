use actix_web::{middleware as actix_middleware, web, App, HttpResponse, HttpServer};
use sqlx::postgres::PgPoolOptions;
use std::io;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use moderation_service::clients::{
    GenerativeClassifierPort, GoogleVisionClient, VertexGenerativeClient,
};
use moderation_service::db::{
    PgNotificationSink, PgReviewCaseStore, PgUploadStore, PgUserStateStore,
};
use moderation_service::handlers;
use moderation_service::services::{
    DuplicateResolver, ModerationPipeline, ReviewCaseService, Thresholds, TriggerClassifier,
    UserRiskService,
};
use moderation_service::Config;

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = Config::from_env()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("configuration error: {e}")))?;
    tracing::info!(
        host = %config.host,
        port = config.port,
        "Starting moderation service"
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("database error: {e}")))?;
    let pool = Arc::new(pool);

    tracing::info!("Running database migrations");
    sqlx::migrate!("./migrations")
        .run(&*pool)
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("migration error: {e}")))?;

    let uploads = Arc::new(PgUploadStore::new(pool.clone()));
    let cases = Arc::new(PgReviewCaseStore::new(pool.clone()));
    let user_state = Arc::new(PgUserStateStore::new(pool.clone()));
    let notifications = Arc::new(PgNotificationSink::new(pool.clone()));

    let vision = Arc::new(GoogleVisionClient::new(
        config.vision_endpoint.clone(),
        config.vision_api_key.clone(),
    ));
    let generative: Option<Arc<dyn GenerativeClassifierPort>> = if config.generative_enabled {
        Some(Arc::new(VertexGenerativeClient::new(
            config.generative_endpoint.clone(),
            config.generative_api_key.clone(),
        )))
    } else {
        tracing::info!("Generative classifier disabled");
        None
    };

    let classifier = TriggerClassifier::new(
        vision.clone(),
        vision,
        generative,
        Thresholds {
            suggest: config.suggest_threshold,
            forbidden: config.forbidden_threshold,
            medium_log: config.medium_log_threshold,
        },
        config.max_label_results,
    );
    let dedup = DuplicateResolver::new(uploads.clone(), config.hamming_threshold);
    let risk = UserRiskService::new(
        user_state,
        config.false_appeal_threshold,
        config.cooldown(),
    );
    let review = Arc::new(ReviewCaseService::new(
        cases,
        uploads.clone(),
        notifications,
        risk,
        config.lock_duration(),
    ));
    let pipeline = web::Data::new(ModerationPipeline::new(
        dedup,
        classifier,
        uploads,
        review.clone(),
    ));
    let review_data = web::Data::from(review);

    let bind_address = format!("{}:{}", config.host, config.port);
    tracing::info!(%bind_address, "HTTP server listening");
    let config_data = web::Data::new(config);

    HttpServer::new(move || {
        App::new()
            .app_data(config_data.clone())
            .app_data(pipeline.clone())
            .app_data(review_data.clone())
            .wrap(actix_middleware::Logger::default())
            .route(
                "/api/v1/health",
                web::get()
                    .to(|| async { HttpResponse::Ok().json(serde_json::json!({"status": "ok"})) }),
            )
            .route(
                "/api/v1/health/ready",
                web::get().to(|| async { HttpResponse::Ok().finish() }),
            )
            .route(
                "/api/v1/health/live",
                web::get().to(|| async { HttpResponse::Ok().finish() }),
            )
            .configure(handlers::configure)
    })
    .bind(&bind_address)?
    .run()
    .await
}
