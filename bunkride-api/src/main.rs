use std::net::SocketAddr;
use std::sync::Arc;

use bunkride_api::{app, state::{AppState, AuthConfig}, sweep};
use bunkride_store::{DbClient, EventProducer, PgChatRepository, PgProfileRepository, PgTripRepository, RedisClient};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bunkride_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = bunkride_store::app_config::Config::load().expect("Failed to load config");
    tracing::info!("Starting BunkRide API on port {}", config.server.port);

    // Postgres Connection
    let db = DbClient::new(&config.database.url)
        .await
        .expect("Failed to connect to Postgres");
    db.migrate().await.expect("Failed to run migrations");

    // Redis Connection
    let redis_client = RedisClient::new(&config.redis.url)
        .await
        .expect("Failed to connect to Redis");
    let redis_arc = Arc::new(redis_client);

    // Kafka Connection
    let kafka_producer = EventProducer::new(&config.kafka.brokers)
        .expect("Failed to create Kafka producer");
    let kafka_arc = Arc::new(kafka_producer);

    // SSE Broadcast Channels
    let (trip_tx, _) = tokio::sync::broadcast::channel(100);
    let (chat_tx, _) = tokio::sync::broadcast::channel(100);

    let trips = Arc::new(PgTripRepository::new(db.pool.clone()));

    let app_state = AppState {
        profiles: Arc::new(PgProfileRepository::new(db.pool.clone())),
        trips: trips.clone(),
        chat: Arc::new(PgChatRepository::new(db.pool.clone())),
        redis: redis_arc.clone(),
        kafka: kafka_arc,
        trip_tx,
        chat_tx,
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
        },
        business_rules: config.business_rules.clone(),
    };

    // Expired trips are cleaned up in the background; reads never depend on it.
    tokio::spawn(sweep::start_expiry_sweeper(
        trips,
        redis_arc,
        config.business_rules.sweep_interval_seconds,
    ));

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>()
    ).await.unwrap();
}
