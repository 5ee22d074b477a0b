pub mod app_config;
pub mod chat_repo;
pub mod database;
pub mod events;
pub mod profile_repo;
pub mod redis_repo;
pub mod trip_repo;

pub use chat_repo::PgChatRepository;
pub use database::DbClient;
pub use events::EventProducer;
pub use profile_repo::PgProfileRepository;
pub use redis_repo::RedisClient;
pub use trip_repo::PgTripRepository;
