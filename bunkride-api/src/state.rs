use std::sync::Arc;

use bunkride_core::repository::ProfileRepository;
use bunkride_shared::events::{ChatMessageEvent, TripChangedEvent};
use bunkride_store::app_config::BusinessRules;
use bunkride_store::{EventProducer, RedisClient};
use bunkride_trips::repository::{ChatRepository, TripRepository};
use tokio::sync::broadcast;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub profiles: Arc<dyn ProfileRepository>,
    pub trips: Arc<dyn TripRepository>,
    pub chat: Arc<dyn ChatRepository>,
    pub redis: Arc<RedisClient>,
    pub kafka: Arc<EventProducer>,
    pub trip_tx: broadcast::Sender<TripChangedEvent>,
    pub chat_tx: broadcast::Sender<ChatMessageEvent>,
    pub auth: AuthConfig,
    pub business_rules: BusinessRules,
}
