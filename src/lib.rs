pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod store;
pub mod utils;

use crate::services::calendar_service::GoogleCalendarClient;
use crate::services::email_service::ResendMailer;
use crate::services::extraction_service::OpenAiExtractor;
use crate::services::scheduling_service::SchedulingService;
use crate::store::postgres::PgScheduleStore;
use reqwest::Client;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub scheduling_service: SchedulingService,
}

impl AppState {
    pub fn new(pool: PgPool) -> Self {
        let config = crate::config::get_config();
        let http_client = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .unwrap();

        let store = Arc::new(PgScheduleStore::new(pool));
        let extractor = OpenAiExtractor::new(
            config.openai_api_key.clone(),
            config.openai_model.clone(),
            http_client.clone(),
        );
        let mailer = ResendMailer::new(
            config.resend_api_key.clone(),
            config.email_from_name.clone(),
            http_client.clone(),
        );
        let calendar = GoogleCalendarClient::new(
            config.google_client_id.clone(),
            config.google_client_secret.clone(),
            http_client,
        );

        let scheduling_service = SchedulingService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store,
            Arc::new(extractor),
            Arc::new(mailer),
            Arc::new(calendar),
        );

        Self { scheduling_service }
    }
}
