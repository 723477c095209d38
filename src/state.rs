//! Shared application state handed to every handler.

use std::sync::Arc;

use axum::extract::FromRef;

use crate::{
    clients::{sms::SmsClient, three_ds::ThreeDsClient},
    config::Config,
    db::DbPool,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub config: Arc<Config>,
    pub three_ds: ThreeDsClient,
    pub sms: SmsClient,
}

impl AppState {
    pub fn new(pool: DbPool, config: Config, three_ds: ThreeDsClient, sms: SmsClient) -> Self {
        Self {
            pool,
            config: Arc::new(config),
            three_ds,
            sms,
        }
    }
}

/// Lets middleware and simple handlers keep extracting `State<DbPool>`.
impl FromRef<AppState> for DbPool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}
