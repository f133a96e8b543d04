use std::sync::Arc;

use crate::{
    config::AppConfig, db::OrmConn, gateway::PaymentGateway,
    notification::NotificationDispatcher,
};

#[derive(Clone)]
pub struct AppState {
    pub orm: OrmConn,
    pub config: Arc<AppConfig>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub notifications: NotificationDispatcher,
}
