#![allow(dead_code)]

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use chrono::Utc;
use food_order_api::{
    config::{AppConfig, LinkConfig, PaymentConfig},
    db::run_migrations,
    entity::{
        menus::ActiveModel as MenuActive,
        users::ActiveModel as UserActive,
    },
    gateway::{GatewayError, PaymentGateway, PaymentHandle},
    middleware::auth::AuthUser,
    notification::{Notification, NotificationDispatcher},
    state::AppState,
};
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, Set};
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

pub const JWT_SECRET: &str = "test-secret";
pub const PAYMENT_LINK_BASE: &str = "https://shop.test/pay?orderId=";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayMode {
    Succeed,
    Fail,
    Hang,
}

#[derive(Debug, Clone)]
pub struct GatewayCall {
    pub amount_minor: i64,
    pub currency: String,
    pub metadata: BTreeMap<String, String>,
}

/// Gateway double that records every call.
pub struct RecordingGateway {
    pub mode: Mutex<GatewayMode>,
    pub calls: Mutex<Vec<GatewayCall>>,
}

impl RecordingGateway {
    pub fn set_mode(&self, mode: GatewayMode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for RecordingGateway {
    async fn create_payment_handle(
        &self,
        amount_minor: i64,
        currency: &str,
        metadata: BTreeMap<String, String>,
    ) -> Result<PaymentHandle, GatewayError> {
        self.calls.lock().unwrap().push(GatewayCall {
            amount_minor,
            currency: currency.to_string(),
            metadata,
        });
        let mode = *self.mode.lock().unwrap();
        match mode {
            GatewayMode::Succeed => Ok(PaymentHandle {
                client_secret: "pi_test_secret_123".into(),
                reference: "pi_test".into(),
            }),
            GatewayMode::Fail => Err(GatewayError::Rejected {
                status: 500,
                message: "upstream exploded".into(),
            }),
            GatewayMode::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Err(GatewayError::Transport("unreachable".into()))
            }
        }
    }
}

pub struct TestApp {
    pub state: AppState,
    pub outbox: UnboundedReceiver<Notification>,
    pub gateway: Arc<RecordingGateway>,
}

impl TestApp {
    /// Everything queued for delivery so far.
    pub fn sent(&mut self) -> Vec<Notification> {
        let mut sent = Vec::new();
        while let Ok(notification) = self.outbox.try_recv() {
            sent.push(notification);
        }
        sent
    }
}

pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".into(),
        host: "127.0.0.1".into(),
        port: 0,
        jwt_secret: JWT_SECRET.into(),
        payment: PaymentConfig {
            stripe_secret_key: "sk_test".into(),
            stripe_api_base: "http://127.0.0.1:9".into(),
            currency: "usd".into(),
            gateway_timeout: Duration::from_millis(200),
        },
        links: LinkConfig {
            payment_link_base: PAYMENT_LINK_BASE.into(),
            frontend_base_url: "https://shop.test".into(),
        },
    }
}

pub async fn setup() -> anyhow::Result<TestApp> {
    // A single pooled connection keeps the in-memory database alive and
    // serializes transactions the way row locks do on Postgres.
    let mut options = ConnectOptions::new("sqlite::memory:".to_owned());
    options
        .max_connections(1)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .sqlx_logging(false);
    let orm = Database::connect(options).await?;
    run_migrations(&orm).await?;

    let gateway = Arc::new(RecordingGateway {
        mode: Mutex::new(GatewayMode::Succeed),
        calls: Mutex::new(Vec::new()),
    });
    let (notifications, outbox) = NotificationDispatcher::channel();

    let state = AppState {
        orm,
        config: Arc::new(test_config()),
        gateway: gateway.clone(),
        notifications,
    };

    Ok(TestApp {
        state,
        outbox,
        gateway,
    })
}

pub async fn create_user(
    state: &AppState,
    email: &str,
    address: Option<&str>,
    role: &str,
) -> anyhow::Result<AuthUser> {
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        name: Set(email.split('@').next().unwrap_or(email).to_string()),
        address: Set(address.map(str::to_string)),
        role: Set(role.to_string()),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await?;

    Ok(AuthUser {
        user_id: user.id,
        role: user.role,
    })
}

pub async fn customer(state: &AppState, email: &str) -> anyhow::Result<AuthUser> {
    create_user(state, email, Some("1 Marina Road, Lagos"), "user").await
}

pub async fn admin(state: &AppState) -> anyhow::Result<AuthUser> {
    create_user(state, "admin@example.com", None, "admin").await
}

pub async fn create_menu(state: &AppState, name: &str, price: i64) -> anyhow::Result<Uuid> {
    let menu = MenuActive {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        description: Set(None),
        price: Set(price),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await?;
    Ok(menu.id)
}
