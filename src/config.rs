use std::{env, time::Duration};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub payment: PaymentConfig,
    pub links: LinkConfig,
}

#[derive(Debug, Clone)]
pub struct PaymentConfig {
    pub stripe_secret_key: String,
    pub stripe_api_base: String,
    pub currency: String,
    pub gateway_timeout: Duration,
}

/// Links embedded in customer notifications.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    pub payment_link_base: String,
    pub frontend_base_url: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET is not set"))?;

        let payment = PaymentConfig {
            stripe_secret_key: env::var("STRIPE_SECRET_KEY")
                .map_err(|_| anyhow::anyhow!("STRIPE_SECRET_KEY is not set"))?,
            stripe_api_base: env::var("STRIPE_API_BASE")
                .unwrap_or_else(|_| "https://api.stripe.com".to_string()),
            currency: env::var("PAYMENT_CURRENCY").unwrap_or_else(|_| "usd".to_string()),
            gateway_timeout: Duration::from_millis(
                env::var("GATEWAY_TIMEOUT_MS")
                    .ok()
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(10_000),
            ),
        };

        let links = LinkConfig {
            payment_link_base: env::var("PAYMENT_LINK_BASE")
                .unwrap_or_else(|_| "http://localhost:5173/pay?orderId=".to_string()),
            frontend_base_url: env::var("FRONTEND_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
        };

        Ok(Self {
            port,
            database_url,
            host,
            jwt_secret,
            payment,
            links,
        })
    }
}
