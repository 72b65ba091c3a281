use std::env;

use anyhow::Context;

use crate::services::pricing::PricingPolicy;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub pricing_policy: PricingPolicy,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET is not set")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let pricing_policy = match env::var("PRICING_MODE") {
            Ok(mode) => mode
                .parse::<PricingPolicy>()
                .map_err(|err| anyhow::anyhow!(err))?,
            Err(_) => PricingPolicy::default(),
        };
        Ok(Self {
            port,
            database_url,
            host,
            jwt_secret,
            pricing_policy,
        })
    }
}
