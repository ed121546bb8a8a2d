use config::{Config, File};
use serde::{Deserialize, Serialize};

use crate::error::AppResult;

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub reconcile: ReconcileConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    /// 超过该耗时的 SQL 记 WARN 日志
    pub slow_statement_secs: u64,
}

/// 对账相关配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// 参与自动对账的支付方式
    pub payment_method: String,
    /// 导入流水时写入的银行标签
    pub bank_label: String,
}

pub const DEFAULT_PAYMENT_METHOD: &str = "Transfer Bank";
pub const DEFAULT_BANK_LABEL: &str = "BANK";

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                url: "postgres://localhost/payment_reconciler".to_string(),
                // 对账由管理员手动触发，连接数无需太多
                max_connections: 5,
                acquire_timeout_secs: 10,
                slow_statement_secs: 5,
            },
            reconcile: ReconcileConfig {
                payment_method: DEFAULT_PAYMENT_METHOD.to_string(),
                bank_label: DEFAULT_BANK_LABEL.to_string(),
            },
        }
    }
}

impl AppConfig {
    /// 加载配置：默认值 -> config/default.toml (可选) -> 环境变量
    pub fn load() -> AppResult<Self> {
        let defaults = Self::default();

        let settings = Config::builder()
            .set_default("server.host", defaults.server.host)?
            .set_default("server.port", i64::from(defaults.server.port))?
            .set_default("database.url", defaults.database.url)?
            .set_default("database.max_connections", i64::from(defaults.database.max_connections))?
            .set_default("database.acquire_timeout_secs", to_i64(defaults.database.acquire_timeout_secs))?
            .set_default("database.slow_statement_secs", to_i64(defaults.database.slow_statement_secs))?
            .set_default("reconcile.payment_method", defaults.reconcile.payment_method)?
            .set_default("reconcile.bank_label", defaults.reconcile.bank_label)?
            .add_source(File::with_name("config/default").required(false))
            .set_override_option("server.host", env("SERVER_HOST"))?
            .set_override_option("server.port", env("SERVER_PORT"))?
            .set_override_option("database.url", env("DATABASE_URL"))?
            .set_override_option("database.max_connections", env("DATABASE_MAX_CONNECTIONS"))?
            .set_override_option("database.acquire_timeout_secs", env("DATABASE_ACQUIRE_TIMEOUT_SECS"))?
            .set_override_option("database.slow_statement_secs", env("DATABASE_SLOW_STATEMENT_SECS"))?
            .set_override_option("reconcile.payment_method", env("RECONCILE_PAYMENT_METHOD"))?
            .set_override_option("reconcile.bank_label", env("RECONCILE_BANK_LABEL"))?
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}
