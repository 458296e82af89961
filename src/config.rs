use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::env;
use std::path::Path;
use tracing::info;
use validator::Validate;

const DEFAULT_ENV: &str = "development";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";

/// Acquiring (payment provider) configuration.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Base URL of the acquiring API
    #[serde(default = "default_gateway_base_url")]
    pub base_url: String,

    /// Bearer token for the acquiring API
    pub token: String,

    /// Where the buyer lands after a successful payment
    #[serde(default = "default_redirect_url")]
    pub redirect_url: String,

    /// Where the buyer lands after a failed payment
    #[serde(default = "default_fail_redirect_url")]
    pub fail_redirect_url: String,

    /// Supplier contact phone placed on the fiscal receipt
    pub supplier_phone: String,

    /// Tax system code reported on the receipt
    #[serde(default = "default_tax_system_code")]
    pub tax_system_code: String,

    /// Hard timeout for every gateway call, in seconds
    #[serde(default = "default_gateway_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: default_gateway_base_url(),
            token: String::new(),
            redirect_url: default_redirect_url(),
            fail_redirect_url: default_fail_redirect_url(),
            supplier_phone: String::new(),
            tax_system_code: default_tax_system_code(),
            timeout_secs: default_gateway_timeout_secs(),
        }
    }
}

/// Monetary knobs of the pricing engine.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct PricingConfig {
    /// Flat delivery fee charged below the free-delivery threshold
    #[serde(default = "default_delivery_fee")]
    pub delivery_fee: Decimal,

    /// Cart subtotal at which delivery becomes free
    #[serde(default = "default_free_delivery_min")]
    pub free_delivery_min: Decimal,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            delivery_fee: default_delivery_fee(),
            free_delivery_min: default_free_delivery_min(),
        }
    }
}

/// Settlement reconciler schedule.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct SettlementConfig {
    /// Seconds between periodic sweeps over pending orders
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Unpaid orders older than this many days are expired to canceled
    #[serde(default = "default_expiry_days")]
    pub expiry_days: i64,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval_secs(),
            expiry_days: default_expiry_days(),
        }
    }
}

/// Application configuration with validation.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment (development, test, production)
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    #[serde(default)]
    #[validate]
    pub gateway: GatewayConfig,

    #[serde(default)]
    #[validate]
    pub pricing: PricingConfig,

    #[serde(default)]
    #[validate]
    pub settlement: SettlementConfig,
}

impl AppConfig {
    /// Minimal constructor used by tests and tooling; everything else
    /// falls back to defaults.
    pub fn new(database_url: String, host: String, port: u16, environment: String) -> Self {
        Self {
            database_url,
            host,
            port,
            environment,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_json: false,
            auto_migrate: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            gateway: GatewayConfig::default(),
            pricing: PricingConfig::default(),
            settlement: SettlementConfig::default(),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_db_max_connections() -> u32 {
    10
}
fn default_db_min_connections() -> u32 {
    1
}
fn default_gateway_base_url() -> String {
    "https://enter.tochka.com".to_string()
}
fn default_redirect_url() -> String {
    "https://example.com".to_string()
}
fn default_fail_redirect_url() -> String {
    "https://example.com/fail".to_string()
}
fn default_tax_system_code() -> String {
    "usn_income_outcome".to_string()
}
fn default_gateway_timeout_secs() -> u64 {
    10
}
fn default_delivery_fee() -> Decimal {
    dec!(300)
}
fn default_free_delivery_min() -> Decimal {
    dec!(3000)
}
fn default_sweep_interval_secs() -> u64 {
    300
}
fn default_expiry_days() -> i64 {
    7
}

/// Loads configuration from `config/default.toml`, an environment-specific
/// file selected by `RUN_ENV`/`APP_ENV`, and `APP_*` environment variables
/// (double underscore for nesting, e.g. `APP__GATEWAY__TOKEN`).
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    let config = Config::builder()
        .set_default("database_url", "sqlite://checkout.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT as i64)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;
    app_config
        .validate()
        .map_err(|e| ConfigError::Message(format!("Invalid configuration: {e}")))?;
    Ok(app_config)
}

/// Initializes the tracing subscriber. `RUST_LOG` overrides the configured
/// level when set.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let default_directive = format!("checkout_api={},tower_http=info", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);
    let filter = EnvFilter::try_new(filter_directive)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));

    if json {
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init();
    } else {
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .try_init();
    }
}
