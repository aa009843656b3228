use serde::Deserialize;

use crate::flags::{StaticFlags, CHECKOUT_FAILURE_THRESHOLD, KAFKA_QUEUE_PROBLEMS, PAYMENT_UNREACHABLE};

const DEFAULT_METRICS_PORT: u16 = 9090;
const DEFAULT_OVERLOAD_TASK_LIMIT: usize = 1024;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("environment variable {0} not set")]
    Missing(&'static str),

    #[error("invalid configuration: {0}")]
    Invalid(#[from] config::ConfigError),
}

/// Raw environment view; every key is optional until validated
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    checkout_port: Option<u16>,
    cart_addr: Option<String>,
    product_catalog_addr: Option<String>,
    currency_addr: Option<String>,
    shipping_addr: Option<String>,
    payment_addr: Option<String>,
    email_addr: Option<String>,
    kafka_addr: Option<String>,
    flagd_ofrep_url: Option<String>,
    metrics_port: Option<u16>,
    overload_task_limit: Option<usize>,
    checkout_failure_threshold: Option<i64>,
    payment_unreachable: Option<bool>,
    kafka_queue_problems: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    pub port: u16,
    pub cart_addr: String,
    pub product_catalog_addr: String,
    pub currency_addr: String,
    pub shipping_addr: String,
    pub payment_addr: String,
    pub email_addr: String,
    /// Publishing is off without a broker
    pub kafka_addr: Option<String>,
    pub flagd_ofrep_url: Option<String>,
    pub metrics_port: u16,
    pub overload_task_limit: usize,
    pub static_flags: StaticFlags,
}

impl CheckoutConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(config::Environment::default())
    }

    fn load(env: config::Environment) -> Result<Self, ConfigError> {
        let raw: RawConfig = config::Config::builder()
            .add_source(env.try_parsing(true).ignore_empty(true))
            .build()?
            .try_deserialize()?;

        fn required<T>(value: Option<T>, key: &'static str) -> Result<T, ConfigError> {
            value.ok_or(ConfigError::Missing(key))
        }

        let static_flags = StaticFlags::new()
            .with_int(CHECKOUT_FAILURE_THRESHOLD, raw.checkout_failure_threshold.unwrap_or(0))
            .with_bool(PAYMENT_UNREACHABLE, raw.payment_unreachable.unwrap_or(false))
            .with_int(KAFKA_QUEUE_PROBLEMS, raw.kafka_queue_problems.unwrap_or(0));

        Ok(Self {
            port: required(raw.checkout_port, "CHECKOUT_PORT")?,
            cart_addr: required(raw.cart_addr, "CART_ADDR")?,
            product_catalog_addr: required(raw.product_catalog_addr, "PRODUCT_CATALOG_ADDR")?,
            currency_addr: required(raw.currency_addr, "CURRENCY_ADDR")?,
            shipping_addr: required(raw.shipping_addr, "SHIPPING_ADDR")?,
            payment_addr: required(raw.payment_addr, "PAYMENT_ADDR")?,
            email_addr: required(raw.email_addr, "EMAIL_ADDR")?,
            kafka_addr: raw.kafka_addr,
            flagd_ofrep_url: raw.flagd_ofrep_url,
            metrics_port: raw.metrics_port.unwrap_or(DEFAULT_METRICS_PORT),
            overload_task_limit: raw.overload_task_limit.unwrap_or(DEFAULT_OVERLOAD_TASK_LIMIT),
            static_flags,
        })
    }

    pub fn log_effective(&self) {
        tracing::info!(
            port = self.port,
            cart_addr = %self.cart_addr,
            product_catalog_addr = %self.product_catalog_addr,
            currency_addr = %self.currency_addr,
            shipping_addr = %self.shipping_addr,
            payment_addr = %self.payment_addr,
            email_addr = %self.email_addr,
            kafka_addr = self.kafka_addr.as_deref().unwrap_or("<disabled>"),
            flagd_ofrep_url = self.flagd_ofrep_url.as_deref().unwrap_or("<static flags>"),
            metrics_port = self.metrics_port,
            overload_task_limit = self.overload_task_limit,
            "Checkout configuration loaded"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::FlagProvider;

    fn env(vars: &[(&str, &str)]) -> config::Environment {
        let map: config::Map<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        config::Environment::default().source(Some(map))
    }

    const REQUIRED: &[(&str, &str)] = &[
        ("CHECKOUT_PORT", "5050"),
        ("CART_ADDR", "cart:7070"),
        ("PRODUCT_CATALOG_ADDR", "product-catalog:3550"),
        ("CURRENCY_ADDR", "currency:7001"),
        ("SHIPPING_ADDR", "shipping:50050"),
        ("PAYMENT_ADDR", "payment:50051"),
        ("EMAIL_ADDR", "http://email:6060"),
    ];

    #[test]
    fn test_loads_required_values_with_defaults() {
        let config = CheckoutConfig::load(env(REQUIRED)).unwrap();

        assert_eq!(config.port, 5050);
        assert_eq!(config.cart_addr, "cart:7070");
        assert_eq!(config.email_addr, "http://email:6060");
        assert_eq!(config.kafka_addr, None);
        assert_eq!(config.flagd_ofrep_url, None);
        assert_eq!(config.metrics_port, 9090);
        assert_eq!(config.overload_task_limit, 1024);
    }

    #[test]
    fn test_missing_value_names_the_variable() {
        let vars: Vec<_> = REQUIRED.iter().copied().filter(|(k, _)| *k != "SHIPPING_ADDR").collect();

        let err = CheckoutConfig::load(env(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("SHIPPING_ADDR")));
        assert_eq!(err.to_string(), "environment variable SHIPPING_ADDR not set");
    }

    #[test]
    fn test_empty_kafka_addr_disables_publishing() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("KAFKA_ADDR", ""));

        let config = CheckoutConfig::load(env(&vars)).unwrap();
        assert_eq!(config.kafka_addr, None);
    }

    #[tokio::test]
    async fn test_static_flag_values() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([
            ("KAFKA_ADDR", "kafka:9092"),
            ("CHECKOUT_FAILURE_THRESHOLD", "500"),
            ("PAYMENT_UNREACHABLE", "true"),
            ("KAFKA_QUEUE_PROBLEMS", "3"),
        ]);

        let config = CheckoutConfig::load(env(&vars)).unwrap();
        assert_eq!(config.kafka_addr.as_deref(), Some("kafka:9092"));

        let flags = config.static_flags;
        assert_eq!(flags.evaluate_int(CHECKOUT_FAILURE_THRESHOLD, 0).await, 500);
        assert!(flags.evaluate_bool(PAYMENT_UNREACHABLE, false).await);
        assert_eq!(flags.evaluate_int(KAFKA_QUEUE_PROBLEMS, 0).await, 3);
    }

    #[test]
    fn test_malformed_port_is_invalid() {
        let mut vars: Vec<_> = REQUIRED.iter().copied().filter(|(k, _)| *k != "CHECKOUT_PORT").collect();
        vars.push(("CHECKOUT_PORT", "not-a-port"));

        let err = CheckoutConfig::load(env(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
