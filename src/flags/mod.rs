// ============================================================================
// Feature Flags
// ============================================================================
//
// Runtime switches are read through `FlagProvider`, evaluated on every call.
// Evaluation never fails from the caller's point of view: any problem yields
// the supplied default. Callers go through `bool_flag` / `int_flag`, which
// give up on a provider that outlives the caller's context.
//
// ============================================================================

mod ofrep;

use async_trait::async_trait;
use std::collections::HashMap;

use crate::utils::CallContext;

pub use ofrep::OfrepFlags;

/// Max per-item USD price; 0 disables the price guard
pub const CHECKOUT_FAILURE_THRESHOLD: &str = "checkoutFailureThreshold";
/// Routes payment to an unreachable endpoint
pub const PAYMENT_UNREACHABLE: &str = "paymentUnreachable";
/// Extra fire-and-forget publishes per order
pub const KAFKA_QUEUE_PROBLEMS: &str = "kafkaQueueProblems";

#[async_trait]
pub trait FlagProvider: Send + Sync {
    async fn evaluate_bool(&self, flag: &str, default: bool) -> bool;

    async fn evaluate_int(&self, flag: &str, default: i64) -> i64;
}

/// Evaluates a bool flag unless `ctx` ends first, in which case `default` wins
pub async fn bool_flag(ctx: &CallContext, flags: &dyn FlagProvider, flag: &str, default: bool) -> bool {
    match ctx.run(flags.evaluate_bool(flag, default)).await {
        Ok(value) => value,
        Err(reason) => {
            tracing::debug!(flag = flag, error = %reason, "Flag evaluation abandoned, using default");
            default
        }
    }
}

pub async fn int_flag(ctx: &CallContext, flags: &dyn FlagProvider, flag: &str, default: i64) -> i64 {
    match ctx.run(flags.evaluate_int(flag, default)).await {
        Ok(value) => value,
        Err(reason) => {
            tracing::debug!(flag = flag, error = %reason, "Flag evaluation abandoned, using default");
            default
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FlagValue {
    Bool(bool),
    Int(i64),
}

/// Fixed flag values
#[derive(Debug, Clone, Default)]
pub struct StaticFlags {
    values: HashMap<String, FlagValue>,
}

impl StaticFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bool(mut self, flag: &str, value: bool) -> Self {
        self.values.insert(flag.to_string(), FlagValue::Bool(value));
        self
    }

    pub fn with_int(mut self, flag: &str, value: i64) -> Self {
        self.values.insert(flag.to_string(), FlagValue::Int(value));
        self
    }
}

#[async_trait]
impl FlagProvider for StaticFlags {
    async fn evaluate_bool(&self, flag: &str, default: bool) -> bool {
        match self.values.get(flag) {
            Some(FlagValue::Bool(value)) => *value,
            _ => default,
        }
    }

    async fn evaluate_int(&self, flag: &str, default: i64) -> i64 {
        match self.values.get(flag) {
            Some(FlagValue::Int(value)) => *value,
            _ => default,
        }
    }
}
