//! Queue length instrumentation configuration
//!
//! `routes` maps a message type to the addresses that receive it. The static
//! destination resolver uses this table to fan a published message out into
//! one stamped send per subscriber.

use serde::Deserialize;
use std::collections::BTreeMap;

/// Queue length configuration
///
/// # Example
///
/// ```toml
/// [queue_length]
/// enabled = true
///
/// [queue_length.routes]
/// "Sales.OrderPlaced" = ["Billing", "Shipping"]
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueueLengthConfig {
    /// Install the intercept/stamp/restore stages
    /// Default: true
    pub enabled: bool,

    /// Message type -> subscriber addresses
    pub routes: BTreeMap<String, Vec<String>>,
}

impl Default for QueueLengthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            routes: BTreeMap::new(),
        }
    }
}
