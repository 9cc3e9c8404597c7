//! Runtime configuration read from the environment.
//!
//! The CLI loads `.env` before anything here runs; CLI flags override
//! whatever is found here.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

pub const ENV_SALES_ORDERS: &str = "LTCHECK_SALES_ORDERS";
pub const ENV_PURCHASE_ORDERS: &str = "LTCHECK_PURCHASE_ORDERS";
pub const ENV_SHIPPING_SCHEDULE: &str = "LTCHECK_SHIPPING_SCHEDULE";
pub const ENV_ITEM_ALIASES: &str = "LTCHECK_ITEM_ALIASES";
pub const ENV_ON_HAND: &str = "LTCHECK_ON_HAND";
pub const ENV_PORT: &str = "LTCHECK_PORT";

const DEFAULT_PORT: u16 = 3000;

/// Locations of the feed exports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcePaths {
    pub sales_orders: PathBuf,
    pub purchase_orders: PathBuf,
    pub shipping_schedule: PathBuf,
    pub item_aliases: PathBuf,
    /// On-hand report; without it every baseline is 0
    pub on_hand: Option<PathBuf>,
}

impl Default for SourcePaths {
    fn default() -> Self {
        Self {
            sales_orders: PathBuf::from("open sales orders.csv"),
            purchase_orders: PathBuf::from("open purchase orders.csv"),
            shipping_schedule: PathBuf::from("Sales Date return platform.csv"),
            item_aliases: PathBuf::from("item name replace.csv"),
            on_hand: None,
        }
    }
}

impl SourcePaths {
    /// Read paths from the environment, falling back to the defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            sales_orders: env_path(ENV_SALES_ORDERS).unwrap_or(defaults.sales_orders),
            purchase_orders: env_path(ENV_PURCHASE_ORDERS).unwrap_or(defaults.purchase_orders),
            shipping_schedule: env_path(ENV_SHIPPING_SCHEDULE)
                .unwrap_or(defaults.shipping_schedule),
            item_aliases: env_path(ENV_ITEM_ALIASES).unwrap_or(defaults.item_aliases),
            on_hand: env_path(ENV_ON_HAND),
        }
    }

    /// Directory-relative variant: every default file name under `dir`
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let defaults = Self::default();
        Self {
            sales_orders: dir.join(defaults.sales_orders),
            purchase_orders: dir.join(defaults.purchase_orders),
            shipping_schedule: dir.join(defaults.shipping_schedule),
            item_aliases: dir.join(defaults.item_aliases),
            on_hand: None,
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub port: u16,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let port = env::var(ENV_PORT)
            .ok()
            .and_then(|p| p.trim().parse().ok())
            .unwrap_or(DEFAULT_PORT);
        Self { port }
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}
