use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::IdentityKey;

/// One availability reading produced by a source strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub name: String,
    pub url: String,
    pub is_sold_out: bool,
}

impl Observation {
    pub fn new(name: impl Into<String>, url: impl Into<String>, is_sold_out: bool) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            is_sold_out,
        }
    }

    pub fn identity(&self, key: IdentityKey, site_name: &str) -> String {
        match key {
            IdentityKey::NameUrl => format!("{}_{}", self.name, self.url),
            IdentityKey::NameSite => format!("{}_{}", self.name, site_name),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductRecord {
    pub identity: String,
    pub name: String,
    pub url: String,
    pub site_name: String,
    pub is_sold_out: bool,
    #[serde(default)]
    pub sustained_in_stock_count: u32,
    pub updated_at: DateTime<Utc>,
}

impl ProductRecord {
    pub fn is_in_stock(&self) -> bool {
        !self.is_sold_out
    }
}
