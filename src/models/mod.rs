use serde::{Deserialize, Serialize};

pub mod product;
pub mod target;

// Re-exports for convenience
pub use product::*;
pub use target::*;

/// Identifier the messaging provider assigns to a sent message.
pub type MessageId = i64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    HtmlSelector,
    EncryptedApi,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::HtmlSelector => write!(f, "html_selector"),
            SourceKind::EncryptedApi => write!(f, "encrypted_api"),
        }
    }
}

/// Which observation fields form a product's identity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IdentityKey {
    NameUrl,
    NameSite,
}
