pub mod cipher;
pub mod encrypted_api;
pub mod html;

pub use cipher::{AesCbcDecryptor, MissingKeyDecryptor, PayloadDecryptor, decryptor_from_config};
pub use encrypted_api::EncryptedApiStrategy;
pub use html::HtmlSelectorStrategy;
