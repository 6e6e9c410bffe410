pub mod notifier;
pub mod source;

pub use notifier::{IncomingCommand, Notifier};
pub use source::SourceStrategy;
