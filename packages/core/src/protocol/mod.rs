// Протокол обмена: формат конвертов и экспорт публичных ключей

pub mod messages;
pub mod wire;

pub use messages::{MessageKind, OutgoingEnvelope, PublicKeyExport};
