// Публичный API для мессенджера
// Вызовы отправки/получения поверх crypto-agility движка

pub mod messaging;

pub use messaging::{KeyDirectory, MessageSink, SecureMessenger};
