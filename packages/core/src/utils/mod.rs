// Вспомогательные модули

pub mod b64;
pub mod logging;
pub mod serialization;
pub mod time;
