// Логирование

use std::sync::Once;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Установить fmt-подписчик tracing (уровень из RUST_LOG, по умолчанию info).
/// Повторные вызовы ничего не делают.
pub fn init_logging() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        // Хост-приложение могло уже установить свой подписчик
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init();
    });
}
