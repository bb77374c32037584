use std::sync::Arc;

use sqlx::Pool;

#[derive(Clone)]
pub struct AppState {
    state: Arc<AppStateInner>,
}

impl AppState {
    pub fn new(config: AppConfig, pool: Pool<sqlx::Sqlite>) -> Self {
        AppState {
            state: Arc::new(AppStateInner { config, pool }),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.state.config
    }

    pub fn pool(&self) -> &Pool<sqlx::Sqlite> {
        &self.state.pool
    }
}

// empty garde context, required by the validating extractors
impl axum::extract::FromRef<AppState> for () {
    fn from_ref(_state: &AppState) {}
}

struct AppStateInner {
    pool: Pool<sqlx::Sqlite>,
    config: AppConfig,
}

pub struct AppConfig {
    pub default_page_size: u32,
}
