use std::sync::Arc;

use sqlx::PgPool;

use crate::config::JwtConfig;
use crate::engine::classifier::ModelHandle;
use crate::engine::suggestion::SuggestionOrchestrator;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub classifier: Arc<ModelHandle>,
    pub suggestions: Arc<SuggestionOrchestrator>,
    pub jwt: Arc<JwtConfig>,
}
