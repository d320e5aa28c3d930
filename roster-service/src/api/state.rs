use std::sync::Arc;

use crate::domain::service::SolveService;

/// Shared application state for the axum router.
pub struct AppState {
    pub solve_service: Arc<SolveService>,
}
