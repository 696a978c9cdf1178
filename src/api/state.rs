//! API shared state

use std::sync::Arc;

use crate::query::QueryService;

/// Shared state passed to all API handlers
#[derive(Clone)]
pub struct ApiState {
    /// Read-only access to the record store
    pub query: Arc<QueryService>,
}

impl ApiState {
    pub fn new(query: QueryService) -> Self {
        Self {
            query: Arc::new(query),
        }
    }
}
