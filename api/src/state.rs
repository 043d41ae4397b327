use std::sync::Arc;

use crate::auth::TokenVerifier;
use crate::store::DispatchStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DispatchStore>,
    pub tokens: TokenVerifier,
}
