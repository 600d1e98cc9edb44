use axum::extract::FromRef;
use limbo_storage::FileStore;
use std::ops::Deref;
use std::sync::Arc;

#[derive(Debug)]
pub struct AppStateInner {
    pub store: FileStore,
    /// Prefix of download links in listings.
    pub url_base: String,
}

/// Shared request state, cheap to clone into every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

impl AppState {
    #[must_use]
    pub fn new(store: FileStore, url_base: impl Into<String>) -> Self {
        Self { inner: Arc::new(AppStateInner { store, url_base: url_base.into() }) }
    }
}

impl Deref for AppState {
    type Target = AppStateInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl FromRef<AppState> for FileStore {
    fn from_ref(state: &AppState) -> Self {
        state.inner.store.clone()
    }
}
