use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::{
    config::LoaderConfig,
    context::{with_loaders, RequestContext},
    directory::DirectoryCache,
    loader::Loader,
    model::{Case, CaseId, Risk, RiskId},
    store::{CasesByRisk, RiskStore, RisksByCase},
};

/// The loaders of one request, plus the shared directory cache.
///
/// Built fresh for every inbound request and dropped with it, so the request caches never leak
/// data between requests. The directory cache is the one instance owned by the
/// [`LoaderFactory`].
pub struct LoaderRegistry {
    pub cases_by_risk: Loader<RiskId, Vec<Case>, CasesByRisk>,
    pub risks_by_case: Loader<CaseId, Vec<Risk>, RisksByCase>,
    directory: Option<Arc<DirectoryCache>>,
}

impl LoaderRegistry {
    pub fn new(
        store: Arc<dyn RiskStore>,
        directory: Option<Arc<DirectoryCache>>,
        config: &LoaderConfig,
        cancel: CancellationToken,
    ) -> Self {
        let context = Arc::new(store);
        Self {
            cases_by_risk: Loader::with_config(
                Arc::clone(&context),
                config.clone(),
                cancel.clone(),
            ),
            risks_by_case: Loader::with_config(context, config.clone(), cancel),
            directory,
        }
    }

    /// The shared directory cache, if a directory service is configured.
    pub fn directory(&self) -> Option<&Arc<DirectoryCache>> {
        self.directory.as_ref()
    }
}

/// Application-scoped owner of everything a request's loaders need.
///
/// Created once at startup. [`LoaderFactory::request_context`] is called once per inbound request
/// before execution starts.
pub struct LoaderFactory {
    store: Arc<dyn RiskStore>,
    directory: Option<Arc<DirectoryCache>>,
    config: LoaderConfig,
}

impl LoaderFactory {
    pub fn new(
        store: Arc<dyn RiskStore>,
        directory: Option<DirectoryCache>,
        config: LoaderConfig,
    ) -> Self {
        Self { store, directory: directory.map(Arc::new), config }
    }

    pub fn directory(&self) -> Option<&Arc<DirectoryCache>> {
        self.directory.as_ref()
    }

    /// Builds a fresh set of loaders sharing this factory's directory cache.
    pub fn registry(&self, cancel: CancellationToken) -> LoaderRegistry {
        LoaderRegistry::new(Arc::clone(&self.store), self.directory.clone(), &self.config, cancel)
    }

    /// Builds the context for one request with a fresh [`LoaderRegistry`] installed.
    pub fn request_context(&self, cancel: CancellationToken) -> RequestContext {
        let registry = Arc::new(self.registry(cancel.clone()));
        with_loaders(RequestContext::new(Arc::clone(&self.store), cancel), registry)
    }
}
