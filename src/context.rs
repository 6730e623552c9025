use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::{
    error::{Error, Result},
    registry::LoaderRegistry,
    store::RiskStore,
};

/// Per-request state handed to every resolver.
///
/// Cloning is cheap; all clones refer to the same loaders and cancellation token.
#[derive(Clone)]
pub struct RequestContext {
    store: Arc<dyn RiskStore>,
    cancel: CancellationToken,
    loaders: Option<Arc<LoaderRegistry>>,
}

impl RequestContext {
    /// A context without loaders. Resolvers fall back to direct store calls until
    /// [`with_loaders`] installs a registry.
    pub fn new(store: Arc<dyn RiskStore>, cancel: CancellationToken) -> Self {
        Self { store, cancel, loaders: None }
    }

    pub fn store(&self) -> &Arc<dyn RiskStore> {
        &self.store
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }
}

/// Returns `ctx` with `loaders` installed, replacing any previously installed registry.
pub fn with_loaders(ctx: RequestContext, loaders: Arc<LoaderRegistry>) -> RequestContext {
    RequestContext { loaders: Some(loaders), ..ctx }
}

/// The registry installed in `ctx`.
pub fn loaders_from(ctx: &RequestContext) -> Result<&LoaderRegistry> {
    ctx.loaders.as_deref().ok_or(Error::LoaderNotInstalled)
}
