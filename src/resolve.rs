//! Lookups used by field resolvers.
//!
//! Each helper goes through the loaders installed in the [`RequestContext`]. When none are
//! installed the helper still answers: relationship lookups fall back to a direct, unbatched store
//! call, and directory lookups to a placeholder entry.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use crate::{
    batch_function::BatchFunction,
    context::{loaders_from, RequestContext},
    error::{Error, Result},
    model::{Case, CaseId, DirectoryEntry, Risk, RiskId},
    store::{CasesByRisk, RiskStore, RisksByCase},
};

/// Cases linked to `risk_id`.
pub async fn cases_for_risk(ctx: &RequestContext, risk_id: RiskId) -> Result<Vec<Case>> {
    let cases = match loaders_from(ctx) {
        Ok(loaders) => loaders.cases_by_risk.load(risk_id).await?,
        Err(err) => {
            tracing::debug!(%err, risk_id, "fetching cases directly");
            fetch_direct::<_, _, CasesByRisk>(ctx, &[risk_id]).await?.remove(&risk_id)
        }
    };
    Ok(cases.unwrap_or_default())
}

/// Cases linked to each of `risk_ids`. Risks without cases map to an empty list.
pub async fn cases_for_risks(
    ctx: &RequestContext,
    risk_ids: Vec<RiskId>,
) -> Result<HashMap<RiskId, Vec<Case>>> {
    let mut found = match loaders_from(ctx) {
        Ok(loaders) => loaders.cases_by_risk.load_many(risk_ids.clone()).await?,
        Err(err) => {
            tracing::debug!(%err, ?risk_ids, "fetching cases directly");
            let mut unique = risk_ids.clone();
            unique.sort();
            unique.dedup();
            if unique.is_empty() {
                return Ok(HashMap::new());
            }
            fetch_direct::<_, _, CasesByRisk>(ctx, &unique).await?
        }
    };
    for id in risk_ids {
        found.entry(id).or_default();
    }
    Ok(found)
}

/// Risks linked to `case_id`.
pub async fn risks_for_case(ctx: &RequestContext, case_id: CaseId) -> Result<Vec<Risk>> {
    let risks = match loaders_from(ctx) {
        Ok(loaders) => loaders.risks_by_case.load(case_id).await?,
        Err(err) => {
            tracing::debug!(%err, case_id, "fetching risks directly");
            fetch_direct::<_, _, RisksByCase>(ctx, &[case_id]).await?.remove(&case_id)
        }
    };
    Ok(risks.unwrap_or_default())
}

/// Directory entry for `user_id`.
pub async fn directory_user(ctx: &RequestContext, user_id: &str) -> Result<DirectoryEntry> {
    match loaders_from(ctx).ok().and_then(|l| l.directory()) {
        Some(directory) => directory.get(user_id).await,
        None => Ok(DirectoryEntry::placeholder(user_id)),
    }
}

/// Directory entries for `user_ids`, in the order given.
pub async fn directory_users(
    ctx: &RequestContext,
    user_ids: &[String],
) -> Result<Vec<DirectoryEntry>> {
    match loaders_from(ctx).ok().and_then(|l| l.directory()) {
        Some(directory) => directory.get_many(user_ids).await,
        None => Ok(user_ids.iter().map(DirectoryEntry::placeholder).collect()),
    }
}

async fn fetch_direct<K, V, F>(ctx: &RequestContext, keys: &[K]) -> Result<HashMap<K, V>>
where
    K: Eq + Hash + Sync,
    F: BatchFunction<K, V, Context = Arc<dyn RiskStore>>,
{
    tokio::select! {
        biased;
        loaded = F::load(keys, ctx.store()) => loaded.map_err(Error::batch_fetch),
        _ = ctx.cancellation().cancelled() => Err(Error::Cancelled),
    }
}
