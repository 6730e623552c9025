use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    batch_function::BatchFunction,
    error::BoxError,
    model::{Case, CaseId, Risk, RiskId},
};

/// Bulk reads offered by the document store.
///
/// Each call either succeeds for every requested id or fails as a whole. Ids without related
/// entities may be missing from the returned map.
#[async_trait]
pub trait RiskStore: Send + Sync {
    async fn list_cases_by_risk_ids(
        &self,
        risk_ids: &[RiskId],
    ) -> Result<HashMap<RiskId, Vec<Case>>, BoxError>;

    async fn list_risks_by_case_ids(
        &self,
        case_ids: &[CaseId],
    ) -> Result<HashMap<CaseId, Vec<Risk>>, BoxError>;
}

/// Cases linked to each requested risk.
pub struct CasesByRisk;

#[async_trait]
impl BatchFunction<RiskId, Vec<Case>> for CasesByRisk {
    type Context = Arc<dyn RiskStore>;
    type Error = BoxError;

    async fn load(
        keys: &[RiskId],
        context: &Self::Context,
    ) -> Result<HashMap<RiskId, Vec<Case>>, BoxError> {
        context.list_cases_by_risk_ids(keys).await
    }
}

/// Risks linked to each requested case.
pub struct RisksByCase;

#[async_trait]
impl BatchFunction<CaseId, Vec<Risk>> for RisksByCase {
    type Context = Arc<dyn RiskStore>;
    type Error = BoxError;

    async fn load(
        keys: &[CaseId],
        context: &Self::Context,
    ) -> Result<HashMap<CaseId, Vec<Risk>>, BoxError> {
        context.list_risks_by_case_ids(keys).await
    }
}
