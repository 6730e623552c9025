use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future;
use riskload::resolve::{cases_for_risk, directory_user};
use riskload::{
    BoxError, CancellationToken, Case, CaseId, DirectoryCache, DirectoryConfig, DirectoryEntry,
    DirectorySource, LoaderConfig, LoaderFactory, Risk, RiskId, RiskStore,
};

// Trivial store backed by a fixed list of (risk, case) links.
struct FixedStore {
    links: Vec<(RiskId, CaseId)>,
}

#[async_trait]
impl RiskStore for FixedStore {
    async fn list_cases_by_risk_ids(
        &self,
        risk_ids: &[RiskId],
    ) -> Result<HashMap<RiskId, Vec<Case>>, BoxError> {
        println!("store: cases for risks {risk_ids:?}");
        let mut found: HashMap<RiskId, Vec<Case>> = HashMap::new();
        for (risk_id, case_id) in self.links.iter().filter(|(r, _)| risk_ids.contains(r)) {
            found
                .entry(*risk_id)
                .or_default()
                .push(Case { id: *case_id, title: format!("case {case_id}") });
        }
        Ok(found)
    }

    async fn list_risks_by_case_ids(
        &self,
        case_ids: &[CaseId],
    ) -> Result<HashMap<CaseId, Vec<Risk>>, BoxError> {
        println!("store: risks for cases {case_ids:?}");
        let mut found: HashMap<CaseId, Vec<Risk>> = HashMap::new();
        for (risk_id, case_id) in self.links.iter().filter(|(_, c)| case_ids.contains(c)) {
            found
                .entry(*case_id)
                .or_default()
                .push(Risk { id: *risk_id, title: format!("risk {risk_id}") });
        }
        Ok(found)
    }
}

struct FixedDirectory;

#[async_trait]
impl DirectorySource for FixedDirectory {
    async fn list_users(&self) -> Result<Vec<DirectoryEntry>, BoxError> {
        println!("directory: listing users");
        Ok(vec![DirectoryEntry {
            id: "U042".to_owned(),
            display_name: "jdoe".to_owned(),
            real_name: "Jane Doe".to_owned(),
            avatar_url: None,
        }])
    }
}

#[tokio::main]
async fn main() {
    let store = Arc::new(FixedStore { links: vec![(1, 100), (1, 101), (2, 200)] });
    let directory = DirectoryCache::new(Arc::new(FixedDirectory), DirectoryConfig::default());
    let factory = LoaderFactory::new(store, Some(directory), LoaderConfig::default());

    for request in 0..2 {
        println!("request {request}");
        let ctx = factory.request_context(CancellationToken::new());

        // Sibling resolvers: one store call for risks 1, 2 and 3.
        let (one, two, three) = future::join3(
            cases_for_risk(&ctx, 1),
            cases_for_risk(&ctx, 2),
            cases_for_risk(&ctx, 3),
        )
        .await;
        assert_eq!(one.unwrap().len(), 2);
        assert_eq!(two.unwrap().len(), 1);
        assert!(three.unwrap().is_empty());

        // Served from the request cache.
        assert_eq!(cases_for_risk(&ctx, 1).await.unwrap().len(), 2);

        // Listed once for both requests.
        assert_eq!(directory_user(&ctx, "U042").await.unwrap().real_name, "Jane Doe");
        assert!(directory_user(&ctx, "U999").await.unwrap().is_placeholder());
    }
}
