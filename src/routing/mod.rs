//! Static intent-to-source routing.
//!
//! The routing table maps each intent to the source kinds worth querying
//! and a per-source result budget `k`. Default weights are hardcoded and
//! can be overridden from configuration. Unclassified queries fan out to
//! every configured source with a reduced `k` to bound total latency;
//! emergencies never reach the router.

use serde::{Deserialize, Serialize};

use crate::classify::Intent;
use crate::types::SourceKind;

/// One routed source with its result-count budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub kind: SourceKind,
    pub k: usize,
}

impl Route {
    pub fn new(kind: SourceKind, k: usize) -> Self {
        Self { kind, k }
    }
}

/// Intent → routes table, one block per intent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingTable {
    #[serde(default = "defaults::general_information")]
    pub general_information: Vec<Route>,
    #[serde(default = "defaults::drug_interaction")]
    pub drug_interaction: Vec<Route>,
    #[serde(default = "defaults::trial_search")]
    pub trial_search: Vec<Route>,
    #[serde(default = "defaults::unclassified")]
    pub unclassified: Vec<Route>,
}

mod defaults {
    use super::*;

    pub fn general_information() -> Vec<Route> {
        vec![
            Route::new(SourceKind::PassageIndex, 5),
            Route::new(SourceKind::ConsumerSummary, 3),
        ]
    }

    pub fn drug_interaction() -> Vec<Route> {
        vec![Route::new(SourceKind::DrugRecord, 5)]
    }

    pub fn trial_search() -> Vec<Route> {
        vec![
            Route::new(SourceKind::TrialRecord, 5),
            Route::new(SourceKind::PassageIndex, 3),
        ]
    }

    pub fn unclassified() -> Vec<Route> {
        SourceKind::ALL.iter().map(|&kind| Route::new(kind, 2)).collect()
    }
}

impl Default for RoutingTable {
    fn default() -> Self {
        Self {
            general_information: defaults::general_information(),
            drug_interaction: defaults::drug_interaction(),
            trial_search: defaults::trial_search(),
            unclassified: defaults::unclassified(),
        }
    }
}

impl RoutingTable {
    pub fn routes_for(&self, intent: Intent) -> &[Route] {
        match intent {
            Intent::GeneralInformation => &self.general_information,
            Intent::DrugInteraction => &self.drug_interaction,
            Intent::TrialSearch => &self.trial_search,
            Intent::Unclassified => &self.unclassified,
            // Emergencies short-circuit before routing; an empty set keeps
            // the contract explicit if one ever arrives here.
            Intent::Emergency => &[],
        }
    }
}

/// Maps classified intent to the set of sources to query
pub struct SourceRouter {
    table: RoutingTable,
}

impl SourceRouter {
    pub fn new() -> Self {
        Self::with_table(RoutingTable::default())
    }

    pub fn with_table(table: RoutingTable) -> Self {
        Self { table }
    }

    /// Routes for `intent`, intersected with the query's declared source
    /// filter when present. May return an empty set.
    pub fn route(&self, intent: Intent, filter: Option<&[SourceKind]>) -> Vec<Route> {
        let routes = self.table.routes_for(intent);
        match filter {
            Some(allowed) => routes
                .iter()
                .filter(|route| allowed.contains(&route.kind))
                .copied()
                .collect(),
            None => routes.to_vec(),
        }
    }
}

impl Default for SourceRouter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drug_interaction_routes_only_to_drug_records() {
        let router = SourceRouter::new();
        let routes = router.route(Intent::DrugInteraction, None);
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].kind, SourceKind::DrugRecord);
        assert_eq!(routes[0].k, 5);
    }

    #[test]
    fn test_unclassified_queries_all_sources_with_reduced_k() {
        let router = SourceRouter::new();
        let routes = router.route(Intent::Unclassified, None);
        assert_eq!(routes.len(), SourceKind::ALL.len());
        assert!(routes.iter().all(|r| r.k == 2));
    }

    #[test]
    fn test_general_information_routes() {
        let router = SourceRouter::new();
        let kinds: Vec<SourceKind> = router
            .route(Intent::GeneralInformation, None)
            .iter()
            .map(|r| r.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![SourceKind::PassageIndex, SourceKind::ConsumerSummary]
        );
    }

    #[test]
    fn test_source_filter_intersects() {
        let router = SourceRouter::new();
        let routes = router.route(
            Intent::GeneralInformation,
            Some(&[SourceKind::ConsumerSummary]),
        );
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].kind, SourceKind::ConsumerSummary);

        let routes = router.route(Intent::DrugInteraction, Some(&[SourceKind::TrialRecord]));
        assert!(routes.is_empty());
    }

    #[test]
    fn test_emergency_routes_nowhere() {
        let router = SourceRouter::new();
        assert!(router.route(Intent::Emergency, None).is_empty());
    }

    #[test]
    fn test_table_override() {
        let table = RoutingTable {
            drug_interaction: vec![Route::new(SourceKind::DrugRecord, 10)],
            ..Default::default()
        };
        let router = SourceRouter::with_table(table);
        assert_eq!(router.route(Intent::DrugInteraction, None)[0].k, 10);
    }
}
