use std::sync::Arc;

use tracing::info;

use crate::core::address;
use crate::core::{RiskAnalysisResult, TxRecord};
use crate::error::AddressError;
use crate::explorer::{ConnectionExplorer, CounterpartyProvider, ExploreOptions};
use crate::signals::RiskScorer;
use crate::tags::TagStore;

/// Address → risk result. Shares only immutable state, so one instance serves concurrent calls.
pub struct Analyzer {
    tags: Arc<TagStore>,
    provider: Arc<dyn CounterpartyProvider>,
    options: ExploreOptions,
    scorer: RiskScorer,
}

impl Analyzer {
    pub fn new(tags: Arc<TagStore>, provider: Arc<dyn CounterpartyProvider>, options: ExploreOptions) -> Self {
        Self {
            tags,
            provider,
            options,
            scorer: RiskScorer::new(),
        }
    }

    pub fn tags(&self) -> &TagStore {
        &self.tags
    }

    /// Run the full analysis for one address.
    ///
    /// Only a malformed address is an error. Data-source failures degrade silently: with no
    /// tags and no reachable counterparties the result is "Low" with an "Unknown Address" factor.
    pub async fn analyze(
        &self,
        address: &str,
        prefetched: Option<&[TxRecord]>,
    ) -> Result<RiskAnalysisResult, AddressError> {
        let target = address::normalize(address)?;
        let self_tags = self.tags.tags_for(&target);

        let explorer = ConnectionExplorer::new(&self.tags, self.provider.as_ref(), &self.options);
        let connections = explorer.explore(&target, prefetched).await;

        let result = self.scorer.score(&target, self_tags, connections);
        info!(
            "Risk analysis for {target}: score={} level={} connections={}",
            result.risk_score,
            result.risk_level,
            result.connections.len()
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{FactorStatus, RiskLevel};
    use crate::explorer::tests::{A, B, FakeProvider, T, tx};
    use crate::signals::recommend;
    use std::time::Duration;

    fn analyzer(store: TagStore, provider: FakeProvider) -> Analyzer {
        Analyzer::new(
            Arc::new(store),
            Arc::new(provider),
            ExploreOptions {
                max_hops: 2,
                hop_delay: Duration::ZERO,
            },
        )
    }

    #[tokio::test]
    async fn direct_sanctioned_counterparty_end_to_end() {
        let mut store = TagStore::empty();
        store.insert(B, ["sanctioned", "ofac"]);
        let analyzer = analyzer(store, FakeProvider::default().with(T, &[B]));

        let result = analyzer.analyze(T, None).await.unwrap();

        assert_eq!(result.address, T);
        assert_eq!(result.risk_score, 2);
        assert_eq!(result.risk_level, RiskLevel::Medium);
        assert_eq!(result.connections.len(), 1);
        let conn = &result.connections[0];
        assert_eq!(conn.address, B);
        assert_eq!(conn.hops, 1);
        assert_eq!(conn.path, vec![T.to_string(), B.to_string()]);
        assert_eq!(conn.sanction_type.as_deref(), Some("sanctioned, ofac"));
        assert_eq!(result.recommendation, recommend::DIRECT_HISTORY);
    }

    #[tokio::test]
    async fn self_sanctioned_is_very_high_regardless_of_history() {
        let mut store = TagStore::empty();
        store.insert(T, ["sanctioned"]);
        let analyzer = analyzer(store, FakeProvider::default().with(A, &[B]));
        let history = vec![tx(T, A), tx(A, T)];

        let result = analyzer.analyze(&T.to_uppercase().replace("0X", "0x"), Some(history.as_slice())).await.unwrap();

        assert_eq!(result.risk_score, 3);
        assert_eq!(result.risk_level, RiskLevel::VeryHigh);
        assert!(result.connections.iter().any(|c| c.hops == 0 && c.path == vec![T.to_string()]));
        assert_eq!(result.risk_factors[0].factor, "Sanctioned Address");
        assert_eq!(result.recommendation, recommend::AVOID);
    }

    #[tokio::test]
    async fn unknown_address_with_failing_source_fails_open() {
        let analyzer = analyzer(TagStore::empty(), FakeProvider::default().failing_on(T));

        let result = analyzer.analyze(T, None).await.unwrap();

        assert_eq!(result.risk_score, 1);
        assert_eq!(result.risk_level, RiskLevel::Low);
        assert!(result.connections.is_empty());
        assert_eq!(result.risk_factors.len(), 1);
        assert_eq!(result.risk_factors[0].factor, "Unknown Address");
        assert_eq!(result.risk_factors[0].status, FactorStatus::Neutral);
    }

    #[tokio::test]
    async fn invalid_address_is_rejected() {
        let analyzer = analyzer(TagStore::empty(), FakeProvider::default());
        assert!(analyzer.analyze("not-an-address", None).await.is_err());
    }

    #[tokio::test]
    async fn concurrent_requests_do_not_share_visited_state() {
        let mut store = TagStore::empty();
        store.insert(B, ["ofac"]);
        let provider = FakeProvider::default()
            .with(T, &[A])
            .with(A, &[B])
            .with(B, &[A]);
        let analyzer = Arc::new(analyzer(store, provider));

        let (first, second) = tokio::join!(analyzer.analyze(T, None), analyzer.analyze(T, None));
        let (first, second) = (first.unwrap(), second.unwrap());

        assert_eq!(first, second);
        assert_eq!(first.connections.len(), 1);
        assert_eq!(first.connections[0].hops, 2);
    }
}
