pub mod recommend;
pub mod rules;
pub mod score;

use crate::core::{Connection, FactorStatus, RiskAnalysisResult, RiskFactor, RiskLevel};
use crate::tags::{self, MIXER_MARKERS, SANCTION_MARKERS};
use rules::FactorRule;

/// Everything the scorer looks at for one address.
#[derive(Debug, Clone, Copy)]
pub struct RiskContext<'a> {
    pub self_tags: &'a [String],
    pub connections: &'a [Connection],
}

impl<'a> RiskContext<'a> {
    pub fn new(self_tags: &'a [String], connections: &'a [Connection]) -> Self {
        Self {
            self_tags,
            connections,
        }
    }

    pub fn self_has(&self, markers: &[&str]) -> bool {
        tags::has_any(self.self_tags, markers)
    }

    pub fn is_self_sanctioned(&self) -> bool {
        self.self_has(SANCTION_MARKERS)
    }

    pub fn is_self_mixer(&self) -> bool {
        self.self_has(MIXER_MARKERS)
    }

    /// Connections at exactly `hops` that carry a sanction type.
    pub fn flagged_at(&self, hops: u8) -> usize {
        self.connections
            .iter()
            .filter(|c| c.hops == hops && c.sanction_type.is_some())
            .count()
    }

    pub fn min_hops(&self) -> Option<u8> {
        self.connections.iter().map(|c| c.hops).min()
    }
}

/// Reduces self-tags and discovered connections to a score, level, factors and advice.
pub struct RiskScorer {
    rules: Vec<Box<dyn FactorRule + Send + Sync>>,
}

impl Default for RiskScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl RiskScorer {
    pub fn new() -> Self {
        Self {
            rules: rules::default_rules(),
        }
    }

    pub fn score(&self, address: &str, self_tags: &[String], connections: Vec<Connection>) -> RiskAnalysisResult {
        let ctx = RiskContext::new(self_tags, &connections);

        let risk_score = score::compute_score(&ctx);
        let risk_level = RiskLevel::from_score(risk_score);

        let mut risk_factors: Vec<RiskFactor> = self
            .rules
            .iter()
            .filter_map(|rule| {
                let factor = rule.evaluate(&ctx)?;
                tracing::trace!("Factor rule {} fired for {address}", rule.name());
                Some(factor)
            })
            .collect();
        if risk_factors.is_empty() {
            risk_factors.push(RiskFactor::new(
                "Unknown Address",
                FactorStatus::Neutral,
                "No specific categorization available",
            ));
        }

        let recommendation = recommend::recommendation(risk_score, &ctx).to_string();

        tracing::debug!(
            "Scored {address}: score={risk_score} level={risk_level} factors={}",
            risk_factors.len()
        );

        RiskAnalysisResult {
            address: address.to_string(),
            risk_score,
            risk_level,
            connections,
            risk_factors,
            recommendation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const B: &str = "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

    fn tags(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn factor_names(result: &RiskAnalysisResult) -> Vec<&str> {
        result.risk_factors.iter().map(|f| f.factor.as_str()).collect()
    }

    #[test]
    fn unknown_address_is_low_not_zero() {
        let result = RiskScorer::new().score(T, &[], vec![]);
        assert_eq!(result.risk_score, 1);
        assert_eq!(result.risk_level, RiskLevel::Low);
        assert_eq!(factor_names(&result), vec!["Unknown Address"]);
        assert_eq!(result.risk_factors[0].status, FactorStatus::Neutral);
        assert_eq!(result.recommendation, recommend::BASELINE);
    }

    #[test]
    fn direct_sanctioned_counterparty() {
        let conn = Connection {
            address: B.into(),
            label: "Direct connection (sanctioned, ofac)".into(),
            hops: 1,
            path: vec![T.into(), B.into()],
            sanction_type: Some("sanctioned, ofac".into()),
        };
        let result = RiskScorer::new().score(T, &[], vec![conn.clone()]);
        assert_eq!(result.risk_score, 2);
        assert_eq!(result.risk_level, RiskLevel::Medium);
        assert_eq!(result.connections, vec![conn]);
        assert_eq!(factor_names(&result), vec!["Direct Sanctioned Connection"]);
        assert!(result.risk_factors[0].description.contains('1'));
        assert_eq!(result.recommendation, recommend::DIRECT_HISTORY);
    }

    #[test]
    fn factor_order_follows_generation_order() {
        let self_tags = tags(&["sanctioned", "mixer", "exchange", "defi"]);
        let result = RiskScorer::new().score(T, &self_tags, vec![]);
        assert_eq!(
            factor_names(&result),
            vec!["Sanctioned Address", "Privacy Mixer", "Exchange Address", "DeFi Protocol"]
        );
        assert_eq!(result.risk_score, 3);
        assert_eq!(result.recommendation, recommend::AVOID);
    }

    #[test]
    fn hot_wallet_only_scores_medium_with_unknown_factor() {
        let result = RiskScorer::new().score(T, &tags(&["hot_wallet"]), vec![]);
        assert_eq!(result.risk_score, 2);
        assert_eq!(factor_names(&result), vec!["Unknown Address"]);
        assert_eq!(result.recommendation, recommend::EXCHANGE);
    }

    #[test]
    fn defi_is_low_and_positive() {
        let result = RiskScorer::new().score(T, &tags(&["defi"]), vec![]);
        assert_eq!(result.risk_score, 1);
        assert_eq!(result.risk_level, RiskLevel::Low);
        assert_eq!(result.risk_factors[0].status, FactorStatus::Positive);
        assert_eq!(result.recommendation, recommend::BASELINE);
    }
}
