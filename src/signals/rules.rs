use crate::core::{FactorStatus, RiskFactor};
use crate::signals::RiskContext;
use crate::tags::DEFI_MARKERS;

/// A check that contributes at most one human-readable risk factor.
pub trait FactorRule {
    fn name(&self) -> &str;
    fn evaluate(&self, ctx: &RiskContext) -> Option<RiskFactor>;
}

/// All factor rules, in the order their factors are reported.
pub fn default_rules() -> Vec<Box<dyn FactorRule + Send + Sync>> {
    vec![
        Box::new(SanctionedRule),
        Box::new(MixerRule),
        Box::new(DirectConnectionRule),
        Box::new(IndirectConnectionRule),
        Box::new(ExchangeRule),
        Box::new(DefiRule),
    ]
}

// --- Individual Rules ---

struct SanctionedRule;
impl FactorRule for SanctionedRule {
    fn name(&self) -> &str { "sanctioned" }
    fn evaluate(&self, ctx: &RiskContext) -> Option<RiskFactor> {
        ctx.is_self_sanctioned().then(|| {
            RiskFactor::new(
                "Sanctioned Address",
                FactorStatus::Negative,
                "Address is on OFAC sanctions list",
            )
        })
    }
}

struct MixerRule;
impl FactorRule for MixerRule {
    fn name(&self) -> &str { "mixer" }
    fn evaluate(&self, ctx: &RiskContext) -> Option<RiskFactor> {
        ctx.is_self_mixer().then(|| {
            RiskFactor::new(
                "Privacy Mixer",
                FactorStatus::Negative,
                "Associated with privacy mixing services",
            )
        })
    }
}

struct DirectConnectionRule;
impl FactorRule for DirectConnectionRule {
    fn name(&self) -> &str { "direct_connection" }
    fn evaluate(&self, ctx: &RiskContext) -> Option<RiskFactor> {
        let count = ctx.flagged_at(1);
        (count > 0).then(|| {
            RiskFactor::new(
                "Direct Sanctioned Connection",
                FactorStatus::Negative,
                format!("Transacted directly with {count} sanctioned or flagged address(es)"),
            )
        })
    }
}

struct IndirectConnectionRule;
impl FactorRule for IndirectConnectionRule {
    fn name(&self) -> &str { "indirect_connection" }
    fn evaluate(&self, ctx: &RiskContext) -> Option<RiskFactor> {
        let count = ctx.flagged_at(2);
        (count > 0).then(|| {
            RiskFactor::new(
                "Indirect Sanctioned Connection",
                FactorStatus::Negative,
                format!("Connected to {count} sanctioned or flagged address(es) through an intermediary"),
            )
        })
    }
}

/// Only the `exchange` tag; `hot_wallet` raises the score but is not reported as an exchange.
struct ExchangeRule;
impl FactorRule for ExchangeRule {
    fn name(&self) -> &str { "exchange" }
    fn evaluate(&self, ctx: &RiskContext) -> Option<RiskFactor> {
        ctx.self_has(&["exchange"]).then(|| {
            RiskFactor::new(
                "Exchange Address",
                FactorStatus::Neutral,
                "Centralized exchange wallet address",
            )
        })
    }
}

struct DefiRule;
impl FactorRule for DefiRule {
    fn name(&self) -> &str { "defi" }
    fn evaluate(&self, ctx: &RiskContext) -> Option<RiskFactor> {
        ctx.self_has(DEFI_MARKERS).then(|| {
            RiskFactor::new(
                "DeFi Protocol",
                FactorStatus::Positive,
                "Legitimate decentralized finance protocol",
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Connection;

    fn conn(hops: u8, sanction_type: Option<&str>) -> Connection {
        let path: Vec<String> = (0..=hops).map(|i| format!("0x{i:040x}")).collect();
        Connection {
            address: path.last().unwrap().clone(),
            label: String::new(),
            hops,
            path,
            sanction_type: sanction_type.map(str::to_string),
        }
    }

    fn evaluate_all(ctx: &RiskContext) -> Vec<String> {
        default_rules()
            .iter()
            .filter_map(|r| r.evaluate(ctx))
            .map(|f| f.factor)
            .collect()
    }

    #[test]
    fn rule_names_are_unique() {
        let rules = default_rules();
        let mut names: Vec<&str> = rules.iter().map(|r| r.name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), rules.len());
    }

    #[test]
    fn connection_counts_in_descriptions() {
        let connections = vec![conn(1, Some("ofac")), conn(1, Some("mixer")), conn(2, Some("mixer"))];
        let ctx = RiskContext::new(&[], &connections);
        let factors: Vec<RiskFactor> = default_rules().iter().filter_map(|r| r.evaluate(&ctx)).collect();
        assert_eq!(factors.len(), 2);
        assert_eq!(factors[0].factor, "Direct Sanctioned Connection");
        assert!(factors[0].description.contains("with 2 "));
        assert_eq!(factors[1].factor, "Indirect Sanctioned Connection");
        assert!(factors[1].description.contains("to 1 "));
    }

    #[test]
    fn connections_without_sanction_type_are_ignored() {
        let connections = vec![conn(1, None), conn(2, None)];
        let ctx = RiskContext::new(&[], &connections);
        assert!(evaluate_all(&ctx).is_empty());
    }

    #[test]
    fn tornado_counts_as_mixer_not_sanctioned() {
        let tags = vec!["tornado_cash".to_string()];
        let ctx = RiskContext::new(&tags, &[]);
        assert_eq!(evaluate_all(&ctx), vec!["Privacy Mixer"]);
    }
}
