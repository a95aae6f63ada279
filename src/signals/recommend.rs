use crate::signals::RiskContext;

pub const AVOID: &str = "HIGH RISK: This address is sanctioned. Avoid all transactions.";
pub const EXTREME_CAUTION: &str =
    "HIGH RISK: Address linked to privacy mixers. Exercise extreme caution.";
pub const DIRECT_HISTORY: &str = "MEDIUM RISK: Address has direct transaction history with sanctioned entities. Proceed with caution and enhanced due diligence.";
pub const EXCHANGE: &str =
    "MEDIUM RISK: Exchange address detected. Verify legitimacy before transacting.";
pub const INDIRECT: &str =
    "LOW RISK: Address has indirect connections to sanctioned entities. Monitor closely.";
pub const BASELINE: &str =
    "LOW RISK: No significant risk factors identified. Standard due diligence recommended.";

/// Pick the advice text; first matching branch wins.
pub fn recommendation(score: u8, ctx: &RiskContext) -> &'static str {
    if score >= 3 && ctx.is_self_sanctioned() {
        AVOID
    } else if score >= 3 && ctx.is_self_mixer() {
        EXTREME_CAUTION
    } else if score >= 2 && ctx.flagged_at(1) > 0 {
        DIRECT_HISTORY
    } else if score >= 2 {
        EXCHANGE
    } else if score >= 1 && ctx.flagged_at(2) > 0 {
        INDIRECT
    } else {
        BASELINE
    }
}
