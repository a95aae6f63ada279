use crate::signals::RiskContext;
use crate::tags::EXCHANGE_MARKERS;

/// Compute the 0-3 risk score. First matching signal wins; signals never add up.
pub fn compute_score(ctx: &RiskContext) -> u8 {
    if ctx.is_self_sanctioned() || ctx.is_self_mixer() {
        return 3;
    }

    if let Some(min_hops) = ctx.min_hops() {
        // 1-hop and 2-hop land in the same bucket.
        return match min_hops {
            0 => 3,
            _ => 2,
        };
    }

    if ctx.self_has(EXCHANGE_MARKERS) {
        return 2;
    }
    // DeFi and untagged addresses share the floor; nothing is ever scored risk-free.
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Connection;

    fn tags(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn conn(hops: u8) -> Connection {
        let path: Vec<String> = (0..=hops).map(|i| format!("0x{i:040x}")).collect();
        Connection {
            address: path.last().unwrap().clone(),
            label: String::new(),
            hops,
            path,
            sanction_type: Some("ofac".into()),
        }
    }

    fn score(self_tags: &[&str], connections: &[Connection]) -> u8 {
        let t = tags(self_tags);
        compute_score(&RiskContext::new(&t, connections))
    }

    #[test]
    fn empty_is_low() {
        assert_eq!(score(&[], &[]), 1);
    }

    #[test]
    fn self_flags_dominate() {
        assert_eq!(score(&["sanctioned"], &[]), 3);
        assert_eq!(score(&["ofac"], &[conn(2)]), 3);
        assert_eq!(score(&["tornado_cash"], &[]), 3);
        assert_eq!(score(&["mixer", "defi"], &[]), 3);
    }

    #[test]
    fn nearest_connection_decides() {
        assert_eq!(score(&[], &[conn(0)]), 3);
        assert_eq!(score(&[], &[conn(1)]), 2);
        assert_eq!(score(&[], &[conn(2)]), 2);
        assert_eq!(score(&[], &[conn(2), conn(1)]), 2);
        assert_eq!(score(&[], &[conn(3)]), 2);
    }

    #[test]
    fn connections_outrank_categories() {
        assert_eq!(score(&["defi"], &[conn(2)]), 2);
    }

    #[test]
    fn category_tags() {
        assert_eq!(score(&["exchange"], &[]), 2);
        assert_eq!(score(&["hot_wallet"], &[]), 2);
        assert_eq!(score(&["defi"], &[]), 1);
        assert_eq!(score(&["exchange", "defi"], &[]), 2);
        assert_eq!(score(&["whale"], &[]), 1);
    }
}
