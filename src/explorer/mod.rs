use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::core::{Connection, TxRecord};
use crate::error::FetchError;
use crate::tags::{self, TagStore};

/// Source of "who has this address transacted with".
#[async_trait]
pub trait CounterpartyProvider: Send + Sync {
    /// Addresses seen as sender or receiver alongside `address`. May include `address` itself
    /// and duplicates; the explorer normalizes.
    async fn counterparties(&self, address: &str) -> Result<Vec<String>, FetchError>;
}

/// Distinct lowercase counterparties in first-seen order, excluding `address` itself.
pub fn distinct_counterparties<I, S>(address: &str, candidates: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let own = address.to_lowercase();
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for candidate in candidates {
        let addr = candidate.as_ref().trim().to_lowercase();
        if addr.is_empty() || addr == own {
            continue;
        }
        if seen.insert(addr.clone()) {
            out.push(addr);
        }
    }
    out
}

/// Counterparties of `address` within an already-fetched transaction list.
pub fn counterparties_from_txs(address: &str, txs: &[TxRecord]) -> Vec<String> {
    distinct_counterparties(
        address,
        txs.iter().flat_map(|tx| [tx.from.as_str(), tx.to.as_str()]),
    )
}

#[derive(Debug, Clone)]
pub struct ExploreOptions {
    pub max_hops: u8,
    /// Sleep before each expansion fetch beyond the first hop.
    pub hop_delay: Duration,
}

impl Default for ExploreOptions {
    fn default() -> Self {
        Self {
            max_hops: 2,
            hop_delay: Duration::from_millis(200),
        }
    }
}

/// Bounded breadth-first search from a target to flagged addresses.
///
/// Holds only borrowed, read-only collaborators; every `explore` call carries its own
/// visited set, so one explorer can serve concurrent requests.
pub struct ConnectionExplorer<'a, P: CounterpartyProvider + ?Sized> {
    tags: &'a TagStore,
    provider: &'a P,
    options: &'a ExploreOptions,
}

impl<'a, P: CounterpartyProvider + ?Sized> ConnectionExplorer<'a, P> {
    pub fn new(tags: &'a TagStore, provider: &'a P, options: &'a ExploreOptions) -> Self {
        Self {
            tags,
            provider,
            options,
        }
    }

    /// Walk outward from `target` up to `max_hops`, returning hits in level order:
    /// the target itself (hops 0) if flagged, then every hop-1 hit, then hop-2, and so on.
    ///
    /// `prefetched` supplies the target's transactions so the first hop needs no fetch.
    /// Fetch failures never abort the walk; the affected branch is skipped.
    pub async fn explore(&self, target: &str, prefetched: Option<&[TxRecord]>) -> Vec<Connection> {
        let target = target.to_lowercase();
        let mut connections = Vec::new();

        let root = vec![target.clone()];
        self.check(&root, &mut connections);

        if self.options.max_hops == 0 {
            return connections;
        }

        let first_hop = match prefetched {
            Some(txs) => {
                debug!("Using {} pre-fetched transactions for {target}", txs.len());
                counterparties_from_txs(&target, txs)
            }
            None => match self.provider.counterparties(&target).await {
                Ok(list) => distinct_counterparties(&target, list),
                Err(e) => {
                    warn!("Failed to fetch counterparties for {target}: {e}");
                    Vec::new()
                }
            },
        };
        debug!("Found {} first-hop addresses for {target}", first_hop.len());

        let mut visited: HashSet<String> = HashSet::from([target.clone()]);
        let mut frontier: Vec<Vec<String>> = first_hop
            .into_iter()
            .map(|addr| vec![target.clone(), addr])
            .collect();
        let mut hops: u8 = 1;

        loop {
            for path in &frontier {
                self.check(path, &mut connections);
            }
            if hops >= self.options.max_hops || frontier.is_empty() {
                break;
            }

            let mut next = Vec::new();
            for path in &frontier {
                let Some(addr) = path.last() else { continue };
                if !visited.insert(addr.clone()) {
                    continue;
                }

                if !self.options.hop_delay.is_zero() {
                    tokio::time::sleep(self.options.hop_delay).await;
                }

                let neighbours = match self.provider.counterparties(addr).await {
                    Ok(list) => distinct_counterparties(addr, list),
                    Err(e) => {
                        warn!("Failed to expand hop-{} address {addr}: {e}", hops + 1);
                        continue;
                    }
                };
                debug!("Checking {} hop-{} addresses from {addr}", neighbours.len(), hops + 1);

                for neighbour in neighbours {
                    if path.contains(&neighbour) {
                        continue;
                    }
                    let mut extended = path.clone();
                    extended.push(neighbour);
                    next.push(extended);
                }
            }

            frontier = next;
            hops += 1;
        }

        info!("Connection analysis for {target} complete: {} flagged connections", connections.len());
        connections
    }

    /// Record a connection if the endpoint of `path` is flagged.
    fn check(&self, path: &[String], connections: &mut Vec<Connection>) {
        let Some(endpoint) = path.last() else { return };
        let endpoint_tags = self.tags.tags_for(endpoint);
        let Some(sanction_type) = tags::sanction_type(endpoint_tags) else {
            return;
        };

        let hops = (path.len() - 1) as u8;
        let tag_list = endpoint_tags.join(", ");
        let label = match hops {
            0 => format!("Self ({tag_list})"),
            1 => format!("Direct connection ({tag_list})"),
            _ => format!("{hops}-hop connection via {} ({tag_list})", path[path.len() - 2]),
        };
        debug!("Flagged hop-{hops} connection: {}", path.join(" → "));

        connections.push(Connection {
            address: endpoint.clone(),
            label,
            hops,
            path: path.to_vec(),
            sanction_type: Some(sanction_type),
        });
    }
}
