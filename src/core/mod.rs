pub mod address;
pub mod analyzer;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A transaction as seen by the analysis: only the parties matter for graph expansion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxRecord {
    pub hash: String,
    pub from: String,
    /// Empty for contract creations.
    pub to: String,
    /// Value in wei, decimal string.
    pub value: String,
    pub timestamp: DateTime<Utc>,
}

/// A discovered path from the target to a flagged address.
///
/// `path.len() == hops + 1`, `path[0]` is the target and the last element is `address`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub address: String,
    pub label: String,
    pub hops: u8,
    pub path: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sanction_type: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactorStatus {
    Positive,
    Negative,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskFactor {
    pub factor: String,
    pub status: FactorStatus,
    pub description: String,
}

impl RiskFactor {
    pub fn new(factor: &str, status: FactorStatus, description: impl Into<String>) -> Self {
        Self {
            factor: factor.to_string(),
            status,
            description: description.into(),
        }
    }
}

/// Risk bucket. There is deliberately no "High" tier: 3 is Very High, 2 is Medium, the rest Low.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    #[serde(rename = "Very High")]
    VeryHigh,
    Medium,
    Low,
}

impl RiskLevel {
    pub fn from_score(score: u8) -> Self {
        if score >= 3 {
            RiskLevel::VeryHigh
        } else if score == 2 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::VeryHigh => "Very High",
            RiskLevel::Medium => "Medium",
            RiskLevel::Low => "Low",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAnalysisResult {
    pub address: String,
    pub risk_score: u8, // 0-3
    pub risk_level: RiskLevel,
    pub connections: Vec<Connection>,
    pub risk_factors: Vec<RiskFactor>,
    pub recommendation: String,
}
