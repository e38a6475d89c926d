//! Blueprint Classifier
//!
//! Detects which analysis blueprint a request asks for:
//! - Peer Comparison: "compare Micron with its peers"
//! - Debt Profiling: "what does Broadcom's debt maturity ladder look like?"
//! - Financing Need: "does the client need to raise capital next year?"
//!
//! Anything else runs in chatbot mode.

use crate::models::{BlueprintName, SessionMode};

/// Static keyword lists, zero allocation
const PEER_COMPARISON_KEYWORDS: &[&str] = &[
    "peer", "competitor", "compare", "comparison", "versus", " vs ", "vs.", "benchmark",
];

const DEBT_PROFILING_KEYWORDS: &[&str] = &[
    "debt", "leverage", "borrowing", "maturity", "maturities", "credit", "covenant", "refinanc",
];

const FINANCING_NEED_KEYWORDS: &[&str] = &[
    "financing", "funding", "raise capital", "capital raise", "liquidity need", "cash need",
    "capital need",
];

/// Keyword that triggers the end-of-turn peer memory update.
const PEER_KEYWORD: &str = "peer";

pub struct BlueprintClassifier;

impl BlueprintClassifier {
    /// Best-scoring blueprint, or `None` for a plain question.
    pub fn detect(text: &str) -> Option<BlueprintName> {
        let text = format!(" {} ", text.to_lowercase());

        let candidates = [
            (BlueprintName::PeerComparison, PEER_COMPARISON_KEYWORDS),
            (BlueprintName::DebtProfiling, DEBT_PROFILING_KEYWORDS),
            (BlueprintName::FinancingNeed, FINANCING_NEED_KEYWORDS),
        ];

        let mut best: Option<(BlueprintName, usize)> = None;
        for (blueprint, keywords) in candidates {
            let score = keywords.iter().filter(|kw| text.contains(**kw)).count();
            if score > 0 && best.map_or(true, |(_, top)| score > top) {
                best = Some((blueprint, score));
            }
        }

        best.map(|(blueprint, _)| blueprint)
    }

    pub fn mode_for(blueprint: Option<BlueprintName>) -> SessionMode {
        match blueprint {
            Some(_) => SessionMode::Blueprint,
            None => SessionMode::Chatbot,
        }
    }
}

pub fn mentions_peer(text: &str) -> bool {
    text.to_lowercase().contains(PEER_KEYWORD)
}
