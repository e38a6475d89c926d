//! End-of-turn peer list update
//!
//! When the analyst talks about peers, the companies resolved during the turn
//! are merged into the client's stored record so later conversations can
//! reuse them.

use crate::memory::store::{MemoryStore, Namespace};
use crate::models::{ClientRecord, MessageBody, PeerInfo, ToolResultStatus};
use crate::state::ConversationState;
use crate::Result;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, info};

lazy_static! {
    static ref CIK_PATTERN: Regex = Regex::new(r"CIK\d{10}").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerUpdate {
    Saved { cik: String, peers_added: usize },
    Skipped(String),
}

/// Merge this turn's peers into the client record.
pub async fn update_peer_memory(
    state: &ConversationState,
    store: &dyn MemoryStore,
) -> Result<PeerUpdate> {
    let Some(cik) = find_client_cik(state) else {
        info!(thread_id = %state.thread_id, "Peer update skipped: no client CIK in conversation");
        return Ok(PeerUpdate::Skipped("no client CIK in conversation".to_string()));
    };

    let namespace = Namespace::clients();
    let Some(item) = store.get(&namespace, &cik).await? else {
        info!(thread_id = %state.thread_id, cik = %cik, "Peer update skipped: client not saved");
        return Ok(PeerUpdate::Skipped(format!("no client record for {}", cik)));
    };

    let mut record: ClientRecord = match serde_json::from_value(item.value) {
        Ok(record) => record,
        Err(e) => {
            info!(cik = %cik, "Peer update skipped: stored client record unreadable: {}", e);
            return Ok(PeerUpdate::Skipped(format!("unreadable client record for {}", cik)));
        }
    };

    let candidates = collect_turn_peers(state);
    let mut peers = record.peers.take().unwrap_or_default();
    let mut added = 0;

    for peer in candidates {
        let own = record
            .tickers
            .iter()
            .any(|t| t.eq_ignore_ascii_case(&peer.ticker));
        let known = peers
            .iter()
            .any(|p| p.ticker.eq_ignore_ascii_case(&peer.ticker));
        if own || known {
            continue;
        }
        peers.push(peer);
        added += 1;
    }

    record.peers = Some(peers);
    store
        .put(&namespace, &cik, serde_json::to_value(&record)?)
        .await?;

    info!(thread_id = %state.thread_id, cik = %cik, peers_added = added, "Client peers updated");
    Ok(PeerUpdate::Saved {
        cik,
        peers_added: added,
    })
}

/// Latest CIK mentioned by the user or returned by a CIK lookup.
fn find_client_cik(state: &ConversationState) -> Option<String> {
    state.messages().iter().rev().find_map(|message| match &message.body {
        MessageBody::User { content } => CIK_PATTERN.find(content).map(|m| m.as_str().to_string()),
        MessageBody::Tool {
            name,
            status: ToolResultStatus::Success | ToolResultStatus::Human,
            content,
            ..
        } if name == "get_cik" => content
            .get("cik")
            .and_then(Value::as_str)
            .filter(|cik| CIK_PATTERN.is_match(cik))
            .map(str::to_string),
        _ => None,
    })
}

fn collect_turn_peers(state: &ConversationState) -> Vec<PeerInfo> {
    let mut peers = Vec::new();

    for message in state.current_turn() {
        match &message.body {
            MessageBody::Tool {
                name,
                status: ToolResultStatus::Success | ToolResultStatus::Human,
                content,
                ..
            } if name == "get_ticker_given_name" => {
                let symbol = content.get("symbol").and_then(Value::as_str);
                let company = content.get("name").and_then(Value::as_str);
                if let (Some(symbol), Some(company)) = (symbol, company) {
                    peers.push(PeerInfo {
                        name: company.to_string(),
                        ticker: symbol.to_uppercase(),
                    });
                }
            }
            MessageBody::Assistant { tool_calls, .. } => {
                for call in tool_calls.iter().filter(|c| c.name == "run_peer_comparison") {
                    let tickers = call
                        .arguments
                        .get("tickers")
                        .and_then(Value::as_array)
                        .into_iter()
                        .flatten()
                        .filter_map(Value::as_str);
                    for ticker in tickers {
                        peers.push(PeerInfo {
                            name: ticker.to_uppercase(),
                            ticker: ticker.to_uppercase(),
                        });
                    }
                }
            }
            _ => {}
        }
    }

    debug!(count = peers.len(), "Collected peer candidates");
    peers
}
