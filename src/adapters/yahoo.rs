//! Yahoo Finance ticker search

use super::{trim_base, HttpJson};
use crate::models::TickerMatch;
use crate::Result;
use serde_json::Value;
use std::time::Duration;

const QUOTES_COUNT: usize = 5;

pub struct YahooSearchClient {
    http: HttpJson,
    base_url: String,
}

impl YahooSearchClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: HttpJson::new("Yahoo search", timeout, None)?,
            base_url: trim_base(base_url),
        })
    }

    /// Equity and fund matches for a company name, best first.
    pub async fn search(&self, company_name: &str) -> Result<Vec<TickerMatch>> {
        let body = self
            .http
            .get_json(
                &format!("{}/v1/finance/search", self.base_url),
                &[
                    ("q", company_name.to_string()),
                    ("quotes_count", QUOTES_COUNT.to_string()),
                    ("country", "United States".to_string()),
                ],
            )
            .await?;

        Ok(parse_quotes(&body))
    }
}

fn parse_quotes(body: &Value) -> Vec<TickerMatch> {
    body.get("quotes")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|quote| {
            let symbol = quote.get("symbol")?.as_str()?;
            let name = quote
                .get("shortname")
                .or_else(|| quote.get("longname"))
                .and_then(Value::as_str)
                .unwrap_or(symbol);
            Some(TickerMatch {
                name: name.to_string(),
                symbol: symbol.to_string(),
            })
        })
        .take(QUOTES_COUNT)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    #[test]
    fn test_parse_quotes_skips_entries_without_symbol() {
        let body = json!({"quotes": [
            {"shortname": "Micron Technology, Inc.", "symbol": "MU"},
            {"longname": "Micron Solutions Inc", "symbol": "MICR"},
            {"shortname": "news item"}
        ]});
        let matches = parse_quotes(&body);
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[1].name, "Micron Solutions Inc");
    }

    #[tokio::test]
    async fn test_search_sends_query() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/finance/search")
            .match_query(Matcher::UrlEncoded("q".into(), "Apple".into()))
            .with_status(200)
            .with_body(json!({"quotes": [{"shortname": "Apple Inc.", "symbol": "AAPL"}]}).to_string())
            .create_async()
            .await;

        let client = YahooSearchClient::new(&server.url(), Duration::from_secs(5)).unwrap();
        let matches = client.search("Apple").await.unwrap();

        mock.assert_async().await;
        assert_eq!(
            matches,
            vec![TickerMatch { name: "Apple Inc.".into(), symbol: "AAPL".into() }]
        );
    }
}
