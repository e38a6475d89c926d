//! SEC EDGAR: company list, filing index and XBRL company facts

use super::{trim_base, HttpJson};
use crate::error::AgentError;
use crate::Result;
use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::debug;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub enum FormType {
    /// Annual report.
    #[serde(rename = "10-K")]
    TenK,
    /// Quarterly report.
    #[serde(rename = "10-Q")]
    TenQ,
}

impl FormType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormType::TenK => "10-K",
            FormType::TenQ => "10-Q",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StatementType {
    Cashflow,
    BalanceSheet,
    Income,
}

impl StatementType {
    fn concepts(&self) -> &'static [&'static str] {
        match self {
            StatementType::Income => &[
                "Revenues",
                "RevenueFromContractWithCustomerExcludingAssessedTax",
                "CostOfRevenue",
                "CostOfGoodsAndServicesSold",
                "GrossProfit",
                "ResearchAndDevelopmentExpense",
                "SellingGeneralAndAdministrativeExpense",
                "OperatingExpenses",
                "OperatingIncomeLoss",
                "InterestExpense",
                "IncomeTaxExpenseBenefit",
                "NetIncomeLoss",
                "EarningsPerShareBasic",
                "EarningsPerShareDiluted",
            ],
            StatementType::BalanceSheet => &[
                "CashAndCashEquivalentsAtCarryingValue",
                "AccountsReceivableNetCurrent",
                "InventoryNet",
                "AssetsCurrent",
                "PropertyPlantAndEquipmentNet",
                "Goodwill",
                "Assets",
                "AccountsPayableCurrent",
                "LiabilitiesCurrent",
                "LongTermDebtCurrent",
                "LongTermDebtNoncurrent",
                "Liabilities",
                "StockholdersEquity",
                "LiabilitiesAndStockholdersEquity",
            ],
            StatementType::Cashflow => &[
                "NetCashProvidedByUsedInOperatingActivities",
                "DepreciationDepletionAndAmortization",
                "ShareBasedCompensation",
                "PaymentsToAcquirePropertyPlantAndEquipment",
                "NetCashProvidedByUsedInInvestingActivities",
                "ProceedsFromIssuanceOfLongTermDebt",
                "RepaymentsOfLongTermDebt",
                "PaymentsOfDividends",
                "PaymentsForRepurchaseOfCommonStock",
                "NetCashProvidedByUsedInFinancingActivities",
            ],
        }
    }

    fn is_instant(&self) -> bool {
        matches!(self, StatementType::BalanceSheet)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompanyTicker {
    pub cik: u64,
    pub ticker: String,
    pub title: String,
}

impl CompanyTicker {
    pub fn formatted_cik(&self) -> String {
        format_cik(self.cik)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FilingSummary {
    pub form: String,
    pub filing_date: String,
    pub report_date: String,
    pub accession_number: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LineItem {
    pub concept: String,
    pub label: String,
    pub unit: String,
    /// Period end date → reported value.
    pub values: BTreeMap<String, f64>,
}

/// Line items × reporting periods, newest period first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatementTable {
    pub ticker: String,
    pub form_type: FormType,
    pub statement_type: StatementType,
    pub periods: Vec<String>,
    pub line_items: Vec<LineItem>,
}

pub struct SecClient {
    http: HttpJson,
    data_base_url: String,
    www_base_url: String,
    tickers: OnceCell<Vec<CompanyTicker>>,
}

impl SecClient {
    pub fn new(
        data_base_url: &str,
        www_base_url: &str,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            http: HttpJson::new("SEC EDGAR", timeout, Some(user_agent))?,
            data_base_url: trim_base(data_base_url),
            www_base_url: trim_base(www_base_url),
            tickers: OnceCell::new(),
        })
    }

    /// Full ticker list, fetched once per client.
    pub async fn company_tickers(&self) -> Result<&[CompanyTicker]> {
        let tickers = self
            .tickers
            .get_or_try_init(|| async {
                let body = self
                    .http
                    .get_json(&format!("{}/files/company_tickers.json", self.www_base_url), &[])
                    .await?;
                let parsed = parse_company_tickers(&body);
                debug!(count = parsed.len(), "Loaded SEC company tickers");
                Ok::<_, AgentError>(parsed)
            })
            .await?;
        Ok(tickers.as_slice())
    }

    pub async fn lookup_ticker(&self, ticker: &str) -> Result<CompanyTicker> {
        self.company_tickers()
            .await?
            .iter()
            .find(|c| c.ticker.eq_ignore_ascii_case(ticker.trim()))
            .cloned()
            .ok_or_else(|| AgentError::Adapter(format!("Ticker {} is not listed with the SEC", ticker)))
    }

    /// Companies whose ticker or name matches, one entry per CIK.
    pub async fn search_companies(&self, name: &str) -> Result<Vec<CompanyTicker>> {
        Ok(match_companies(self.company_tickers().await?, name))
    }

    pub async fn latest_filings(
        &self,
        ticker: &str,
        form_type: Option<&str>,
        n: usize,
    ) -> Result<Vec<FilingSummary>> {
        let company = self.lookup_ticker(ticker).await?;
        let body = self
            .http
            .get_json(
                &format!("{}/submissions/{}.json", self.data_base_url, company.formatted_cik()),
                &[],
            )
            .await?;

        parse_recent_filings(&body, company.cik, &self.www_base_url, form_type, n)
    }

    pub async fn financial_statement(
        &self,
        ticker: &str,
        form_type: FormType,
        statement_type: StatementType,
        n: usize,
    ) -> Result<StatementTable> {
        let mut tables = self
            .financial_statements(ticker, form_type, &[statement_type], n)
            .await?;
        tables.pop().ok_or_else(|| {
            AgentError::Adapter(format!("No statement built for {}", ticker))
        })
    }

    /// Several statements built from a single company-facts download.
    pub async fn financial_statements(
        &self,
        ticker: &str,
        form_type: FormType,
        statement_types: &[StatementType],
        n: usize,
    ) -> Result<Vec<StatementTable>> {
        let company = self.lookup_ticker(ticker).await?;
        let body = self
            .http
            .get_json(
                &format!(
                    "{}/api/xbrl/companyfacts/{}.json",
                    self.data_base_url,
                    company.formatted_cik()
                ),
                &[],
            )
            .await?;

        statement_types
            .iter()
            .map(|statement_type| {
                let table = build_statement(&body, &company.ticker, form_type, *statement_type, n);
                if table.line_items.is_empty() {
                    return Err(AgentError::Adapter(format!(
                        "No {} {} data reported for {}",
                        form_type.as_str(),
                        statement_name(*statement_type),
                        company.ticker
                    )));
                }
                Ok(table)
            })
            .collect()
    }
}

pub fn format_cik(cik: u64) -> String {
    format!("CIK{:010}", cik)
}

fn statement_name(statement_type: StatementType) -> &'static str {
    match statement_type {
        StatementType::Cashflow => "cash flow statement",
        StatementType::BalanceSheet => "balance sheet",
        StatementType::Income => "income statement",
    }
}

fn parse_company_tickers(body: &Value) -> Vec<CompanyTicker> {
    let Some(entries) = body.as_object() else {
        return Vec::new();
    };

    let mut tickers: Vec<(usize, CompanyTicker)> = entries
        .iter()
        .filter_map(|(idx, entry)| {
            Some((
                idx.parse().unwrap_or(usize::MAX),
                CompanyTicker {
                    cik: entry.get("cik_str")?.as_u64()?,
                    ticker: entry.get("ticker")?.as_str()?.to_string(),
                    title: entry.get("title")?.as_str()?.to_string(),
                },
            ))
        })
        .collect();

    // The file is keyed "0", "1", ... in market-cap order
    tickers.sort_by_key(|(idx, _)| *idx);
    tickers.into_iter().map(|(_, t)| t).collect()
}

fn normalize_name(name: &str) -> String {
    const SUFFIXES: [&str; 8] = ["inc", "incorporated", "corp", "corporation", "co", "ltd", "plc", "company"];

    name.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty() && !SUFFIXES.contains(w))
        .collect::<Vec<_>>()
        .join(" ")
}

fn match_companies(tickers: &[CompanyTicker], name: &str) -> Vec<CompanyTicker> {
    let query = name.trim();
    if let Some(exact) = tickers.iter().find(|c| c.ticker.eq_ignore_ascii_case(query)) {
        return vec![exact.clone()];
    }

    let wanted = normalize_name(query);
    if wanted.is_empty() {
        return Vec::new();
    }

    let mut seen = HashSet::new();
    let mut matches: Vec<CompanyTicker> = tickers
        .iter()
        .filter(|c| normalize_name(&c.title).contains(&wanted))
        .filter(|c| seen.insert(c.cik))
        .cloned()
        .collect();

    if let Some(pos) = matches.iter().position(|c| normalize_name(&c.title) == wanted) {
        return vec![matches.swap_remove(pos)];
    }
    matches
}

fn parse_recent_filings(
    body: &Value,
    cik: u64,
    www_base_url: &str,
    form_type: Option<&str>,
    n: usize,
) -> Result<Vec<FilingSummary>> {
    let recent = body
        .pointer("/filings/recent")
        .ok_or_else(|| AgentError::Adapter("SEC submissions response has no recent filings".to_string()))?;

    let column = |name: &str| -> Vec<String> {
        recent
            .get(name)
            .and_then(Value::as_array)
            .map(|a| a.iter().map(|v| v.as_str().unwrap_or_default().to_string()).collect())
            .unwrap_or_default()
    };

    let forms = column("form");
    let filing_dates = column("filingDate");
    let report_dates = column("reportDate");
    let accessions = column("accessionNumber");
    let documents = column("primaryDocument");

    let filings = forms
        .iter()
        .enumerate()
        .filter(|(_, form)| form_type.map_or(true, |wanted| form.eq_ignore_ascii_case(wanted)))
        .take(n)
        .map(|(i, form)| {
            let accession = accessions.get(i).cloned().unwrap_or_default();
            let document = documents.get(i).cloned().unwrap_or_default();
            FilingSummary {
                form: form.clone(),
                filing_date: filing_dates.get(i).cloned().unwrap_or_default(),
                report_date: report_dates.get(i).cloned().unwrap_or_default(),
                url: format!(
                    "{}/Archives/edgar/data/{}/{}/{}",
                    www_base_url,
                    cik,
                    accession.replace('-', ""),
                    document
                ),
                accession_number: accession,
            }
        })
        .collect();

    Ok(filings)
}

fn duration_days(fact: &Value) -> Option<i64> {
    let start = NaiveDate::parse_from_str(fact.get("start")?.as_str()?, "%Y-%m-%d").ok()?;
    let end = NaiveDate::parse_from_str(fact.get("end")?.as_str()?, "%Y-%m-%d").ok()?;
    Some((end - start).num_days())
}

fn fact_in_scope(fact: &Value, form_type: FormType, statement_type: StatementType) -> bool {
    let form = fact.get("form").and_then(Value::as_str).unwrap_or_default();
    if form != form_type.as_str() {
        return false;
    }
    if statement_type.is_instant() {
        return fact.get("start").is_none();
    }

    let Some(days) = duration_days(fact) else {
        return false;
    };
    match (form_type, statement_type) {
        (FormType::TenK, _) => days >= 300,
        // Quarterly income is reported per quarter, cash flow year-to-date
        (FormType::TenQ, StatementType::Income) => days <= 100,
        (FormType::TenQ, _) => days < 300,
    }
}

fn build_statement(
    body: &Value,
    ticker: &str,
    form_type: FormType,
    statement_type: StatementType,
    n: usize,
) -> StatementTable {
    let facts = body.pointer("/facts/us-gaap");
    let mut collected: Vec<(String, String, String, BTreeMap<String, (String, f64)>)> = Vec::new();

    for concept in statement_type.concepts() {
        let Some(entry) = facts.and_then(|f| f.get(*concept)) else {
            continue;
        };
        let label = entry
            .get("label")
            .and_then(Value::as_str)
            .unwrap_or(*concept)
            .to_string();
        let Some((unit, points)) = entry
            .get("units")
            .and_then(Value::as_object)
            .and_then(|units| units.iter().next())
        else {
            continue;
        };

        // period end -> (filed date, value); later filings win
        let mut by_end: BTreeMap<String, (String, f64)> = BTreeMap::new();
        for fact in points.as_array().into_iter().flatten() {
            if !fact_in_scope(fact, form_type, statement_type) {
                continue;
            }
            let (Some(end), Some(val)) = (
                fact.get("end").and_then(Value::as_str),
                fact.get("val").and_then(Value::as_f64),
            ) else {
                continue;
            };
            let filed = fact.get("filed").and_then(Value::as_str).unwrap_or_default().to_string();
            match by_end.get(end) {
                Some((prev, _)) if *prev >= filed => {}
                _ => {
                    by_end.insert(end.to_string(), (filed, val));
                }
            }
        }

        if !by_end.is_empty() {
            collected.push((concept.to_string(), label, unit.clone(), by_end));
        }
    }

    let mut periods: Vec<String> = collected
        .iter()
        .flat_map(|(_, _, _, by_end)| by_end.keys().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .rev()
        .take(n.max(1))
        .collect();
    periods.sort_by(|a, b| b.cmp(a));

    let line_items = collected
        .into_iter()
        .filter_map(|(concept, label, unit, by_end)| {
            let values: BTreeMap<String, f64> = periods
                .iter()
                .filter_map(|p| by_end.get(p).map(|(_, v)| (p.clone(), *v)))
                .collect();
            (!values.is_empty()).then_some(LineItem {
                concept,
                label,
                unit,
                values,
            })
        })
        .collect();

    StatementTable {
        ticker: ticker.to_uppercase(),
        form_type,
        statement_type,
        periods,
        line_items,
    }
}
