// 📒 Transaction Ledger - The cleaned, matched row set for one upload
// Source of truth for all downstream aggregation
//
// Invariant: every Transaction in the ledger is Matched. Unmatched,
// ambiguous, and malformed rows are kept aside (unmodified) for the audit
// reporter, never mixed into the ledger. The ledger is fully materialized
// before any metric computation starts.

use crate::catalog::{CatalogIndex, ProductRecord};
use crate::matcher::{MatchResult, Matcher};
use crate::normalizer::{KeyKind, NormalizedKey, Normalizer};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Row kind that marks an actual sale (other kinds are skipped, not audited).
pub const SALE_KIND: &str = "Venda";

// ============================================================================
// RAW ROW
// ============================================================================

/// One spreadsheet line, untyped and untrusted.
///
/// Quantity and value stay as raw text here; coercion happens while the
/// ledger is built so a bad cell rejects one row instead of one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRow {
    pub sector: String,
    pub reseller_name: String,
    pub reseller_code: String,
    pub cycle: String,
    pub product_code: String,
    pub product_name: String,
    pub brand: String,
    pub kind: String,
    pub quantity: String,
    pub value: String,
}

impl RawRow {
    pub fn is_sale(&self) -> bool {
        self.kind.trim() == SALE_KIND
    }
}

// ============================================================================
// CUSTOMER KEY
// ============================================================================

/// Stable customer identity: (reseller code, sector).
///
/// When the code cell is blank the reseller name stands in, so customers
/// without registered codes still aggregate consistently.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CustomerKey {
    pub reseller: String,
    pub sector: String,
}

impl CustomerKey {
    pub fn from_row(row: &RawRow) -> CustomerKey {
        let code = row.reseller_code.trim();
        let reseller = if code.is_empty() {
            row.reseller_name.trim().to_string()
        } else {
            code.to_string()
        };

        CustomerKey {
            reseller,
            sector: row.sector.trim().to_string(),
        }
    }
}

impl std::fmt::Display for CustomerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.reseller, self.sector)
    }
}

// ============================================================================
// TRANSACTION
// ============================================================================

/// A matched, typed sale row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub customer: CustomerKey,
    pub reseller_name: String,
    pub cycle: String,
    pub sector: String,

    /// Normalized SKU key the row matched under
    pub sku_key: String,

    /// The resolved catalog record
    pub product: ProductRecord,

    pub quantity: i64,
    pub value: Decimal,

    /// 1-based position in the uploaded row sequence
    pub source_line: usize,
}

impl Transaction {
    pub fn is_premium(&self) -> bool {
        self.product.is_premium()
    }
}

// ============================================================================
// REJECTED ROWS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RejectReason {
    /// Missing required field or unparseable quantity/value
    Malformed(String),

    /// No catalog record under the row's key
    Unmatched,

    /// Several catalog records and no tie-break winner
    Ambiguous(Vec<ProductRecord>),
}

impl RejectReason {
    pub fn label(&self) -> &'static str {
        match self {
            RejectReason::Malformed(_) => "malformed",
            RejectReason::Unmatched => "unmatched",
            RejectReason::Ambiguous(_) => "ambiguous",
        }
    }
}

/// A sale row excluded from the ledger, retained for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedRow {
    pub row: RawRow,
    pub source_line: usize,
    pub sku_key: NormalizedKey,
    pub reason: RejectReason,
}

// ============================================================================
// PROCESSING ERROR
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum ProcessingError {
    /// Row count beyond the configured budget. No partial ledger is
    /// produced: incomplete metrics would be worse than no metrics.
    TooLarge { rows: usize, budget: usize },
}

impl std::fmt::Display for ProcessingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessingError::TooLarge { rows, budget } => write!(
                f,
                "upload has {} rows, over the processing budget of {}",
                rows, budget
            ),
        }
    }
}

impl std::error::Error for ProcessingError {}

// ============================================================================
// LEDGER
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ledger {
    pub transactions: Vec<Transaction>,
}

impl Ledger {
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

/// Result of folding match results over one upload's rows.
#[derive(Debug)]
pub struct LedgerBuild {
    pub ledger: Ledger,
    pub rejected: Vec<RejectedRow>,

    /// Rows whose kind is not a sale (returns, adjustments); legitimate
    /// input, so they are counted but not audited
    pub skipped_non_sale: usize,
}

/// Fold match results over all rows of one upload.
///
/// The whole input is materialized before returning; callers only ever see
/// a consistent, complete snapshot or an error, never a partial ledger.
pub fn build_ledger(
    rows: &[RawRow],
    index: &CatalogIndex,
    normalizer: &Normalizer,
    matcher: &Matcher,
    max_rows: usize,
) -> Result<LedgerBuild, ProcessingError> {
    if rows.len() > max_rows {
        return Err(ProcessingError::TooLarge {
            rows: rows.len(),
            budget: max_rows,
        });
    }

    let mut transactions = Vec::new();
    let mut rejected = Vec::new();
    let mut skipped_non_sale = 0usize;

    for (i, row) in rows.iter().enumerate() {
        let source_line = i + 1;

        if !row.is_sale() {
            skipped_non_sale += 1;
            continue;
        }

        let sku_key = normalizer.normalize(KeyKind::Sku, &row.product_code);

        let (quantity, value) = match coerce_row(row) {
            Ok(pair) => pair,
            Err(problem) => {
                rejected.push(RejectedRow {
                    row: row.clone(),
                    source_line,
                    sku_key,
                    reason: RejectReason::Malformed(problem),
                });
                continue;
            }
        };

        match matcher.match_row(row, index, normalizer) {
            MatchResult::Matched(product) => {
                transactions.push(Transaction {
                    customer: CustomerKey::from_row(row),
                    reseller_name: row.reseller_name.trim().to_string(),
                    cycle: row.cycle.trim().to_string(),
                    sector: row.sector.trim().to_string(),
                    sku_key: sku_key.display().to_string(),
                    product,
                    quantity,
                    value,
                    source_line,
                });
            }
            MatchResult::Ambiguous(candidates) => {
                rejected.push(RejectedRow {
                    row: row.clone(),
                    source_line,
                    sku_key,
                    reason: RejectReason::Ambiguous(candidates),
                });
            }
            MatchResult::Unmatched => {
                rejected.push(RejectedRow {
                    row: row.clone(),
                    source_line,
                    sku_key,
                    reason: RejectReason::Unmatched,
                });
            }
        }
    }

    Ok(LedgerBuild {
        ledger: Ledger { transactions },
        rejected,
        skipped_non_sale,
    })
}

/// Required fields present and numeric cells coerced.
fn coerce_row(row: &RawRow) -> Result<(i64, Decimal), String> {
    if row.cycle.trim().is_empty() {
        return Err("billing cycle is empty".to_string());
    }

    if row.reseller_code.trim().is_empty() && row.reseller_name.trim().is_empty() {
        return Err("reseller code and name are both empty".to_string());
    }

    let quantity = parse_quantity(&row.quantity)
        .ok_or_else(|| format!("quantity is not a whole number: {:?}", row.quantity))?;

    let value = parse_money(&row.value)
        .ok_or_else(|| format!("value is not numeric: {:?}", row.value))?;

    Ok((quantity, value))
}

/// Whole-number quantity, tolerating Excel's ".0" float artifact.
pub fn parse_quantity(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let cleaned = trimmed.strip_suffix(".0").unwrap_or(trimmed);
    cleaned.parse::<i64>().ok()
}

/// Monetary cell → Decimal.
///
/// Accepts "1234.56", "1234,56", "1.234,56", "R$ 1.234,56". The last
/// separator present is treated as the decimal point.
pub fn parse_money(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw
        .trim()
        .trim_start_matches("R$")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    if cleaned.is_empty() {
        return None;
    }

    let last_dot = cleaned.rfind('.');
    let last_comma = cleaned.rfind(',');

    let canonical = match (last_dot, last_comma) {
        // Comma is the decimal separator, dots are thousands
        (Some(d), Some(c)) if c > d => cleaned.replace('.', "").replace(',', "."),
        // Dot is the decimal separator, commas are thousands
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (None, Some(_)) => cleaned.replace(',', "."),
        _ => cleaned,
    };

    Decimal::from_str(&canonical).ok()
}

// ============================================================================
// TESTS
// ============================================================================
