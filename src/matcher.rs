// 🎯 Matcher - Resolve each row's product code against the catalog
// Outcomes: Matched / Ambiguous / Unmatched - exactly one per row
//
// Multi-hit tie-break runs in two stages: brand equality first, then
// product-name similarity. Ambiguity is never silently resolved: if no
// single candidate survives, the row goes to audit, not into the ledger.

use crate::catalog::{CatalogIndex, ProductRecord};
use crate::ledger::RawRow;
use crate::normalizer::{KeyKind, NormalizedKey, Normalizer};
use serde::{Deserialize, Serialize};

// ============================================================================
// MATCH RESULT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MatchResult {
    /// Exactly one catalog record resolved
    Matched(ProductRecord),

    /// Multiple records and no tie-break winner; candidates sorted by
    /// (brand, sku, name) so the set is the same for any enumeration order
    Ambiguous(Vec<ProductRecord>),

    /// No catalog record under the row's normalized key
    Unmatched,
}

impl MatchResult {
    pub fn is_matched(&self) -> bool {
        matches!(self, MatchResult::Matched(_))
    }
}

// ============================================================================
// MATCHER
// ============================================================================

pub struct Matcher {
    /// Edit-distance ceiling for the name tie-break. Inferred from domain
    /// description, so kept configurable rather than fixed.
    pub name_distance_threshold: usize,
}

impl Matcher {
    pub fn new() -> Self {
        Matcher {
            name_distance_threshold: 3,
        }
    }

    pub fn with_name_distance_threshold(threshold: usize) -> Self {
        Matcher {
            name_distance_threshold: threshold,
        }
    }

    /// Resolve one row against an index snapshot.
    ///
    /// Pure function over (row, index): no side effects, and the outcome is
    /// independent of any other row processed before or after.
    pub fn match_row(
        &self,
        row: &RawRow,
        index: &CatalogIndex,
        normalizer: &Normalizer,
    ) -> MatchResult {
        let sku_key = normalizer.normalize(KeyKind::Sku, &row.product_code);

        let candidates = index.lookup(&sku_key);

        match candidates.len() {
            0 => MatchResult::Unmatched,
            1 => MatchResult::Matched(candidates[0].clone()),
            _ => self.tie_break(row, candidates, normalizer),
        }
    }

    /// Stage 1: brand equality on normalized brand text.
    /// Stage 2: product-name comparison (exact key, then edit distance).
    /// A stage decides only when exactly one candidate survives it.
    fn tie_break(
        &self,
        row: &RawRow,
        candidates: &[ProductRecord],
        normalizer: &Normalizer,
    ) -> MatchResult {
        let row_brand = normalizer.normalize(KeyKind::Brand, &row.brand);

        if let NormalizedKey::Key(ref brand_key) = row_brand {
            let by_brand: Vec<&ProductRecord> = candidates
                .iter()
                .filter(|c| {
                    normalizer
                        .normalize(KeyKind::Brand, &c.brand)
                        .as_str()
                        .map(|k| k == brand_key)
                        .unwrap_or(false)
                })
                .collect();

            if by_brand.len() == 1 {
                return MatchResult::Matched(by_brand[0].clone());
            }
        }

        if let Some(winner) = self.name_winner(&row.product_name, candidates, normalizer) {
            return MatchResult::Matched(winner.clone());
        }

        // Candidates arrive sorted from the index; keep that order
        MatchResult::Ambiguous(candidates.to_vec())
    }

    /// Single surviving candidate by name, or None.
    ///
    /// Exact normalized-name equality wins outright when unique; otherwise
    /// the edit-distance band is applied and must also be unique. Total and
    /// order-independent: candidate order never changes the survivor set.
    fn name_winner<'a>(
        &self,
        row_name: &str,
        candidates: &'a [ProductRecord],
        normalizer: &Normalizer,
    ) -> Option<&'a ProductRecord> {
        let row_key = match normalizer.normalize(KeyKind::Sector, row_name) {
            NormalizedKey::Key(k) => k,
            NormalizedKey::Empty => return None,
        };

        let candidate_keys: Vec<Option<String>> = candidates
            .iter()
            .map(|c| {
                normalizer
                    .normalize(KeyKind::Sector, &c.name)
                    .as_str()
                    .map(str::to_string)
            })
            .collect();

        let exact: Vec<&ProductRecord> = candidates
            .iter()
            .zip(&candidate_keys)
            .filter(|(_, key)| key.as_deref() == Some(row_key.as_str()))
            .map(|(c, _)| c)
            .collect();
        if exact.len() == 1 {
            return Some(exact[0]);
        }
        if !exact.is_empty() {
            return None;
        }

        let near: Vec<&ProductRecord> = candidates
            .iter()
            .zip(&candidate_keys)
            .filter(|(_, key)| match key {
                Some(k) => levenshtein_distance(&row_key, k) <= self.name_distance_threshold,
                None => false,
            })
            .map(|(c, _)| c)
            .collect();

        if near.len() == 1 {
            Some(near[0])
        } else {
            None
        }
    }
}

impl Default for Matcher {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// EDIT DISTANCE
// ============================================================================

/// Minimum number of single-character edits (insert, delete, substitute)
/// between two strings.
pub fn levenshtein_distance(s1: &str, s2: &str) -> usize {
    let s1_chars: Vec<char> = s1.chars().collect();
    let s2_chars: Vec<char> = s2.chars().collect();
    let len1 = s1_chars.len();
    let len2 = s2_chars.len();

    if len1 == 0 {
        return len2;
    }
    if len2 == 0 {
        return len1;
    }

    let mut matrix = vec![vec![0usize; len2 + 1]; len1 + 1];

    for i in 0..=len1 {
        matrix[i][0] = i;
    }
    for j in 0..=len2 {
        matrix[0][j] = j;
    }

    for i in 1..=len1 {
        for j in 1..=len2 {
            let cost = if s1_chars[i - 1] == s2_chars[j - 1] { 0 } else { 1 };

            matrix[i][j] = std::cmp::min(
                std::cmp::min(
                    matrix[i - 1][j] + 1, // deletion
                    matrix[i][j - 1] + 1, // insertion
                ),
                matrix[i - 1][j - 1] + cost, // substitution
            );
        }
    }

    matrix[len1][len2]
}

// ============================================================================
// TESTS
// ============================================================================
