// 🔎 Audit Reporter - Unresolved SKUs surfaced for human review
// One entry per distinct normalized key, with a suggested resolution
//
// Ordering is fixed: occurrence count descending, key ascending. Snapshot
// tests downstream rely on that, so keep it stable.

use crate::catalog::CatalogIndex;
use crate::ledger::{RejectReason, RejectedRow};
use crate::matcher::levenshtein_distance;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

// ============================================================================
// AUDIT CATEGORY
// ============================================================================

/// Suggested resolution for an unresolved SKU.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AuditCategory {
    /// Key absent from the catalog but selling repeatedly - likely a new
    /// launch that was never registered
    PossibleNewProduct,

    /// Key a small edit away from a registered one
    PossibleTypo { nearest_key: String },

    /// Several catalog records and no tie-break winner; never guessed
    AmbiguousSku { candidate_skus: Vec<String> },

    /// Row rejected before matching (missing field, bad number)
    MalformedRow,

    /// Absent from the catalog, too rare to call a new product
    Unknown,
}

impl AuditCategory {
    pub fn label(&self) -> &'static str {
        match self {
            AuditCategory::PossibleNewProduct => "possible new product",
            AuditCategory::PossibleTypo { .. } => "possible typo",
            AuditCategory::AmbiguousSku { .. } => "ambiguous sku",
            AuditCategory::MalformedRow => "malformed row",
            AuditCategory::Unknown => "unknown",
        }
    }
}

// ============================================================================
// AUDIT ENTRY
// ============================================================================

/// One row affected by an unresolved SKU.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRowRef {
    pub source_line: usize,
    pub cycle: String,
    pub sector: String,
    pub reseller_code: String,
    pub product_code: String,
    pub product_name: String,
    pub detail: String,
}

/// One distinct unresolved SKU with everything a reviewer needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Normalized key ("(vazio)" for blank codes)
    pub sku_key: String,

    pub category: AuditCategory,
    pub occurrences: usize,

    /// Product names seen on the affected rows
    pub product_names: BTreeSet<String>,

    pub cycles: BTreeSet<String>,
    pub sectors: BTreeSet<String>,

    /// Value at stake across affected rows (rows with unparseable values
    /// contribute zero)
    pub total_value: Decimal,

    pub rows: Vec<AuditRowRef>,
}

// ============================================================================
// AUDIT REPORT
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditReport {
    /// Entries ordered by occurrence count desc, key asc
    pub entries: Vec<AuditEntry>,

    /// Top-level conditions (e.g. empty catalog)
    pub warnings: Vec<String>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.entries.is_empty() && self.warnings.is_empty()
    }

    pub fn count_by_category(&self, label: &str) -> usize {
        self.entries.iter().filter(|e| e.category.label() == label).count()
    }

    pub fn summary(&self) -> String {
        let affected: usize = self.entries.iter().map(|e| e.occurrences).sum();
        format!(
            "{} unresolved SKUs across {} rows ({} possible new, {} possible typo, {} ambiguous, {} malformed)",
            self.entries.len(),
            affected,
            self.count_by_category("possible new product"),
            self.count_by_category("possible typo"),
            self.count_by_category("ambiguous sku"),
            self.count_by_category("malformed row"),
        )
    }
}

// ============================================================================
// AUDIT REPORTER
// ============================================================================

pub struct AuditReporter {
    /// Minimum occurrences before an unknown key is called a possible new
    /// product
    pub new_product_threshold: usize,

    /// Edit-distance ceiling for the typo heuristic
    pub typo_distance: usize,
}

impl AuditReporter {
    pub fn new() -> Self {
        AuditReporter {
            new_product_threshold: 3,
            typo_distance: 1,
        }
    }

    pub fn with_thresholds(new_product_threshold: usize, typo_distance: usize) -> Self {
        AuditReporter {
            new_product_threshold,
            typo_distance,
        }
    }

    /// Group rejected rows by normalized key and classify each group.
    pub fn audit(&self, rejected: &[RejectedRow], index: &CatalogIndex) -> AuditReport {
        let mut warnings = Vec::new();

        if index.is_empty() && !rejected.is_empty() {
            warnings.push(
                "catalog is empty: every row resolved unmatched; metrics are degraded to zero matched"
                    .to_string(),
            );
        }

        // BTreeMap gives ascending key order before the count sort, which
        // keeps the tie-break stable
        let mut groups: BTreeMap<String, Vec<&RejectedRow>> = BTreeMap::new();
        for rejection in rejected {
            groups
                .entry(rejection.sku_key.display().to_string())
                .or_default()
                .push(rejection);
        }

        let mut entries: Vec<AuditEntry> = groups
            .into_iter()
            .map(|(sku_key, rows)| self.build_entry(sku_key, &rows, index))
            .collect();

        entries.sort_by(|a, b| {
            b.occurrences
                .cmp(&a.occurrences)
                .then_with(|| a.sku_key.cmp(&b.sku_key))
        });

        AuditReport { entries, warnings }
    }

    fn build_entry(
        &self,
        sku_key: String,
        rows: &[&RejectedRow],
        index: &CatalogIndex,
    ) -> AuditEntry {
        let mut product_names = BTreeSet::new();
        let mut cycles = BTreeSet::new();
        let mut sectors = BTreeSet::new();
        let mut total_value = Decimal::ZERO;
        let mut row_refs = Vec::new();

        for rejection in rows {
            let row = &rejection.row;
            if !row.product_name.trim().is_empty() {
                product_names.insert(row.product_name.trim().to_string());
            }
            if !row.cycle.trim().is_empty() {
                cycles.insert(row.cycle.trim().to_string());
            }
            if !row.sector.trim().is_empty() {
                sectors.insert(row.sector.trim().to_string());
            }
            if let Some(value) = crate::ledger::parse_money(&row.value) {
                total_value += value;
            }

            let detail = match &rejection.reason {
                RejectReason::Malformed(problem) => problem.clone(),
                RejectReason::Unmatched => "no catalog record".to_string(),
                RejectReason::Ambiguous(candidates) => format!(
                    "{} catalog candidates, no tie-break winner",
                    candidates.len()
                ),
            };

            row_refs.push(AuditRowRef {
                source_line: rejection.source_line,
                cycle: row.cycle.trim().to_string(),
                sector: row.sector.trim().to_string(),
                reseller_code: row.reseller_code.trim().to_string(),
                product_code: row.product_code.trim().to_string(),
                product_name: row.product_name.trim().to_string(),
                detail,
            });
        }

        let category = self.classify(&sku_key, rows, index);

        AuditEntry {
            sku_key,
            category,
            occurrences: rows.len(),
            product_names,
            cycles,
            sectors,
            total_value,
            rows: row_refs,
        }
    }

    /// Precedence: malformed → ambiguous → typo → new product → unknown.
    fn classify(
        &self,
        sku_key: &str,
        rows: &[&RejectedRow],
        index: &CatalogIndex,
    ) -> AuditCategory {
        if rows
            .iter()
            .all(|r| matches!(r.reason, RejectReason::Malformed(_)))
        {
            return AuditCategory::MalformedRow;
        }

        if let Some(candidates) = rows.iter().find_map(|r| match &r.reason {
            RejectReason::Ambiguous(candidates) => Some(candidates),
            _ => None,
        }) {
            let mut candidate_skus: Vec<String> =
                candidates.iter().map(|c| c.sku.clone()).collect();
            candidate_skus.sort();
            return AuditCategory::AmbiguousSku { candidate_skus };
        }

        if rows.first().map(|r| r.sku_key.is_empty()).unwrap_or(true) {
            return AuditCategory::Unknown;
        }

        if let Some(nearest) = self.nearest_known_key(sku_key, index) {
            return AuditCategory::PossibleTypo { nearest_key: nearest };
        }

        if rows.len() >= self.new_product_threshold {
            return AuditCategory::PossibleNewProduct;
        }

        AuditCategory::Unknown
    }

    /// Closest catalog key within the typo distance; ties resolve to the
    /// smallest key so the answer never depends on iteration order.
    fn nearest_known_key(&self, sku_key: &str, index: &CatalogIndex) -> Option<String> {
        let mut distances: HashMap<&str, usize> = HashMap::new();
        for known in index.known_keys() {
            distances.insert(known, levenshtein_distance(sku_key, known));
        }

        distances
            .into_iter()
            .filter(|(_, d)| *d <= self.typo_distance)
            .min_by(|(key_a, dist_a), (key_b, dist_b)| {
                dist_a.cmp(dist_b).then_with(|| key_a.cmp(key_b))
            })
            .map(|(key, _)| key.to_string())
    }
}

impl Default for AuditReporter {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogIndex, ProductRecord};
    use crate::ledger::RawRow;
    use crate::normalizer::{NormalizedKey, Normalizer};

    fn rejected(sku: &str, key: &str, reason: RejectReason, line: usize) -> RejectedRow {
        RejectedRow {
            row: RawRow {
                sector: "Norte".to_string(),
                reseller_name: "Maria Silva".to_string(),
                reseller_code: "R001".to_string(),
                cycle: "2025-04".to_string(),
                product_code: sku.to_string(),
                product_name: "Produto Misterioso".to_string(),
                brand: "".to_string(),
                kind: "Venda".to_string(),
                quantity: "1".to_string(),
                value: "15.00".to_string(),
            },
            source_line: line,
            sku_key: if key.is_empty() {
                NormalizedKey::Empty
            } else {
                NormalizedKey::Key(key.to_string())
            },
            reason,
        }
    }

    fn test_index() -> CatalogIndex {
        CatalogIndex::build(
            vec![ProductRecord::new("00123", "Malbec", "oBoticário", "Perfumaria")],
            &Normalizer::new(),
        )
    }

    #[test]
    fn test_groups_by_key_with_counts() {
        let reporter = AuditReporter::new();
        let index = test_index();

        let rejections = vec![
            rejected("55555", "55555", RejectReason::Unmatched, 1),
            rejected("55555", "55555", RejectReason::Unmatched, 2),
            rejected("77777", "77777", RejectReason::Unmatched, 3),
        ];

        let report = reporter.audit(&rejections, &index);

        assert_eq!(report.entries.len(), 2);
        assert_eq!(report.entries[0].sku_key, "55555");
        assert_eq!(report.entries[0].occurrences, 2);
        assert_eq!(report.entries[0].rows.len(), 2);
        assert_eq!(report.entries[1].occurrences, 1);
    }

    #[test]
    fn test_ordering_count_desc_key_asc() {
        let reporter = AuditReporter::new();
        let index = test_index();

        let rejections = vec![
            rejected("99999", "99999", RejectReason::Unmatched, 1),
            rejected("55555", "55555", RejectReason::Unmatched, 2),
            rejected("77777", "77777", RejectReason::Unmatched, 3),
            rejected("77777", "77777", RejectReason::Unmatched, 4),
        ];

        let report = reporter.audit(&rejections, &index);

        let keys: Vec<&str> = report.entries.iter().map(|e| e.sku_key.as_str()).collect();
        assert_eq!(keys, vec!["77777", "55555", "99999"]);
    }

    #[test]
    fn test_possible_typo_classification() {
        let reporter = AuditReporter::new();
        let index = test_index();

        // One edit from the known "00123"
        let rejections = vec![rejected("00124", "00124", RejectReason::Unmatched, 1)];
        let report = reporter.audit(&rejections, &index);

        assert_eq!(
            report.entries[0].category,
            AuditCategory::PossibleTypo {
                nearest_key: "00123".to_string()
            }
        );
    }

    #[test]
    fn test_possible_new_product_classification() {
        let reporter = AuditReporter::new();
        let index = test_index();

        // Far from any known key, selling three times
        let rejections = vec![
            rejected("88888", "88888", RejectReason::Unmatched, 1),
            rejected("88888", "88888", RejectReason::Unmatched, 2),
            rejected("88888", "88888", RejectReason::Unmatched, 3),
        ];
        let report = reporter.audit(&rejections, &index);

        assert_eq!(report.entries[0].category, AuditCategory::PossibleNewProduct);
    }

    #[test]
    fn test_rare_unknown_key_stays_unknown() {
        let reporter = AuditReporter::new();
        let index = test_index();

        let rejections = vec![rejected("88888", "88888", RejectReason::Unmatched, 1)];
        let report = reporter.audit(&rejections, &index);

        assert_eq!(report.entries[0].category, AuditCategory::Unknown);
    }

    #[test]
    fn test_malformed_and_ambiguous_categories() {
        let reporter = AuditReporter::new();
        let index = test_index();

        let candidates = vec![
            ProductRecord::new("00777", "Colônia Norte", "Eudora", "Perfumaria"),
            ProductRecord::new("777", "Colônia Sul", "O.U.I", "Perfumaria"),
        ];

        let rejections = vec![
            rejected(
                "123",
                "00123",
                RejectReason::Malformed("quantity is not a whole number".to_string()),
                1,
            ),
            rejected("777", "00777", RejectReason::Ambiguous(candidates), 2),
        ];

        let report = reporter.audit(&rejections, &index);

        let malformed = report.entries.iter().find(|e| e.sku_key == "00123").unwrap();
        assert_eq!(malformed.category, AuditCategory::MalformedRow);

        let ambiguous = report.entries.iter().find(|e| e.sku_key == "00777").unwrap();
        assert_eq!(
            ambiguous.category,
            AuditCategory::AmbiguousSku {
                candidate_skus: vec!["00777".to_string(), "777".to_string()]
            }
        );
    }

    #[test]
    fn test_empty_catalog_warning() {
        let reporter = AuditReporter::new();
        let index = CatalogIndex::empty();

        let rejections = vec![rejected("123", "00123", RejectReason::Unmatched, 1)];
        let report = reporter.audit(&rejections, &index);

        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("catalog is empty"));
    }

    #[test]
    fn test_value_at_stake_and_contexts() {
        let reporter = AuditReporter::new();
        let index = test_index();

        let mut second = rejected("55555", "55555", RejectReason::Unmatched, 2);
        second.row.cycle = "2025-05".to_string();
        second.row.sector = "Sul".to_string();

        let rejections = vec![
            rejected("55555", "55555", RejectReason::Unmatched, 1),
            second,
        ];

        let report = reporter.audit(&rejections, &index);
        let entry = &report.entries[0];

        assert_eq!(entry.total_value, Decimal::from(30));
        assert_eq!(
            entry.cycles.iter().cloned().collect::<Vec<_>>(),
            vec!["2025-04", "2025-05"]
        );
        assert_eq!(
            entry.sectors.iter().cloned().collect::<Vec<_>>(),
            vec!["Norte", "Sul"]
        );
    }

    #[test]
    fn test_no_rejections_is_clean() {
        let reporter = AuditReporter::new();
        let report = reporter.audit(&[], &test_index());

        assert!(report.is_clean());
        assert_eq!(report.entries.len(), 0);
    }
}
