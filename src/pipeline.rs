// ⚙️ Upload Pipeline - rows → ledger → {metrics, audit}
// Explicit pure stages connected by immutable intermediate data
//
// One call processes one upload against one catalog snapshot. Uploads
// never share mutable state, so any number can run concurrently as long
// as each takes its own snapshot from the CatalogHandle.

use crate::audit::{AuditReport, AuditReporter};
use crate::catalog::CatalogIndex;
use crate::ledger::{build_ledger, ProcessingError, RawRow};
use crate::matcher::Matcher;
use crate::metrics::{aggregate, MetricsReport};
use crate::normalizer::{Normalizer, DEFAULT_SKU_WIDTH};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// ENGINE CONFIG
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Defensive row budget; uploads beyond it fail fast with
    /// `ProcessingError::TooLarge` instead of hanging
    pub max_rows: usize,

    /// Canonical width for numeric SKU keys
    pub sku_width: usize,

    /// Edit-distance ceiling for the matcher's name tie-break
    pub name_distance_threshold: usize,

    /// Occurrences before an unknown SKU is flagged a possible new product
    pub new_product_threshold: usize,

    /// Edit-distance ceiling for the audit typo heuristic
    pub typo_distance: usize,

    /// Unmatched share above which the outcome carries an alert warning
    pub unmatched_alert_rate: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_rows: 500_000,
            sku_width: DEFAULT_SKU_WIDTH,
            name_distance_threshold: 3,
            new_product_threshold: 3,
            typo_distance: 1,
            unmatched_alert_rate: 0.05,
        }
    }
}

// ============================================================================
// UPLOAD STATS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadStats {
    pub total_rows: usize,
    pub sale_rows: usize,
    pub skipped_non_sale: usize,
    pub matched: usize,
    pub ambiguous: usize,
    pub unmatched: usize,
    pub malformed: usize,
}

impl UploadStats {
    /// Share of sale rows that matched, in [0, 1].
    pub fn match_rate(&self) -> f64 {
        if self.sale_rows == 0 {
            0.0
        } else {
            self.matched as f64 / self.sale_rows as f64
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "{} rows: {} sales, {} matched ({:.1}%), {} ambiguous, {} unmatched, {} malformed, {} skipped",
            self.total_rows,
            self.sale_rows,
            self.matched,
            self.match_rate() * 100.0,
            self.ambiguous,
            self.unmatched,
            self.malformed,
            self.skipped_non_sale,
        )
    }
}

// ============================================================================
// UPLOAD OUTCOME
// ============================================================================

/// Immutable result set for one processed upload, consumed by the
/// persistence/presentation layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadOutcome {
    pub upload_id: String,
    pub processed_at: DateTime<Utc>,

    /// Catalog version the upload was matched against
    pub catalog_version: String,

    pub metrics: MetricsReport,
    pub audit: AuditReport,
    pub stats: UploadStats,
    pub warnings: Vec<String>,
}

// ============================================================================
// PROCESS UPLOAD
// ============================================================================

/// Run the full pipeline over one upload's rows.
///
/// The catalog index is a read-only snapshot; an empty catalog degrades to
/// zero matched rows plus a warning rather than an error.
pub fn process_upload(
    rows: &[RawRow],
    index: &CatalogIndex,
    config: &EngineConfig,
) -> Result<UploadOutcome, ProcessingError> {
    let normalizer = Normalizer::new().with_sku_width(config.sku_width);
    let matcher = Matcher::with_name_distance_threshold(config.name_distance_threshold);
    let reporter = AuditReporter::with_thresholds(config.new_product_threshold, config.typo_distance);

    let build = build_ledger(rows, index, &normalizer, &matcher, config.max_rows)?;

    let mut stats = UploadStats {
        total_rows: rows.len(),
        sale_rows: rows.len() - build.skipped_non_sale,
        skipped_non_sale: build.skipped_non_sale,
        matched: build.ledger.len(),
        ambiguous: 0,
        unmatched: 0,
        malformed: 0,
    };
    for rejection in &build.rejected {
        match rejection.reason.label() {
            "ambiguous" => stats.ambiguous += 1,
            "unmatched" => stats.unmatched += 1,
            _ => stats.malformed += 1,
        }
    }

    let metrics = aggregate(&build.ledger);
    let audit = reporter.audit(&build.rejected, index);

    let mut warnings = audit.warnings.clone();
    if stats.sale_rows > 0 {
        let unmatched_rate = stats.unmatched as f64 / stats.sale_rows as f64;
        if unmatched_rate > config.unmatched_alert_rate {
            warnings.push(format!(
                "{} of {} sale rows ({:.1}%) did not match the catalog",
                stats.unmatched,
                stats.sale_rows,
                unmatched_rate * 100.0
            ));
        }
    }

    Ok(UploadOutcome {
        upload_id: uuid::Uuid::new_v4().to_string(),
        processed_at: Utc::now(),
        catalog_version: index.version().to_string(),
        metrics,
        audit,
        stats,
        warnings,
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogIndex, PremiumLine, ProductRecord};
    use crate::ledger::CustomerKey;
    use crate::normalizer::Normalizer;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn row(code: &str, sector: &str, sku: &str, quantity: &str, value: &str) -> RawRow {
        RawRow {
            sector: sector.to_string(),
            reseller_name: "Revendedora Teste".to_string(),
            reseller_code: code.to_string(),
            cycle: "2025-04".to_string(),
            product_code: sku.to_string(),
            product_name: "".to_string(),
            brand: "".to_string(),
            kind: "Venda".to_string(),
            quantity: quantity.to_string(),
            value: value.to_string(),
        }
    }

    fn test_index() -> CatalogIndex {
        CatalogIndex::build(
            vec![
                ProductRecord::new("00123", "Malbec Des Col", "oBoticário", "Desodorantes"),
                ProductRecord::new("45678", "Glam Batom", "Eudora", "Maquiagem")
                    .with_premium(PremiumLine::Makeup),
            ],
            &Normalizer::new(),
        )
    }

    #[test]
    fn test_full_pipeline() {
        let index = test_index();
        let config = EngineConfig::default();

        let rows = vec![
            row("R001", "Norte", "123", "1", "29.90"),
            row("R001", "Norte", "45678", "1", "49.90"),
            row("R002", "Sul", "123", "2", "59.80"),
            row("R002", "Sul", "99999", "1", "9.90"), // unknown sku
        ];

        let outcome = process_upload(&rows, &index, &config).unwrap();

        assert_eq!(outcome.stats.total_rows, 4);
        assert_eq!(outcome.stats.matched, 3);
        assert_eq!(outcome.stats.unmatched, 1);
        assert_eq!(outcome.catalog_version, index.version());

        // Two customers, one of them multimarca
        assert_eq!(outcome.metrics.customer_count(), 2);
        let multi = outcome
            .metrics
            .customer(&CustomerKey {
                reseller: "R001".to_string(),
                sector: "Norte".to_string(),
            })
            .unwrap();
        assert!(multi.is_multimarca());
        assert!(multi.is_iaf());

        // The unknown SKU surfaced in audit
        assert_eq!(outcome.audit.entries.len(), 1);
        assert_eq!(outcome.audit.entries[0].sku_key, "99999");
    }

    #[test]
    fn test_shuffled_input_same_outcome() {
        let index = test_index();
        let config = EngineConfig::default();

        let rows = vec![
            row("R001", "Norte", "123", "1", "29.90"),
            row("R001", "Norte", "45678", "1", "49.90"),
            row("R002", "Sul", "123", "2", "59.80"),
            row("R003", "Sul", "99999", "1", "9.90"),
        ];

        let forward = process_upload(&rows, &index, &config).unwrap();

        let mut shuffled = rows.clone();
        shuffled.reverse();
        shuffled.rotate_left(1);
        let permuted = process_upload(&shuffled, &index, &config).unwrap();

        assert_eq!(forward.metrics.customers, permuted.metrics.customers);
        assert_eq!(forward.metrics.sectors, permuted.metrics.sectors);
        assert_eq!(
            forward.metrics.grand_total_value,
            permuted.metrics.grand_total_value
        );

        // Audit entries keep their deterministic order too
        let forward_keys: Vec<&str> =
            forward.audit.entries.iter().map(|e| e.sku_key.as_str()).collect();
        let permuted_keys: Vec<&str> =
            permuted.audit.entries.iter().map(|e| e.sku_key.as_str()).collect();
        assert_eq!(forward_keys, permuted_keys);
    }

    #[test]
    fn test_leading_zero_variants_fold_to_one_brand() {
        let index = test_index();
        let config = EngineConfig::default();

        // "123" and "00123" are the same catalog product
        let rows = vec![
            row("R001", "Norte", "123", "1", "29.90"),
            row("R001", "Norte", "00123", "1", "29.90"),
        ];

        let outcome = process_upload(&rows, &index, &config).unwrap();

        assert_eq!(outcome.stats.matched, 2);
        assert_eq!(outcome.metrics.customer_count(), 1);

        let metrics = &outcome.metrics.customers[0];
        assert_eq!(metrics.brands.len(), 1);
        assert!(!metrics.is_multimarca());
    }

    #[test]
    fn test_empty_catalog_degrades_with_warning() {
        let index = CatalogIndex::empty();
        let config = EngineConfig::default();

        let rows = vec![
            row("R001", "Norte", "123", "1", "29.90"),
            row("R002", "Sul", "45678", "1", "49.90"),
        ];

        let outcome = process_upload(&rows, &index, &config).unwrap();

        // Still produces (empty) metrics rather than failing
        assert_eq!(outcome.stats.matched, 0);
        assert_eq!(outcome.stats.unmatched, 2);
        assert_eq!(outcome.metrics.customer_count(), 0);
        assert!(outcome
            .warnings
            .iter()
            .any(|w| w.contains("catalog is empty")));
    }

    #[test]
    fn test_row_budget_returns_no_partial_outcome() {
        let index = test_index();
        let config = EngineConfig {
            max_rows: 2,
            ..EngineConfig::default()
        };

        let rows = vec![
            row("R001", "Norte", "123", "1", "29.90"),
            row("R002", "Sul", "123", "1", "29.90"),
            row("R003", "Sul", "123", "1", "29.90"),
        ];

        let err = process_upload(&rows, &index, &config).unwrap_err();
        assert_eq!(err, ProcessingError::TooLarge { rows: 3, budget: 2 });
    }

    #[test]
    fn test_unmatched_alert_warning() {
        let index = test_index();
        let config = EngineConfig::default();

        // Half the sale rows unmatched, well over the 5% alert rate
        let rows = vec![
            row("R001", "Norte", "123", "1", "29.90"),
            row("R002", "Sul", "99999", "1", "9.90"),
        ];

        let outcome = process_upload(&rows, &index, &config).unwrap();
        assert!(outcome
            .warnings
            .iter()
            .any(|w| w.contains("did not match the catalog")));
    }

    #[test]
    fn test_grand_total_matches_customer_sum() {
        let index = test_index();
        let config = EngineConfig::default();

        let rows = vec![
            row("R001", "Norte", "123", "1", "10.10"),
            row("R002", "Norte", "123", "1", "20.20"),
            row("R003", "Norte", "123", "1", "30.30"),
        ];

        let outcome = process_upload(&rows, &index, &config).unwrap();

        let summed: Decimal = outcome
            .metrics
            .customers
            .iter()
            .map(|m| m.total_value)
            .sum();
        assert_eq!(summed, Decimal::from_str("60.60").unwrap());
        assert_eq!(outcome.metrics.grand_total_value, summed);
    }

    #[test]
    fn test_stats_summary_format() {
        let stats = UploadStats {
            total_rows: 10,
            sale_rows: 8,
            skipped_non_sale: 2,
            matched: 6,
            ambiguous: 0,
            unmatched: 1,
            malformed: 1,
        };

        assert!((stats.match_rate() - 0.75).abs() < 1e-9);
        assert!(stats.summary().contains("6 matched"));
    }
}
