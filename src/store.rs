// 💾 Store - SQLite persistence for catalog and durable outputs
// CustomerMetrics and AuditEntry rows live here until the next upload for
// the same cycle supersedes them
//
// Monetary values are persisted as canonical decimal strings, never as
// floats, so a round-trip through the store cannot introduce drift.

use crate::catalog::{PremiumLine, ProductRecord};
use crate::pipeline::UploadOutcome;
use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use rust_decimal::Decimal;
use std::str::FromStr;

// ============================================================================
// SCHEMA
// ============================================================================

/// Create tables and enable WAL mode.
pub fn setup_database(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")
        .context("Failed to enable WAL mode")?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS products (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            sku TEXT NOT NULL,
            name TEXT NOT NULL,
            brand TEXT NOT NULL,
            category TEXT NOT NULL DEFAULT '',
            premium_line TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_products_sku ON products(sku);

        CREATE TABLE IF NOT EXISTS customer_metrics (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            upload_id TEXT NOT NULL,
            cycle TEXT NOT NULL,
            reseller TEXT NOT NULL,
            sector TEXT NOT NULL,
            reseller_name TEXT NOT NULL,
            brands TEXT NOT NULL,
            brand_count INTEGER NOT NULL,
            is_multimarca INTEGER NOT NULL,
            is_active INTEGER NOT NULL,
            total_value TEXT NOT NULL,
            total_items INTEGER NOT NULL,
            transaction_count INTEGER NOT NULL,
            premium_count INTEGER NOT NULL,
            processed_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_metrics_cycle ON customer_metrics(cycle);

        CREATE TABLE IF NOT EXISTS audit_entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            upload_id TEXT NOT NULL,
            cycle TEXT NOT NULL,
            sku_key TEXT NOT NULL,
            category TEXT NOT NULL,
            occurrences INTEGER NOT NULL,
            product_names TEXT NOT NULL,
            sectors TEXT NOT NULL,
            total_value TEXT NOT NULL,
            processed_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_audit_cycle ON audit_entries(cycle);",
    )
    .context("Failed to create schema")?;

    Ok(())
}

// ============================================================================
// CATALOG
// ============================================================================

/// Replace the stored catalog with a fresh import.
pub fn replace_products(conn: &mut Connection, products: &[ProductRecord]) -> Result<usize> {
    let tx = conn.transaction().context("Failed to start transaction")?;

    tx.execute("DELETE FROM products", [])
        .context("Failed to clear products")?;

    {
        let mut stmt = tx
            .prepare(
                "INSERT INTO products (sku, name, brand, category, premium_line)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .context("Failed to prepare product insert")?;

        for product in products {
            stmt.execute(params![
                product.sku,
                product.name,
                product.brand,
                product.category,
                product.premium.map(|l| l.as_str()),
            ])
            .context("Failed to insert product")?;
        }
    }

    tx.commit().context("Failed to commit catalog import")?;
    Ok(products.len())
}

/// Load the active catalog.
pub fn load_products(conn: &Connection) -> Result<Vec<ProductRecord>> {
    let mut stmt = conn
        .prepare("SELECT sku, name, brand, category, premium_line FROM products ORDER BY sku")
        .context("Failed to prepare product query")?;

    let rows = stmt
        .query_map([], |row| {
            let premium: Option<String> = row.get(4)?;
            Ok(ProductRecord {
                sku: row.get(0)?,
                name: row.get(1)?,
                brand: row.get(2)?,
                category: row.get(3)?,
                premium: premium.as_deref().and_then(PremiumLine::parse),
            })
        })
        .context("Failed to query products")?;

    let mut products = Vec::new();
    for row in rows {
        products.push(row.context("Failed to read product row")?);
    }
    Ok(products)
}

pub fn product_count(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM products", [], |row| row.get(0))
        .context("Failed to count products")
}

// ============================================================================
// UPLOAD OUTCOMES
// ============================================================================

/// Persist an upload's metrics and audit entries.
///
/// Full recompute semantics: rows for every cycle present in this upload
/// are deleted first, so a re-upload supersedes the previous results and
/// stale aggregates cannot survive.
pub fn persist_outcome(conn: &mut Connection, outcome: &UploadOutcome) -> Result<()> {
    let processed_at = outcome.processed_at.to_rfc3339();

    // Customer rows are keyed to the upload's current cycle; every cycle
    // the upload touches is superseded so no stale rows survive a re-run
    let current_cycle = outcome.metrics.current_cycle.clone().unwrap_or_default();

    let tx = conn.transaction().context("Failed to start transaction")?;

    let mut cycles: Vec<String> = outcome.metrics.cycles.keys().cloned().collect();
    if !cycles.contains(&current_cycle) {
        cycles.push(current_cycle.clone());
    }
    for cycle in &cycles {
        tx.execute("DELETE FROM customer_metrics WHERE cycle = ?1", params![cycle])
            .context("Failed to supersede metric rows")?;
        tx.execute("DELETE FROM audit_entries WHERE cycle = ?1", params![cycle])
            .context("Failed to supersede audit rows")?;
    }

    {
        let mut stmt = tx
            .prepare(
                "INSERT INTO customer_metrics (
                    upload_id, cycle, reseller, sector, reseller_name,
                    brands, brand_count, is_multimarca, is_active,
                    total_value, total_items, transaction_count, premium_count,
                    processed_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            )
            .context("Failed to prepare metric insert")?;

        for metrics in &outcome.metrics.customers {
            let brands = metrics
                .brands
                .iter()
                .cloned()
                .collect::<Vec<_>>()
                .join(", ");

            stmt.execute(params![
                outcome.upload_id,
                current_cycle,
                metrics.key.reseller,
                metrics.key.sector,
                metrics.reseller_name,
                brands,
                metrics.brands.len() as i64,
                metrics.is_multimarca() as i64,
                metrics.active as i64,
                metrics.total_value.to_string(),
                metrics.total_items,
                metrics.transaction_count as i64,
                metrics.premium_count as i64,
                processed_at,
            ])
            .context("Failed to insert metric row")?;
        }
    }

    {
        let mut stmt = tx
            .prepare(
                "INSERT INTO audit_entries (
                    upload_id, cycle, sku_key, category, occurrences,
                    product_names, sectors, total_value, processed_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )
            .context("Failed to prepare audit insert")?;

        for entry in &outcome.audit.entries {
            let names = entry
                .product_names
                .iter()
                .cloned()
                .collect::<Vec<_>>()
                .join(", ");
            let sectors = entry.sectors.iter().cloned().collect::<Vec<_>>().join(", ");

            // Rows with a blank cycle (malformed) attach to the current one
            let mut entry_cycles: Vec<String> = entry.cycles.iter().cloned().collect();
            if entry_cycles.is_empty() {
                entry_cycles.push(current_cycle.clone());
            }

            for cycle in &entry_cycles {
                stmt.execute(params![
                    outcome.upload_id,
                    cycle,
                    entry.sku_key,
                    entry.category.label(),
                    entry.occurrences as i64,
                    names,
                    sectors,
                    entry.total_value.to_string(),
                    processed_at,
                ])
                .context("Failed to insert audit row")?;
            }
        }
    }

    tx.commit().context("Failed to commit upload outcome")
}

// ============================================================================
// QUERY INTERFACE
// ============================================================================

/// One persisted per-customer metric row, as the presentation layer reads it.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredCustomerMetrics {
    pub cycle: String,
    pub reseller: String,
    pub sector: String,
    pub reseller_name: String,
    pub brands: String,
    pub brand_count: i64,
    pub is_multimarca: bool,
    pub is_active: bool,
    pub total_value: Decimal,
    pub total_items: i64,
    pub transaction_count: i64,
    pub premium_count: i64,
}

/// Customer metrics for a cycle (or all cycles), ordered by value
/// descending then customer key.
pub fn query_customer_metrics(
    conn: &Connection,
    cycle: Option<&str>,
) -> Result<Vec<StoredCustomerMetrics>> {
    let sql = "SELECT cycle, reseller, sector, reseller_name, brands, brand_count,
                      is_multimarca, is_active, total_value, total_items,
                      transaction_count, premium_count
               FROM customer_metrics
               WHERE (?1 IS NULL OR cycle = ?1)
               ORDER BY CAST(total_value AS REAL) DESC, reseller, sector";

    let mut stmt = conn.prepare(sql).context("Failed to prepare metric query")?;

    let rows = stmt
        .query_map(params![cycle], |row| {
            let value_text: String = row.get(8)?;
            Ok(StoredCustomerMetrics {
                cycle: row.get(0)?,
                reseller: row.get(1)?,
                sector: row.get(2)?,
                reseller_name: row.get(3)?,
                brands: row.get(4)?,
                brand_count: row.get(5)?,
                is_multimarca: row.get::<_, i64>(6)? != 0,
                is_active: row.get::<_, i64>(7)? != 0,
                total_value: Decimal::from_str(&value_text).unwrap_or(Decimal::ZERO),
                total_items: row.get(9)?,
                transaction_count: row.get(10)?,
                premium_count: row.get(11)?,
            })
        })
        .context("Failed to query customer metrics")?;

    let mut metrics = Vec::new();
    for row in rows {
        metrics.push(row.context("Failed to read metric row")?);
    }
    Ok(metrics)
}

/// One persisted audit row.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredAuditEntry {
    pub cycle: String,
    pub sku_key: String,
    pub category: String,
    pub occurrences: i64,
    pub product_names: String,
    pub sectors: String,
    pub total_value: Decimal,
}

/// Audit entries for a cycle (or all cycles), in report order.
pub fn query_audit_entries(
    conn: &Connection,
    cycle: Option<&str>,
) -> Result<Vec<StoredAuditEntry>> {
    let sql = "SELECT cycle, sku_key, category, occurrences, product_names, sectors, total_value
               FROM audit_entries
               WHERE (?1 IS NULL OR cycle = ?1)
               ORDER BY occurrences DESC, sku_key";

    let mut stmt = conn.prepare(sql).context("Failed to prepare audit query")?;

    let rows = stmt
        .query_map(params![cycle], |row| {
            let value_text: String = row.get(6)?;
            Ok(StoredAuditEntry {
                cycle: row.get(0)?,
                sku_key: row.get(1)?,
                category: row.get(2)?,
                occurrences: row.get(3)?,
                product_names: row.get(4)?,
                sectors: row.get(5)?,
                total_value: Decimal::from_str(&value_text).unwrap_or(Decimal::ZERO),
            })
        })
        .context("Failed to query audit entries")?;

    let mut entries = Vec::new();
    for row in rows {
        entries.push(row.context("Failed to read audit row")?);
    }
    Ok(entries)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogIndex;
    use crate::ledger::RawRow;
    use crate::normalizer::Normalizer;
    use crate::pipeline::{process_upload, EngineConfig};

    fn sale(code: &str, sku: &str, value: &str) -> RawRow {
        RawRow {
            sector: "Norte".to_string(),
            reseller_name: "Maria Silva".to_string(),
            reseller_code: code.to_string(),
            cycle: "2025-04".to_string(),
            product_code: sku.to_string(),
            product_name: "".to_string(),
            brand: "".to_string(),
            kind: "Venda".to_string(),
            quantity: "1".to_string(),
            value: value.to_string(),
        }
    }

    fn catalog() -> Vec<ProductRecord> {
        vec![
            ProductRecord::new("00123", "Malbec Des Col", "oBoticário", "Desodorantes"),
            ProductRecord::new("45678", "Glam Batom", "Eudora", "Maquiagem")
                .with_premium(PremiumLine::Makeup),
        ]
    }

    #[test]
    fn test_catalog_round_trip() {
        let mut conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        let imported = replace_products(&mut conn, &catalog()).unwrap();
        assert_eq!(imported, 2);
        assert_eq!(product_count(&conn).unwrap(), 2);

        let loaded = load_products(&conn).unwrap();
        assert_eq!(loaded, catalog());

        // Re-import replaces, never appends
        replace_products(&mut conn, &catalog()).unwrap();
        assert_eq!(product_count(&conn).unwrap(), 2);
    }

    #[test]
    fn test_persist_and_query_outcome() {
        let mut conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        let index = CatalogIndex::build(catalog(), &Normalizer::new());
        let rows = vec![
            sale("R001", "123", "29.90"),
            sale("R001", "45678", "49.90"),
            sale("R002", "99999", "9.90"), // unmatched
        ];
        let outcome = process_upload(&rows, &index, &EngineConfig::default()).unwrap();

        persist_outcome(&mut conn, &outcome).unwrap();

        let metrics = query_customer_metrics(&conn, Some("2025-04")).unwrap();
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].reseller, "R001");
        assert!(metrics[0].is_multimarca);
        assert_eq!(metrics[0].total_value, Decimal::from_str("79.80").unwrap());

        let audit = query_audit_entries(&conn, Some("2025-04")).unwrap();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].sku_key, "99999");
    }

    #[test]
    fn test_reupload_supersedes_cycle() {
        let mut conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        let index = CatalogIndex::build(catalog(), &Normalizer::new());
        let config = EngineConfig::default();

        let first = process_upload(&[sale("R001", "123", "29.90")], &index, &config).unwrap();
        persist_outcome(&mut conn, &first).unwrap();

        // Corrected re-upload for the same cycle
        let second = process_upload(
            &[sale("R001", "123", "29.90"), sale("R002", "123", "29.90")],
            &index,
            &config,
        )
        .unwrap();
        persist_outcome(&mut conn, &second).unwrap();

        let metrics = query_customer_metrics(&conn, Some("2025-04")).unwrap();
        assert_eq!(metrics.len(), 2);
        // Only the second upload's rows survive
        assert!(metrics.iter().all(|m| m.cycle == "2025-04"));
    }

    #[test]
    fn test_multi_cycle_upload_keys_to_current_cycle() {
        let mut conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        let index = CatalogIndex::build(catalog(), &Normalizer::new());
        let config = EngineConfig::default();

        let mut newer = sale("R003", "123", "19.90");
        newer.cycle = "2025-05".to_string();

        let outcome = process_upload(
            &[sale("R001", "123", "29.90"), newer],
            &index,
            &config,
        )
        .unwrap();
        persist_outcome(&mut conn, &outcome).unwrap();

        // Both customers land under the upload's latest cycle, and the
        // older cycle it touched was superseded (left empty)
        let all = query_customer_metrics(&conn, None).unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|m| m.cycle == "2025-05"));

        let april = query_customer_metrics(&conn, Some("2025-04")).unwrap();
        assert!(april.is_empty());
    }
}
