// 📇 Catalog Index - Versioned, immutable product lookup
// Built once per catalog import; matched against by every upload row
//
// Discipline: single writer (catalog import), many readers (matching).
// Re-import builds a NEW index and swaps it atomically - in-flight uploads
// keep matching against the snapshot they started with.

use crate::normalizer::{KeyKind, NormalizedKey, Normalizer};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

// ============================================================================
// PREMIUM LINE
// ============================================================================

/// Premium/incentive product line (drives the IAF metric).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PremiumLine {
    /// Hair-care incentive list
    Hair,

    /// Makeup incentive list
    Makeup,
}

impl PremiumLine {
    pub fn as_str(&self) -> &'static str {
        match self {
            PremiumLine::Hair => "Cabelos",
            PremiumLine::Makeup => "Make",
        }
    }

    pub fn parse(s: &str) -> Option<PremiumLine> {
        match s.trim().to_lowercase().as_str() {
            "cabelos" | "hair" => Some(PremiumLine::Hair),
            "make" | "makeup" | "maquiagem" => Some(PremiumLine::Makeup),
            _ => None,
        }
    }
}

// ============================================================================
// PRODUCT RECORD
// ============================================================================

/// Canonical catalog entry. Immutable once loaded; owned by the index for
/// the lifetime of one catalog version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    /// SKU exactly as registered in the catalog
    pub sku: String,

    /// Display name
    pub name: String,

    /// Canonical brand
    pub brand: String,

    /// Product category ("Maquiagem", "Perfumaria", ...)
    pub category: String,

    /// Premium line membership, if any
    pub premium: Option<PremiumLine>,
}

impl ProductRecord {
    pub fn new(sku: &str, name: &str, brand: &str, category: &str) -> Self {
        ProductRecord {
            sku: sku.to_string(),
            name: name.to_string(),
            brand: brand.to_string(),
            category: category.to_string(),
            premium: None,
        }
    }

    pub fn with_premium(mut self, line: PremiumLine) -> Self {
        self.premium = Some(line);
        self
    }

    pub fn is_premium(&self) -> bool {
        self.premium.is_some()
    }
}

// ============================================================================
// CATALOG INDEX
// ============================================================================

/// Immutable mapping from normalized SKU key to catalog records.
///
/// One key can legitimately hold several records (same SKU across regional
/// variants); the matcher tie-breaks those. Safe to share across any number
/// of concurrent readers once built.
pub struct CatalogIndex {
    /// Normalized key text → records, candidate lists kept sorted
    entries: HashMap<String, Vec<ProductRecord>>,

    /// Content hash of the product list (stable across build order)
    version: String,

    /// Number of source records
    record_count: usize,

    pub built_at: DateTime<Utc>,
}

impl CatalogIndex {
    /// Build an index from catalog records.
    ///
    /// Records whose SKU normalizes to the empty key are skipped - a blank
    /// catalog SKU must never become a wildcard that swallows blank rows.
    pub fn build(products: Vec<ProductRecord>, normalizer: &Normalizer) -> CatalogIndex {
        let version = content_version(&products);
        let record_count = products.len();

        let mut entries: HashMap<String, Vec<ProductRecord>> = HashMap::new();

        for product in products {
            match normalizer.normalize(KeyKind::Sku, &product.sku) {
                NormalizedKey::Key(key) => entries.entry(key).or_default().push(product),
                NormalizedKey::Empty => continue,
            }
        }

        // Candidate order must not depend on insertion order
        for candidates in entries.values_mut() {
            candidates.sort_by(|a, b| {
                a.brand
                    .cmp(&b.brand)
                    .then_with(|| a.sku.cmp(&b.sku))
                    .then_with(|| a.name.cmp(&b.name))
            });
        }

        CatalogIndex {
            entries,
            version,
            record_count,
            built_at: Utc::now(),
        }
    }

    /// Build an empty index (degraded mode: every row resolves Unmatched).
    pub fn empty() -> CatalogIndex {
        CatalogIndex::build(Vec::new(), &Normalizer::new())
    }

    /// All records registered under a normalized key.
    pub fn lookup(&self, key: &NormalizedKey) -> &[ProductRecord] {
        match key.as_str() {
            Some(k) => self.entries.get(k).map(Vec::as_slice).unwrap_or(&[]),
            None => &[],
        }
    }

    pub fn contains(&self, key: &NormalizedKey) -> bool {
        !self.lookup(key).is_empty()
    }

    /// Iterate all normalized keys (used by the audit typo heuristic).
    pub fn known_keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Distinct normalized keys in the index
    pub fn key_count(&self) -> usize {
        self.entries.len()
    }

    /// Source records the index was built from
    pub fn record_count(&self) -> usize {
        self.record_count
    }

    /// Content version hash (hex). Two indexes built from the same product
    /// list carry the same version regardless of input order.
    pub fn version(&self) -> &str {
        &self.version
    }
}

/// SHA-256 over the sorted product lines.
fn content_version(products: &[ProductRecord]) -> String {
    let mut lines: Vec<String> = products
        .iter()
        .map(|p| {
            format!(
                "{}|{}|{}|{}|{}",
                p.sku,
                p.name,
                p.brand,
                p.category,
                p.premium.map(|l| l.as_str()).unwrap_or("-")
            )
        })
        .collect();
    lines.sort();

    let mut hasher = Sha256::new();
    for line in &lines {
        hasher.update(line.as_bytes());
        hasher.update(b"\n");
    }
    format!("{:x}", hasher.finalize())
}

// ============================================================================
// CATALOG HANDLE
// ============================================================================

/// Shared handle over the active catalog version.
///
/// `snapshot` hands out an `Arc` to the current index; `swap` replaces it
/// atomically. Readers holding an older snapshot finish their upload
/// against it and never observe a half-built index.
pub struct CatalogHandle {
    current: RwLock<Arc<CatalogIndex>>,
}

impl CatalogHandle {
    pub fn new(index: CatalogIndex) -> Self {
        CatalogHandle {
            current: RwLock::new(Arc::new(index)),
        }
    }

    /// Current index snapshot. Cheap; clones the Arc, not the index.
    pub fn snapshot(&self) -> Arc<CatalogIndex> {
        self.current.read().unwrap().clone()
    }

    /// Install a freshly built index, returning the superseded one.
    pub fn swap(&self, index: CatalogIndex) -> Arc<CatalogIndex> {
        let mut guard = self.current.write().unwrap();
        std::mem::replace(&mut *guard, Arc::new(index))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_products() -> Vec<ProductRecord> {
        vec![
            ProductRecord::new("00123", "Malbec Desodorante Colônia", "oBoticário", "Perfumaria"),
            ProductRecord::new("45678", "Glam Batom Cremoso", "Eudora", "Maquiagem")
                .with_premium(PremiumLine::Makeup),
            ProductRecord::new("99901", "Siàge Shampoo Reconstrutor", "Eudora", "Cabelos")
                .with_premium(PremiumLine::Hair),
        ]
    }

    #[test]
    fn test_lookup_by_canonical_key() {
        let normalizer = Normalizer::new();
        let index = CatalogIndex::build(sample_products(), &normalizer);

        // "123" and "00123" reach the same record
        let key_short = normalizer.normalize(KeyKind::Sku, "123");
        let key_full = normalizer.normalize(KeyKind::Sku, "00123");
        assert_eq!(key_short, key_full);

        let hits = index.lookup(&key_short);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].brand, "oBoticário");
    }

    #[test]
    fn test_lookup_miss() {
        let normalizer = Normalizer::new();
        let index = CatalogIndex::build(sample_products(), &normalizer);

        let key = normalizer.normalize(KeyKind::Sku, "55555");
        assert!(index.lookup(&key).is_empty());
        assert!(!index.contains(&key));
    }

    #[test]
    fn test_empty_key_never_matches() {
        let normalizer = Normalizer::new();

        // Even with a blank-SKU record in the input, the empty key stays dead
        let mut products = sample_products();
        products.push(ProductRecord::new("", "Registro Quebrado", "Eudora", "Outros"));

        let index = CatalogIndex::build(products, &normalizer);
        assert!(index.lookup(&NormalizedKey::Empty).is_empty());
        assert_eq!(index.key_count(), 3);
    }

    #[test]
    fn test_duplicate_skus_share_a_key() {
        let normalizer = Normalizer::new();
        let products = vec![
            ProductRecord::new("00777", "Colônia Regional Norte", "Eudora", "Perfumaria"),
            ProductRecord::new("777", "Colônia Regional Sul", "O.U.I", "Perfumaria"),
        ];

        let index = CatalogIndex::build(products, &normalizer);
        let key = normalizer.normalize(KeyKind::Sku, "00777");

        let hits = index.lookup(&key);
        assert_eq!(hits.len(), 2);
        // Sorted by brand, not by insertion order
        assert_eq!(hits[0].brand, "Eudora");
        assert_eq!(hits[1].brand, "O.U.I");
    }

    #[test]
    fn test_version_is_order_independent() {
        let normalizer = Normalizer::new();

        let forward = CatalogIndex::build(sample_products(), &normalizer);
        let mut reversed_products = sample_products();
        reversed_products.reverse();
        let reversed = CatalogIndex::build(reversed_products, &normalizer);

        assert_eq!(forward.version(), reversed.version());

        let different = CatalogIndex::build(
            vec![ProductRecord::new("00001", "Outro", "Eudora", "Outros")],
            &normalizer,
        );
        assert_ne!(forward.version(), different.version());
    }

    #[test]
    fn test_handle_swap_preserves_old_snapshot() {
        let normalizer = Normalizer::new();
        let handle = CatalogHandle::new(CatalogIndex::build(sample_products(), &normalizer));

        let before = handle.snapshot();
        let key = normalizer.normalize(KeyKind::Sku, "00123");
        assert!(before.contains(&key));

        // Re-import drops that SKU
        let new_index = CatalogIndex::build(
            vec![ProductRecord::new("45678", "Glam Batom Cremoso", "Eudora", "Maquiagem")],
            &normalizer,
        );
        let superseded = handle.swap(new_index);

        // The old snapshot still answers from the old version
        assert!(before.contains(&key));
        assert!(superseded.contains(&key));

        // New snapshots answer from the new version
        let after = handle.snapshot();
        assert!(!after.contains(&key));
    }

    #[test]
    fn test_empty_catalog() {
        let index = CatalogIndex::empty();
        assert!(index.is_empty());
        assert_eq!(index.record_count(), 0);
    }
}
