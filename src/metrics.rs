// 📊 Metrics Aggregator - Per-customer and per-cycle business metrics
// Multimarca, activity, revenue, item counts, IAF penetration
//
// The fold is associative and order-independent: any permutation of the
// ledger, or any sharded fold merged afterwards, yields identical metrics.
// Monetary sums are Decimal end to end; percentages are computed at
// presentation time and never stored rounded.

use crate::catalog::PremiumLine;
use crate::ledger::{CustomerKey, Ledger, Transaction};
use crate::normalizer::UNKNOWN_BRAND;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// ============================================================================
// CUSTOMER METRICS
// ============================================================================

/// Per-customer aggregate for one upload. Recomputed fully every upload,
/// never patched incrementally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerMetrics {
    pub key: CustomerKey,
    pub reseller_name: String,

    /// Distinct known brands purchased (the unknown brand is excluded)
    pub brands: BTreeSet<String>,

    /// Cycles the customer appears in
    pub cycles: BTreeSet<String>,

    pub total_value: Decimal,
    pub total_items: i64,
    pub transaction_count: u64,

    /// Transactions on a premium line, by line and overall
    pub premium_count: u64,
    pub premium_hair_count: u64,
    pub premium_makeup_count: u64,

    /// Has a transaction in the upload's latest cycle
    pub active: bool,
}

impl CustomerMetrics {
    fn from_transaction(tx: &Transaction) -> CustomerMetrics {
        let mut metrics = CustomerMetrics {
            key: tx.customer.clone(),
            reseller_name: tx.reseller_name.clone(),
            brands: BTreeSet::new(),
            cycles: BTreeSet::new(),
            total_value: Decimal::ZERO,
            total_items: 0,
            transaction_count: 0,
            premium_count: 0,
            premium_hair_count: 0,
            premium_makeup_count: 0,
            active: false,
        };
        metrics.absorb(tx);
        metrics
    }

    fn absorb(&mut self, tx: &Transaction) {
        if tx.product.brand != UNKNOWN_BRAND {
            self.brands.insert(tx.product.brand.clone());
        }
        self.cycles.insert(tx.cycle.clone());
        self.total_value += tx.value;
        self.total_items += tx.quantity;
        self.transaction_count += 1;

        match tx.product.premium {
            Some(PremiumLine::Hair) => {
                self.premium_count += 1;
                self.premium_hair_count += 1;
            }
            Some(PremiumLine::Makeup) => {
                self.premium_count += 1;
                self.premium_makeup_count += 1;
            }
            None => {}
        }
    }

    /// Merge a partial aggregate for the same customer. Associative and
    /// commutative, so sharded folds combine deterministically.
    pub fn merge(&mut self, other: &CustomerMetrics) {
        debug_assert_eq!(self.key, other.key);

        self.brands.extend(other.brands.iter().cloned());
        self.cycles.extend(other.cycles.iter().cloned());
        self.total_value += other.total_value;
        self.total_items += other.total_items;
        self.transaction_count += other.transaction_count;
        self.premium_count += other.premium_count;
        self.premium_hair_count += other.premium_hair_count;
        self.premium_makeup_count += other.premium_makeup_count;
        self.active = self.active || other.active;

        if self.reseller_name.is_empty() {
            self.reseller_name = other.reseller_name.clone();
        }
    }

    /// Multimarca: bought from two or more distinct known brands.
    pub fn is_multimarca(&self) -> bool {
        self.brands.len() >= 2
    }

    /// Premium penetration in [0, 1]. Zero transactions → 0, never a
    /// division error.
    pub fn iaf(&self) -> f64 {
        if self.transaction_count == 0 {
            0.0
        } else {
            self.premium_count as f64 / self.transaction_count as f64
        }
    }

    /// Bought at least one premium-line product.
    pub fn is_iaf(&self) -> bool {
        self.premium_count > 0
    }
}

// ============================================================================
// ROLLUPS
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectorRollup {
    pub active_customers: u64,
    pub multimarca_customers: u64,
    pub premium_customers: u64,
    pub total_items: i64,
    pub total_value: Decimal,
}

impl SectorRollup {
    /// Presentation-time share of multimarca customers, in [0, 1].
    pub fn multimarca_rate(&self) -> f64 {
        if self.active_customers == 0 {
            0.0
        } else {
            self.multimarca_customers as f64 / self.active_customers as f64
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BrandRollup {
    pub sale_count: u64,
    pub total_items: i64,
    pub total_value: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CycleRollup {
    pub active_customers: u64,
    pub multimarca_customers: u64,
    pub total_items: i64,
    pub total_value: Decimal,
}

impl CycleRollup {
    pub fn multimarca_rate(&self) -> f64 {
        if self.active_customers == 0 {
            0.0
        } else {
            self.multimarca_customers as f64 / self.active_customers as f64
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryRollup {
    pub sale_count: u64,
    pub total_items: i64,
    pub total_value: Decimal,
}

// ============================================================================
// METRICS REPORT
// ============================================================================

/// Immutable result set for one upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsReport {
    /// One entry per customer, sorted by key
    pub customers: Vec<CustomerMetrics>,

    /// Latest cycle in the upload ("active" is relative to it)
    pub current_cycle: Option<String>,

    pub sectors: BTreeMap<String, SectorRollup>,
    pub brands: BTreeMap<String, BrandRollup>,
    pub cycles: BTreeMap<String, CycleRollup>,
    pub categories: BTreeMap<String, CategoryRollup>,

    pub grand_total_value: Decimal,
    pub grand_total_items: i64,
}

impl MetricsReport {
    pub fn customer(&self, key: &CustomerKey) -> Option<&CustomerMetrics> {
        self.customers
            .binary_search_by(|m| m.key.cmp(key))
            .ok()
            .map(|i| &self.customers[i])
    }

    pub fn customer_count(&self) -> usize {
        self.customers.len()
    }

    pub fn multimarca_count(&self) -> usize {
        self.customers.iter().filter(|m| m.is_multimarca()).count()
    }

    /// Presentation-time multimarca share across all customers, in [0, 1].
    pub fn multimarca_rate(&self) -> f64 {
        if self.customers.is_empty() {
            0.0
        } else {
            self.multimarca_count() as f64 / self.customers.len() as f64
        }
    }

    /// Customers that bought a given premium line.
    pub fn premium_customer_count(&self, line: Option<PremiumLine>) -> usize {
        self.customers
            .iter()
            .filter(|m| match line {
                Some(PremiumLine::Hair) => m.premium_hair_count > 0,
                Some(PremiumLine::Makeup) => m.premium_makeup_count > 0,
                None => m.premium_count > 0,
            })
            .count()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} customers ({} multimarca), {} cycles, total R$ {}",
            self.customers.len(),
            self.multimarca_count(),
            self.cycles.len(),
            self.grand_total_value
        )
    }
}

// ============================================================================
// AGGREGATION
// ============================================================================

/// Group the ledger by customer and compute all rollups.
///
/// Runs only over a fully materialized ledger; per-customer folds use
/// `CustomerMetrics::merge` semantics, so row order never matters.
pub fn aggregate(ledger: &Ledger) -> MetricsReport {
    let mut by_customer: BTreeMap<CustomerKey, CustomerMetrics> = BTreeMap::new();
    let mut brands: BTreeMap<String, BrandRollup> = BTreeMap::new();
    let mut categories: BTreeMap<String, CategoryRollup> = BTreeMap::new();
    let mut grand_total_value = Decimal::ZERO;
    let mut grand_total_items = 0i64;

    for tx in &ledger.transactions {
        by_customer
            .entry(tx.customer.clone())
            .and_modify(|m| m.absorb(tx))
            .or_insert_with(|| CustomerMetrics::from_transaction(tx));

        let brand = brands.entry(tx.product.brand.clone()).or_default();
        brand.sale_count += 1;
        brand.total_items += tx.quantity;
        brand.total_value += tx.value;

        let category = categories.entry(tx.product.category.clone()).or_default();
        category.sale_count += 1;
        category.total_items += tx.quantity;
        category.total_value += tx.value;

        grand_total_value += tx.value;
        grand_total_items += tx.quantity;
    }

    // Latest cycle present in the upload; lexicographic order matches the
    // zero-padded cycle identifiers ("2025-04")
    let current_cycle = by_customer
        .values()
        .flat_map(|m| m.cycles.iter())
        .max()
        .cloned();

    if let Some(ref current) = current_cycle {
        for metrics in by_customer.values_mut() {
            metrics.active = metrics.cycles.contains(current);
        }
    }

    // Customer-level rollups need the finished per-customer metrics
    let mut sectors: BTreeMap<String, SectorRollup> = BTreeMap::new();
    for metrics in by_customer.values() {
        let sector = sectors.entry(metrics.key.sector.clone()).or_default();
        sector.active_customers += 1;
        if metrics.is_multimarca() {
            sector.multimarca_customers += 1;
        }
        if metrics.is_iaf() {
            sector.premium_customers += 1;
        }
        sector.total_items += metrics.total_items;
        sector.total_value += metrics.total_value;
    }

    let mut cycles: BTreeMap<String, CycleRollup> = BTreeMap::new();
    for tx in &ledger.transactions {
        let cycle = cycles.entry(tx.cycle.clone()).or_default();
        cycle.total_items += tx.quantity;
        cycle.total_value += tx.value;
    }
    for (cycle_id, rollup) in cycles.iter_mut() {
        let mut active = 0u64;
        let mut multimarca = 0u64;
        for metrics in by_customer.values() {
            if metrics.cycles.contains(cycle_id) {
                active += 1;
                if metrics.is_multimarca() {
                    multimarca += 1;
                }
            }
        }
        rollup.active_customers = active;
        rollup.multimarca_customers = multimarca;
    }

    MetricsReport {
        customers: by_customer.into_values().collect(),
        current_cycle,
        sectors,
        brands,
        cycles,
        categories,
        grand_total_value,
        grand_total_items,
    }
}

// ============================================================================
// TESTS
// ============================================================================
