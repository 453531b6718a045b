// Multimarks Engine - Core Library
// Reconciliation and metrics core for reseller sales analytics

pub mod normalizer;
pub mod catalog;
pub mod classifier;
pub mod matcher;
pub mod ledger;
pub mod metrics;
pub mod audit;
pub mod pipeline;
pub mod ingest;
pub mod store;

// Re-export commonly used types
pub use normalizer::{KeyKind, NormalizedKey, Normalizer, UNKNOWN_BRAND};
pub use catalog::{CatalogHandle, CatalogIndex, PremiumLine, ProductRecord};
pub use classifier::{CategoryClassifier, CategoryRule, DEFAULT_CATEGORY};
pub use matcher::{MatchResult, Matcher};
pub use ledger::{
    build_ledger, CustomerKey, Ledger, ProcessingError, RawRow, RejectReason, RejectedRow,
    Transaction, SALE_KIND,
};
pub use metrics::{
    aggregate, BrandRollup, CategoryRollup, CustomerMetrics, CycleRollup, MetricsReport,
    SectorRollup,
};
pub use audit::{AuditCategory, AuditEntry, AuditReport, AuditReporter};
pub use pipeline::{process_upload, EngineConfig, UploadOutcome, UploadStats};
pub use ingest::{read_catalog_csv, read_sales_csv};
pub use store::{
    load_products, persist_outcome, product_count, query_audit_entries, query_customer_metrics,
    replace_products, setup_database,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
