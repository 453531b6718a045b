// 📂 Spreadsheet Ingestion - CSV → typed RawRow / ProductRecord
// The boundary between messy files and the core pipeline
//
// The core never opens files itself: this module (used by the CLI and the
// upload layer) validates headers, tolerates BOM and padded column names,
// and hands the pipeline an already-shaped row sequence.

use crate::catalog::{PremiumLine, ProductRecord};
use crate::ledger::RawRow;
use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::path::Path;

// ============================================================================
// SALES COLUMNS
// ============================================================================

pub const COL_SECTOR: &str = "Setor";
pub const COL_RESELLER_NAME: &str = "NomeRevendedora";
pub const COL_RESELLER_CODE: &str = "CodigoRevendedora";
pub const COL_CYCLE: &str = "CicloFaturamento";
pub const COL_PRODUCT_CODE: &str = "CodigoProduto";
pub const COL_PRODUCT_NAME: &str = "NomeProduto";
pub const COL_KIND: &str = "Tipo";
pub const COL_QUANTITY: &str = "QuantidadeItens";
pub const COL_VALUE: &str = "ValorPraticado";

/// Optional: some exports carry the brand, used only for tie-breaks.
pub const COL_BRAND: &str = "Marca";

pub const REQUIRED_COLUMNS: [&str; 9] = [
    COL_SECTOR,
    COL_RESELLER_NAME,
    COL_RESELLER_CODE,
    COL_CYCLE,
    COL_PRODUCT_CODE,
    COL_PRODUCT_NAME,
    COL_KIND,
    COL_QUANTITY,
    COL_VALUE,
];

// ============================================================================
// SALES READER
// ============================================================================

/// Read a sales spreadsheet export into raw rows.
pub fn read_sales_csv(path: &Path) -> Result<Vec<RawRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open sales file: {:?}", path))?;

    let columns = header_positions(&mut reader)
        .with_context(|| format!("Failed to read header of {:?}", path))?;

    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .filter(|c| !columns.contains_key(**c))
        .copied()
        .collect();
    if !missing.is_empty() {
        bail!("Missing required columns: {}", missing.join(", "));
    }

    let mut rows = Vec::new();

    for (i, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Failed to read row {}", i + 2))?;

        let field = |name: &str| -> String {
            columns
                .get(name)
                .and_then(|&idx| record.get(idx))
                .unwrap_or("")
                .trim()
                .to_string()
        };

        rows.push(RawRow {
            sector: field(COL_SECTOR),
            reseller_name: field(COL_RESELLER_NAME),
            reseller_code: field(COL_RESELLER_CODE),
            cycle: field(COL_CYCLE),
            product_code: field(COL_PRODUCT_CODE),
            product_name: field(COL_PRODUCT_NAME),
            brand: field(COL_BRAND),
            kind: field(COL_KIND),
            quantity: field(COL_QUANTITY),
            value: field(COL_VALUE),
        });
    }

    Ok(rows)
}

// ============================================================================
// CATALOG READER
// ============================================================================

pub const CATALOG_COL_SKU: &str = "sku";
pub const CATALOG_COL_NAME: &str = "nome";
pub const CATALOG_COL_BRAND: &str = "marca";
pub const CATALOG_COL_CATEGORY: &str = "categoria";
pub const CATALOG_COL_PREMIUM: &str = "linha_premium";

/// Read a catalog export (sku, nome, marca, optional categoria and
/// linha_premium columns) into product records.
pub fn read_catalog_csv(path: &Path) -> Result<Vec<ProductRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open catalog file: {:?}", path))?;

    let columns = header_positions(&mut reader)
        .with_context(|| format!("Failed to read header of {:?}", path))?;

    for required in [CATALOG_COL_SKU, CATALOG_COL_NAME, CATALOG_COL_BRAND] {
        if !columns.contains_key(required) {
            bail!("Catalog file is missing the {:?} column", required);
        }
    }

    let mut products = Vec::new();

    for (i, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Failed to read catalog row {}", i + 2))?;

        let field = |name: &str| -> String {
            columns
                .get(name)
                .and_then(|&idx| record.get(idx))
                .unwrap_or("")
                .trim()
                .to_string()
        };

        let sku = field(CATALOG_COL_SKU);
        if sku.is_empty() {
            continue;
        }

        let mut product = ProductRecord::new(
            &sku,
            &field(CATALOG_COL_NAME),
            &field(CATALOG_COL_BRAND),
            &field(CATALOG_COL_CATEGORY),
        );
        product.premium = PremiumLine::parse(&field(CATALOG_COL_PREMIUM));

        products.push(product);
    }

    Ok(products)
}

// ============================================================================
// HEADER HANDLING
// ============================================================================

/// Column name → index, with BOM and padding stripped from names.
fn header_positions<R: std::io::Read>(
    reader: &mut csv::Reader<R>,
) -> Result<HashMap<String, usize>> {
    let headers = reader.headers().context("File has no header row")?;

    let mut positions = HashMap::new();
    for (idx, name) in headers.iter().enumerate() {
        let cleaned = name.trim_start_matches('\u{feff}').trim().to_string();
        positions.entry(cleaned).or_insert(idx);
    }

    Ok(positions)
}

// ============================================================================
// TESTS
// ============================================================================
