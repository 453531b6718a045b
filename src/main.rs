use anyhow::{bail, Result};
use rusqlite::Connection;
use std::env;
use std::path::Path;

// Use library instead of local modules
use multimarks_engine::{
    load_products, persist_outcome, process_upload, product_count, query_audit_entries,
    query_customer_metrics, read_catalog_csv, read_sales_csv, replace_products, setup_database,
    CatalogIndex, EngineConfig, Normalizer,
};

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("import-catalog") if args.len() == 4 => run_import_catalog(&args[2], &args[3]),
        Some("process") if args.len() == 4 => run_process(&args[2], &args[3]),
        Some("report") if args.len() >= 3 => run_report(&args[2], args.get(3).map(String::as_str)),
        _ => {
            eprintln!("Usage:");
            eprintln!("  multimarks import-catalog <db> <catalog.csv>");
            eprintln!("  multimarks process <db> <sales.csv>");
            eprintln!("  multimarks report <db> [cycle]");
            std::process::exit(1);
        }
    }
}

fn run_import_catalog(db_path: &str, csv_path: &str) -> Result<()> {
    println!("🗄️  Catalog Import - CSV → SQLite");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    println!("\n📂 Loading catalog...");
    let products = read_catalog_csv(Path::new(csv_path))?;
    println!("✓ Loaded {} products from CSV", products.len());

    println!("\n🔧 Setting up database...");
    let mut conn = Connection::open(db_path)?;
    setup_database(&conn)?;
    println!("✓ Database initialized with WAL mode");

    println!("\n💾 Importing products...");
    let imported = replace_products(&mut conn, &products)?;

    let count = product_count(&conn)?;
    println!("✓ Database contains {} products", count);

    let index = CatalogIndex::build(products, &Normalizer::new());
    println!("✓ Catalog version {}", &index.version()[..12]);

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✅ Import complete: {} products", imported);

    Ok(())
}

fn run_process(db_path: &str, csv_path: &str) -> Result<()> {
    println!("📊 Upload Processing - reconciliation + metrics");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let mut conn = Connection::open(db_path)?;
    setup_database(&conn)?;

    println!("\n📇 Loading catalog...");
    let products = load_products(&conn)?;
    if products.is_empty() {
        println!("⚠️  Catalog is empty - run import-catalog first; every row will be unmatched");
    } else {
        println!("✓ Catalog loaded: {} products", products.len());
    }
    let index = CatalogIndex::build(products, &Normalizer::new());

    println!("\n📂 Loading sales spreadsheet...");
    let rows = read_sales_csv(Path::new(csv_path))?;
    println!("✓ Loaded {} rows", rows.len());

    println!("\n⚙️  Processing...");
    let outcome = match process_upload(&rows, &index, &EngineConfig::default()) {
        Ok(outcome) => outcome,
        Err(err) => bail!("Processing aborted: {}", err),
    };

    println!("✓ {}", outcome.stats.summary());
    println!("✓ {}", outcome.metrics.summary());
    println!("✓ {}", outcome.audit.summary());

    for warning in &outcome.warnings {
        println!("⚠️  {}", warning);
    }

    println!("\n💾 Persisting results...");
    persist_outcome(&mut conn, &outcome)?;
    println!("✓ Upload {} persisted", &outcome.upload_id[..8]);

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✅ Processing complete");

    Ok(())
}

fn run_report(db_path: &str, cycle: Option<&str>) -> Result<()> {
    let conn = Connection::open(db_path)?;

    let metrics = query_customer_metrics(&conn, cycle)?;
    println!("📈 {} customers{}", metrics.len(), match cycle {
        Some(c) => format!(" in cycle {}", c),
        None => String::new(),
    });

    for m in metrics.iter().take(20) {
        println!(
            "  {} @ {} | {} brand(s){} | R$ {} | {} items",
            m.reseller,
            m.sector,
            m.brand_count,
            if m.is_multimarca { " [multimarca]" } else { "" },
            m.total_value,
            m.total_items,
        );
    }

    let audit = query_audit_entries(&conn, cycle)?;
    if !audit.is_empty() {
        println!("\n🔎 {} unresolved SKUs", audit.len());
        for entry in audit.iter().take(20) {
            println!(
                "  {} | {} | {} occurrence(s) | R$ {}",
                entry.sku_key, entry.category, entry.occurrences, entry.total_value,
            );
        }
    }

    Ok(())
}
