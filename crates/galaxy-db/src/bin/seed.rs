//! # Seed Data Generator
//!
//! Populates a database with demo products and invoices for development.
//!
//! ## Usage
//! ```bash
//! # 200 products, 50 invoices (defaults)
//! cargo run -p galaxy-db --bin seed
//!
//! # Custom amounts and path
//! cargo run -p galaxy-db --bin seed -- --products 1000 --invoices 300 --db ./data/galaxy.db
//! ```
//!
//! Invoices are committed through [`InvoiceEngine`], so numbering, totals
//! and stock moves follow the same rules as a live terminal. The sales
//! summary is printed as JSON at the end.

use galaxy_core::{CartLine, Discount, Money, Product, TaxRate};
use galaxy_db::{Database, DbConfig};
use galaxy_engine::{EngineConfig, InvoiceEngine, SummaryFilter};
use std::env;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// (SKU code, names) per shelf
const SHELVES: &[(&str, &[&str])] = &[
    ("HW", &["Hammer", "Screwdriver Set", "Tape Measure", "Wrench", "Pliers"]),
    ("EL", &["USB Cable", "Power Strip", "LED Bulb", "Battery Pack", "Extension Cord"]),
    ("ST", &["Notebook", "Ballpoint Pen", "Stapler", "Sticky Notes", "Highlighter"]),
    ("CL", &["Dish Soap", "Sponge Pack", "Glass Cleaner", "Trash Bags", "Broom"]),
];

const SIZES: &[(&str, i64)] = &[("S", 0), ("M", 150), ("L", 300), ("XL", 500)];

const CASHIERS: &[&str] = &["alice", "bob", "carol"];

struct Args {
    db_path: String,
    products: usize,
    invoices: usize,
}

fn parse_args() -> Option<Args> {
    let args: Vec<String> = env::args().collect();
    let mut parsed = Args {
        db_path: String::from("./galaxy_dev.db"),
        products: 200,
        invoices: 50,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--products" | "-p" if i + 1 < args.len() => {
                parsed.products = args[i + 1].parse().unwrap_or(parsed.products);
                i += 1;
            }
            "--invoices" | "-i" if i + 1 < args.len() => {
                parsed.invoices = args[i + 1].parse().unwrap_or(parsed.invoices);
                i += 1;
            }
            "--db" | "-d" if i + 1 < args.len() => {
                parsed.db_path = args[i + 1].clone();
                i += 1;
            }
            "--help" | "-h" => {
                println!("Galaxy POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -p, --products <N>   Products to generate (default: 200)");
                println!("  -i, --invoices <N>   Invoices to commit (default: 50)");
                println!("  -d, --db <PATH>      Database file path (default: ./galaxy_dev.db)");
                println!("  -h, --help           Show this help message");
                return None;
            }
            _ => {}
        }
        i += 1;
    }

    Some(parsed)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,galaxy=debug,sqlx=warn")),
        )
        .init();

    let Some(args) = parse_args() else {
        return Ok(());
    };

    info!(db = %args.db_path, products = args.products, invoices = args.invoices, "Seeding");

    let db = Database::new(DbConfig::new(&args.db_path)).await?;

    let existing = db.products().count().await?;
    if existing > 0 {
        warn!(existing, "Database already has products, skipping seed");
        return Ok(());
    }

    let start = std::time::Instant::now();
    let mut ids = Vec::with_capacity(args.products);
    'outer: for (shelf_idx, (code, names)) in SHELVES.iter().enumerate() {
        for (name_idx, name) in names.iter().enumerate() {
            for (size_idx, (size, addon)) in SIZES.iter().enumerate() {
                if ids.len() >= args.products {
                    break 'outer;
                }
                let seed = shelf_idx * 100 + name_idx * 10 + size_idx;
                let product = generate_product(code, name, size, *addon, seed);
                match db.products().insert(&product).await {
                    Ok(inserted) => ids.push(inserted.id),
                    Err(e) => warn!(error = %e, "Failed to insert product"),
                }
            }
        }
    }
    info!(count = ids.len(), elapsed = ?start.elapsed(), "Products generated");

    if ids.is_empty() {
        return Ok(());
    }

    let engine = InvoiceEngine::new(db.products(), db.invoices(), EngineConfig::load(None)?);

    for n in 0..args.invoices {
        let cart: Vec<CartLine> = (0..1 + n % 4)
            .map(|k| CartLine::new(ids[(n * 7 + k * 3) % ids.len()].clone(), 1 + (k as i64 % 3)))
            .collect();

        let mut context = engine.context_for(CASHIERS[n % CASHIERS.len()]);
        if n % 3 != 0 {
            context = context.tax_rate(TaxRate::from_percent(5 * (n % 3) as u32));
        }
        if n % 5 == 0 {
            context = context.discount(Discount::percent(10));
        }
        if n % 2 == 0 {
            context = context.paid(None);
        }

        if let Err(e) = engine.commit_invoice(&cart, context).await {
            warn!(error = %e, "Failed to commit demo invoice");
        }
    }

    let summary = engine.sales_summary(&SummaryFilter::default()).await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);

    db.close().await;
    Ok(())
}

/// Generates a single product with deterministic demo data.
fn generate_product(code: &str, name: &str, size: &str, addon: i64, seed: usize) -> Product {
    let price = 199 + ((seed * 17) % 800) as i64 + addon;
    let margin_pct = 60 + (seed % 20) as i64;

    let mut product = Product::new("", format!("{name} {size}"), Money::from_cents(price), (seed % 41) as i64)
        .with_sku(format!("{code}-{seed:04}"))
        .with_barcode(format!("590{seed:010}"))
        .with_buying_price(Money::from_cents(price * margin_pct / 100));
    if seed % 3 == 0 {
        product = product.with_discount_limit_bps(2500);
    }
    product
}
