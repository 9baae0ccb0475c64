//! # Seed Data Generator
//!
//! Populates a local store with mirror data and pending operations for
//! development.
//!
//! ## Usage
//! ```bash
//! # 200 products, a few movements each, 5 pending operations
//! cargo run -p depot-db --bin seed
//!
//! # Custom amounts
//! cargo run -p depot-db --bin seed -- --products 1000 --pending 25
//!
//! # Specify database path
//! cargo run -p depot-db --bin seed -- --db ./data/depot.db
//! ```
//!
//! Products get ids `seed-p-NNNN`, SKUs `{CATEGORY}-NNNN` and a stock level
//! derived from their movements. Pending operations are stock adjustments
//! against the seeded products, so a sync cycle against a dev server has
//! something to replay.

use depot_core::{Movement, Operation, Product};
use depot_db::{Collection, LocalStore, StoreConfig};
use serde_json::{json, Map, Value};
use std::env;
use uuid::Uuid;

/// Categories and item names for realistic test data.
const CATEGORIES: &[(&str, &[&str])] = &[
    (
        "FAS",
        &[
            "Hex Bolt M6",
            "Hex Bolt M8",
            "Wing Nut",
            "Flat Washer",
            "Lock Washer",
            "Wood Screw",
            "Drywall Anchor",
        ],
    ),
    (
        "ELC",
        &[
            "Cable Tie",
            "Wire Nut",
            "Heat Shrink",
            "Terminal Block",
            "Fuse 5A",
        ],
    ),
    (
        "PLB",
        &["PTFE Tape", "Hose Clamp", "Ball Valve", "Elbow 90", "Tee Fitting"],
    ),
    (
        "TLS",
        &["Utility Blade", "Drill Bit 6mm", "Sanding Disc", "Tape Measure"],
    ),
];

/// Movement types the inventory server understands.
const MOVEMENT_TYPES: &[&str] = &["in", "out", "adjustment"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut product_count: usize = 200;
    let mut pending_count: usize = 5;
    let mut db_path = String::from("./depot_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--products" | "-p" => {
                if i + 1 < args.len() {
                    product_count = args[i + 1].parse().unwrap_or(product_count);
                    i += 1;
                }
            }
            "--pending" | "-q" => {
                if i + 1 < args.len() {
                    pending_count = args[i + 1].parse().unwrap_or(pending_count);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Depot Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -p, --products <N>  Products to mirror (default: 200)");
                println!("  -q, --pending <N>   Pending operations to queue (default: 5)");
                println!("  -d, --db <PATH>     Database file path (default: ./depot_dev.db)");
                println!("  -h, --help          Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Depot Seed Data Generator");
    println!("=========================");
    println!("Database: {}", db_path);
    println!("Products: {}", product_count);
    println!("Pending:  {}", pending_count);
    println!();

    let store = LocalStore::open(StoreConfig::new(&db_path)).await?;
    println!("✓ Opened store (migrations applied)");

    let existing = store.products().count().await?;
    if existing > 0 {
        println!("⚠ Store already mirrors {} products", existing);
        println!("  Skipping seed to avoid mixing data sets.");
        println!("  Delete the database file to regenerate.");
        store.close().await;
        return Ok(());
    }

    let start = std::time::Instant::now();

    let names: Vec<(&str, &str)> = CATEGORIES
        .iter()
        .flat_map(|(code, items)| items.iter().map(move |name| (*code, *name)))
        .collect();

    let mut products = Vec::with_capacity(product_count);
    let mut movements = Vec::new();

    for seed in 0..product_count {
        let (category, name) = names[seed % names.len()];
        let product_movements = generate_movements(seed);
        let stock = product_movements.iter().map(signed_quantity).sum::<f64>();
        products.push(generate_product(category, name, seed, stock));
        movements.extend(product_movements);
    }

    // Same shape as a bulk refresh: both mirrors in one transaction.
    store
        .transaction(&[Collection::Products, Collection::Movements], |batch| {
            batch.bulk_put(Collection::Products, &products)?;
            batch.bulk_put(Collection::Movements, &movements)
        })
        .await?;

    println!(
        "✓ Mirrored {} products and {} movements",
        products.len(),
        movements.len()
    );

    for (n, product) in products.iter().take(pending_count).enumerate() {
        let op = Operation::post(
            "/api/inventory/movement",
            json!({
                "productId": product.id,
                "type": "adjustment",
                "quantity": (n as i64 % 3) + 1,
                "note": "seeded offline adjustment"
            }),
        );
        store.queue().enqueue(op).await?;
    }

    println!("✓ Queued {} pending operations", store.queue().count().await?);
    println!();
    println!("✓ Seed complete in {:?}", start.elapsed());

    store.close().await;
    Ok(())
}

/// Generates a product mirror record.
fn generate_product(category: &str, name: &str, seed: usize, stock: f64) -> Product {
    let fields = json!({
        "name": name,
        "sku": format!("{}-{:04}", category, seed),
        "category": { "_id": format!("seed-c-{}", category), "name": category },
        "currentStock": stock.max(0.0) as i64,
        "reorderLevel": 5 + (seed % 10),
        "unit": "pcs"
    });

    Product {
        id: format!("seed-p-{:04}", seed),
        fields: as_map(fields),
    }
}

/// Generates between one and four movements for a product.
fn generate_movements(seed: usize) -> Vec<Movement> {
    let count = 1 + seed % 4;
    (0..count)
        .map(|n| {
            // The first movement always stocks the item.
            let kind = if n == 0 {
                "in"
            } else {
                MOVEMENT_TYPES[(seed + n) % MOVEMENT_TYPES.len()]
            };
            let fields = json!({
                "productId": format!("seed-p-{:04}", seed),
                "type": kind,
                "quantity": (seed * 7 + n * 13) % 40 + 1,
                "timestamp": chrono::Utc::now().to_rfc3339()
            });
            Movement {
                id: Uuid::new_v4().to_string(),
                fields: as_map(fields),
            }
        })
        .collect()
}

fn as_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn signed_quantity(movement: &Movement) -> f64 {
    let qty = movement.quantity().unwrap_or(0.0);
    match movement.kind() {
        Some("out") => -qty,
        _ => qty,
    }
}
