//! # Seed Data Generator
//!
//! Populates the database with a demo property portfolio for development.
//!
//! ## Usage
//! ```bash
//! # Seed the default dev database
//! cargo run -p haven-db --bin seed
//!
//! # Specify database path
//! cargo run -p haven-db --bin seed -- --db ./data/haven.db
//!
//! # More units per building
//! cargo run -p haven-db --bin seed -- --units 40
//! ```
//!
//! ## Generated Data
//! - One management company (10% consumption tax)
//! - N units with realistic floor areas
//! - One tenant and active lease per unit
//! - Fee types: rent (fixed), common area (per m²), water (metered),
//!   parking (custom via override)
//! - A first water meter reading per unit
//! - Notification settings with SMS reminders disabled

use chrono::{Datelike, NaiveDate, Utc};
use std::env;

use haven_core::{Channel, FeeKind, NotificationType, ReadingSource};
use haven_core::metering::NewMeterReading;
use haven_db::{Database, DbConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut unit_count: usize = 12;
    let mut db_path = String::from("./haven_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--units" | "-u" => {
                if i + 1 < args.len() {
                    unit_count = args[i + 1].parse().unwrap_or(12);
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
                println!("Haven PMS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -u, --units <N>    Number of units to generate (default: 12)");
                println!("  -d, --db <PATH>    Database file path (default: ./haven_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Haven PMS Seed Data Generator");
    println!("================================");
    println!("Database: {}", db_path);
    println!("Units:    {}", unit_count);
    println!();

    let config = DbConfig::new(&db_path);
    let db = Database::new(config).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    if !db.companies().list_companies().await?.is_empty() {
        println!("⚠ Database already has companies");
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let company = db
        .companies()
        .create_company("Sakura Property Management", 1000)
        .await?;
    println!("✓ Company: {}", company.name);

    // Fee catalog
    let rent = db
        .fees()
        .create_fee_type(&company.id, "Rent", FeeKind::Fixed, Some(85_000), None, 0)
        .await?;
    db.fees()
        .create_fee_type(
            &company.id,
            "Common Area Fee",
            FeeKind::PerSqm,
            None,
            Some(250),
            1,
        )
        .await?;
    let water = db
        .fees()
        .create_fee_type(&company.id, "Water", FeeKind::Metered, None, Some(500), 2)
        .await?;
    let parking = db
        .fees()
        .create_fee_type(&company.id, "Parking", FeeKind::Custom, None, None, 3)
        .await?;
    println!("✓ Fee types: rent, common area, water, parking");

    let today = Utc::now().date_naive();
    let lease_start = NaiveDate::from_ymd_opt(today.year() - 1, today.month(), 1)
        .unwrap_or(today);

    for n in 0..unit_count {
        let unit_name = format!("{}0{}", n / 4 + 1, n % 4 + 1);
        // 38.50 m² .. 72.50 m² in centisquare-meters
        let area_csqm = 3850 + ((n * 310) % 3400) as i64;

        let unit = db
            .companies()
            .create_unit(&company.id, &unit_name, Some(area_csqm))
            .await?;

        let phone = format!("080-0000-{:04}", n + 1);
        let tenant = db
            .companies()
            .create_tenant(
                &company.id,
                &format!("Tenant {}", unit_name),
                Some(&format!("tenant{}@example.com", n + 1)),
                // Every third tenant has no phone on file
                if n % 3 == 0 { None } else { Some(&phone) },
            )
            .await?;

        let lease_end = NaiveDate::from_ymd_opt(
            lease_start.year() + 2,
            lease_start.month(),
            lease_start.day(),
        )
        .unwrap_or(lease_start);

        db.leases()
            .create_lease(&company.id, &unit.id, &tenant.id, lease_start, lease_end)
            .await?;

        // Every fourth unit rents a parking space
        if n % 4 == 0 {
            db.fees()
                .upsert_override(&unit.id, &parking.id, Some(12_000), None, true)
                .await?;
        }

        // Corner units get discounted rent
        if n % 4 == 3 {
            db.fees()
                .upsert_override(&unit.id, &rent.id, Some(80_000), None, true)
                .await?;
        }

        // First water reading, staff entry
        db.meters()
            .insert_reading(&NewMeterReading {
                company_id: company.id.clone(),
                unit_id: unit.id.clone(),
                fee_type_id: water.id.clone(),
                reading_date: lease_start,
                previous_value: 0,
                current_value: (100 + n * 7) as i64,
                unit_price_minor: 500,
                recorded_by: "seed".to_string(),
                source: ReadingSource::Staff,
            })
            .await?;
    }

    println!("✓ {} units with tenants, leases, and water meters", unit_count);

    db.notifications()
        .upsert_settings(&company.id, "Sakura PM Office", Some("office@sakura-pm.example.com"))
        .await?;
    db.notifications()
        .set_rule(
            &company.id,
            Channel::Sms,
            NotificationType::PaymentReminder,
            false,
        )
        .await?;
    println!("✓ Notification settings (SMS payment reminders disabled)");

    println!();
    println!("✓ Seed complete!");

    Ok(())
}
