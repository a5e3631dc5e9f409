//! Shared fixtures for repository tests. In-memory database, one company
//! with a unit, tenant, active lease, and a small fee catalog.

use chrono::NaiveDate;

use crate::pool::{Database, DbConfig};
use haven_core::{Company, FeeKind, FeeType, Lease, Tenant, Unit};

pub(crate) struct Fixture {
    pub db: Database,
    pub company: Company,
    pub unit: Unit,
    pub tenant: Tenant,
    pub lease: Lease,
    pub rent: FeeType,
    pub water: FeeType,
}

pub(crate) fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub(crate) async fn fixture() -> Fixture {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();

    let company = db
        .companies()
        .create_company("Test PM", 1000)
        .await
        .unwrap();
    let unit = db
        .companies()
        .create_unit(&company.id, "101", Some(5000))
        .await
        .unwrap();
    let tenant = db
        .companies()
        .create_tenant(
            &company.id,
            "Tanaka",
            Some("tanaka@example.com"),
            Some("080-0000-0001"),
        )
        .await
        .unwrap();
    let lease = db
        .leases()
        .create_lease(
            &company.id,
            &unit.id,
            &tenant.id,
            date(2025, 4, 1),
            date(2027, 3, 31),
        )
        .await
        .unwrap();

    let rent = db
        .fees()
        .create_fee_type(&company.id, "Rent", FeeKind::Fixed, Some(85_000), None, 0)
        .await
        .unwrap();
    let water = db
        .fees()
        .create_fee_type(&company.id, "Water", FeeKind::Metered, None, Some(500), 1)
        .await
        .unwrap();

    Fixture {
        db,
        company,
        unit,
        tenant,
        lease,
        rent,
        water,
    }
}
