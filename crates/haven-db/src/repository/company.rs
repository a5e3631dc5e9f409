//! # Company Directory Repository
//!
//! Database operations for companies, units, and tenants. These are the
//! static directory records the billing pipeline reads; the pipeline never
//! mutates them.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use haven_core::{Company, Tenant, Unit};

/// Repository for company, unit, and tenant records.
#[derive(Debug, Clone)]
pub struct CompanyRepository {
    pool: SqlitePool,
}

impl CompanyRepository {
    /// Creates a new CompanyRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CompanyRepository { pool }
    }

    // -------------------------------------------------------------------------
    // Companies
    // -------------------------------------------------------------------------

    /// Creates a company. `tax_rate_bps` is the flat consumption tax rate in
    /// basis points (e.g. 1000 = 10%).
    pub async fn create_company(&self, name: &str, tax_rate_bps: u32) -> DbResult<Company> {
        let company = Company {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            tax_rate_bps: i64::from(tax_rate_bps),
            created_at: Utc::now(),
        };

        debug!(id = %company.id, name = %company.name, "Creating company");

        sqlx::query(
            r#"
            INSERT INTO companies (id, name, tax_rate_bps, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(&company.id)
        .bind(&company.name)
        .bind(company.tax_rate_bps)
        .bind(company.created_at)
        .execute(&self.pool)
        .await?;

        Ok(company)
    }

    /// Gets a company by ID.
    pub async fn get_company(&self, id: &str) -> DbResult<Option<Company>> {
        let company = sqlx::query_as::<_, Company>("SELECT * FROM companies WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(company)
    }

    /// Lists all companies. Trigger runs iterate this.
    pub async fn list_companies(&self) -> DbResult<Vec<Company>> {
        let companies = sqlx::query_as::<_, Company>("SELECT * FROM companies ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        Ok(companies)
    }

    // -------------------------------------------------------------------------
    // Units
    // -------------------------------------------------------------------------

    /// Creates a unit. `area_csqm` is floor area in hundredths of a square
    /// meter, `None` when unmeasured.
    pub async fn create_unit(
        &self,
        company_id: &str,
        name: &str,
        area_csqm: Option<i64>,
    ) -> DbResult<Unit> {
        let unit = Unit {
            id: Uuid::new_v4().to_string(),
            company_id: company_id.to_string(),
            name: name.to_string(),
            area_csqm,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO units (id, company_id, name, area_csqm, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&unit.id)
        .bind(&unit.company_id)
        .bind(&unit.name)
        .bind(unit.area_csqm)
        .bind(unit.created_at)
        .execute(&self.pool)
        .await?;

        Ok(unit)
    }

    /// Gets a unit by ID.
    pub async fn get_unit(&self, id: &str) -> DbResult<Option<Unit>> {
        let unit = sqlx::query_as::<_, Unit>("SELECT * FROM units WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(unit)
    }

    // -------------------------------------------------------------------------
    // Tenants
    // -------------------------------------------------------------------------

    /// Creates a tenant. Email and phone are the contact snapshots the
    /// notification producers read at enqueue time.
    pub async fn create_tenant(
        &self,
        company_id: &str,
        name: &str,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> DbResult<Tenant> {
        let tenant = Tenant {
            id: Uuid::new_v4().to_string(),
            company_id: company_id.to_string(),
            name: name.to_string(),
            email: email.map(str::to_string),
            phone: phone.map(str::to_string),
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO tenants (id, company_id, name, email, phone, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&tenant.id)
        .bind(&tenant.company_id)
        .bind(&tenant.name)
        .bind(&tenant.email)
        .bind(&tenant.phone)
        .bind(tenant.created_at)
        .execute(&self.pool)
        .await?;

        Ok(tenant)
    }

    /// Gets a tenant by ID.
    pub async fn get_tenant(&self, id: &str) -> DbResult<Option<Tenant>> {
        let tenant = sqlx::query_as::<_, Tenant>("SELECT * FROM tenants WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(tenant)
    }
}
