//! Synthetic sample datasets.
//!
//! Each generator takes any [`Rng`] so tests can seed it.

use rand::seq::IndexedRandom;
use rand::Rng;
use serde::Serialize;
use serde_json::{json, Value};

use super::{Dataset, Row};
use crate::error::CoreError;

pub const BUSINESS_METRICS: &str = "business_metrics";
pub const SALES_DATA: &str = "sales_data";
pub const EMPLOYEE_METRICS: &str = "employee_metrics";

/// Catalogue entry describing a built-in dataset.
#[derive(Debug, Clone, Serialize)]
pub struct SampleDatasetInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub size: usize,
    pub columns: &'static [&'static str],
}

/// The built-in datasets, in display order.
pub const CATALOGUE: [SampleDatasetInfo; 3] = [
    SampleDatasetInfo {
        name: BUSINESS_METRICS,
        description: "Comprehensive business performance data with financial, operational, and market metrics",
        size: 500,
        columns: &[
            "revenue",
            "profit",
            "employees",
            "customers",
            "customer_satisfaction",
            "market_share",
            "growth_rate",
        ],
    },
    SampleDatasetInfo {
        name: SALES_DATA,
        description: "Sales performance data by region, product, and time period",
        size: 300,
        columns: &["sales_amount", "units_sold", "region", "product", "quarter", "year"],
    },
    SampleDatasetInfo {
        name: EMPLOYEE_METRICS,
        description: "HR metrics including satisfaction, productivity, and retention data",
        size: 200,
        columns: &[
            "employee_id",
            "department",
            "satisfaction_score",
            "productivity_score",
            "salary",
            "tenure_years",
        ],
    },
];

const COMPANIES: &[&str] = &[
    "TechCorp", "DataInc", "CloudSys", "AILabs", "DevOps", "SecureNet", "WebFlow", "AppForge",
];
const DEPARTMENTS: &[&str] = &[
    "Engineering", "Sales", "Marketing", "HR", "Finance", "Operations", "Support", "Research",
];
const REGIONS: &[&str] = &[
    "North America", "Europe", "Asia Pacific", "Latin America", "Middle East", "Africa",
];
const PRODUCT_CATEGORIES: &[&str] = &[
    "Software", "Hardware", "Services", "Consulting", "Support", "Training",
];
const SALES_REGIONS: &[&str] = &["North", "South", "East", "West", "Central"];
const PRODUCTS: &[&str] = &["Product A", "Product B", "Product C", "Product D", "Product E"];
const POSITIONS: &[&str] = &["Junior", "Mid-level", "Senior", "Lead", "Manager", "Director"];
const YEARS: &[i64] = &[2023, 2024, 2025];

/// Generate a sample dataset by catalogue name at its catalogue size.
pub fn generate<R: Rng + ?Sized>(name: &str, rng: &mut R) -> Result<Dataset, CoreError> {
    match name {
        BUSINESS_METRICS => Ok(business_metrics(500, rng)),
        SALES_DATA => Ok(sales_data(300, rng)),
        EMPLOYEE_METRICS => Ok(employee_metrics(200, rng)),
        other => Err(CoreError::NotFound {
            entity: "Dataset",
            id: other.to_string(),
        }),
    }
}

fn round(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

fn pick<'a, R: Rng + ?Sized>(items: &'a [&'a str], rng: &mut R) -> &'a str {
    items.choose(rng).copied().unwrap_or_default()
}

fn into_row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        _ => Row::new(),
    }
}

/// Business performance metrics with loosely correlated fields.
pub fn business_metrics<R: Rng + ?Sized>(rows: usize, rng: &mut R) -> Dataset {
    let generated_at = chrono::Utc::now().to_rfc3339();
    let data = (0..rows)
        .map(|i| {
            let revenue: f64 = rng.random_range(10_000.0..1_000_000.0);
            let margin: f64 = rng.random_range(0.05..0.30);
            let profit = revenue * margin;
            let employees: i64 = rng.random_range(10..=1000);
            let productivity = rng.random_range(50.0..150.0) + employees as f64 / 20.0;
            let quarter: i64 = rng.random_range(1..=4);
            let year = *YEARS.choose(rng).unwrap_or(&2024);
            let customers: i64 = rng.random_range(100..=10_000);

            let tier = if margin > 0.20 {
                "High"
            } else if margin > 0.10 {
                "Medium"
            } else {
                "Low"
            };
            let company_size = if employees > 500 {
                "Large"
            } else if employees > 100 {
                "Medium"
            } else {
                "Small"
            };

            into_row(json!({
                "id": i,
                "company": pick(COMPANIES, rng),
                "department": pick(DEPARTMENTS, rng),
                "region": pick(REGIONS, rng),
                "product_category": pick(PRODUCT_CATEGORIES, rng),
                "revenue": round(revenue, 2),
                "profit": round(profit, 2),
                "profit_margin": round(margin * 100.0, 2),
                "employees": employees,
                "productivity_score": round(productivity, 1),
                "customers": customers,
                "customer_satisfaction": round(rng.random_range(1.0..10.0), 1),
                "retention_rate": round(rng.random_range(0.60..0.95) * 100.0, 1),
                "market_share": round(rng.random_range(0.01..0.25) * 100.0, 2),
                "growth_rate": round(rng.random_range(-0.10..0.50) * 100.0, 1),
                "year": year,
                "quarter": quarter,
                "quarter_year": format!("Q{quarter} {year}"),
                "size_metric": round(revenue / 1000.0, 1),
                "efficiency": round(profit / employees as f64, 2),
                "revenue_per_customer": round(revenue / customers as f64, 2),
                "performance_tier": tier,
                "company_size": company_size,
                "region_category": if rng.random_bool(0.5) { "Developed" } else { "Emerging" },
                "marketing_spend": round(revenue * rng.random_range(0.05..0.15), 2),
                "rd_spend": round(revenue * rng.random_range(0.02..0.12), 2),
                "employee_satisfaction": round(rng.random_range(6.0..10.0), 1),
                "innovation_index": round(rng.random_range(1.0..100.0), 1),
                "last_updated": generated_at,
            }))
        })
        .collect();
    Dataset::from_rows(data)
}

/// Sales performance by region and product.
pub fn sales_data<R: Rng + ?Sized>(rows: usize, rng: &mut R) -> Dataset {
    let data = (0..rows)
        .map(|i| {
            let sales: f64 = rng.random_range(10_000.0..100_000.0);
            let units: i64 = rng.random_range(100..=1000);
            into_row(json!({
                "id": i,
                "sales_amount": round(sales, 2),
                "units_sold": units,
                "price_per_unit": round(sales / units as f64, 2),
                "region": pick(SALES_REGIONS, rng),
                "product": pick(PRODUCTS, rng),
                "quarter": rng.random_range(1..=4),
                "year": *YEARS.choose(rng).unwrap_or(&2024),
                "salesperson": format!("Rep_{}", rng.random_range(1..=50)),
                "commission": round(sales * rng.random_range(0.05..0.15), 2),
                "customer_type": pick(&["Enterprise", "SMB", "Individual"], rng),
                "sales_channel": pick(&["Direct", "Partner", "Online"], rng),
                "discount_rate": round(rng.random_range(0.0..0.20), 3),
                "profit_margin": round(rng.random_range(0.10..0.40), 3),
            }))
        })
        .collect();
    Dataset::from_rows(data)
}

/// Employee HR metrics.
pub fn employee_metrics<R: Rng + ?Sized>(rows: usize, rng: &mut R) -> Dataset {
    let data = (0..rows)
        .map(|i| {
            into_row(json!({
                "employee_id": format!("EMP_{i:04}"),
                "department": pick(&DEPARTMENTS[..6], rng),
                "position": pick(POSITIONS, rng),
                "satisfaction_score": round(rng.random_range(1.0..10.0), 1),
                "productivity_score": round(rng.random_range(60.0..100.0), 1),
                "salary": round(rng.random_range(40_000.0..200_000.0), 2),
                "tenure_years": round(rng.random_range(0.5..15.0), 1),
                "age": rng.random_range(22..=65),
                "training_hours": rng.random_range(0..=100),
                "performance_rating": round(rng.random_range(2.0..5.0), 1),
                "bonus_percentage": round(rng.random_range(0.0..0.25), 3),
                "remote_work_days": rng.random_range(0..=5),
                "overtime_hours": rng.random_range(0..=20),
                "certifications": rng.random_range(0..=8),
                "promotion_eligible": rng.random_bool(0.5),
            }))
        })
        .collect();
    Dataset::from_rows(data)
}
