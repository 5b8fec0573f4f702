//! Seed the database with a small demo catalog.
//!
//! ```bash
//! clementine-cli seed
//! ```
//!
//! Idempotent: categories are matched by slug and products by name, so
//! running it twice does not duplicate rows.

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use secrecy::SecretString;

use clementine_api::db::coupons::NewCoupon;
use clementine_api::db::products::NewProduct;
use clementine_api::db::{self, CategoryRepository, CouponRepository, ProductRepository, RepositoryError};
use clementine_core::DiscountType;

struct SeedProduct {
    name: &'static str,
    description: &'static str,
    price: &'static str,
    category_slug: &'static str,
    stock: i32,
    featured: bool,
}

const CATEGORIES: &[(&str, &str)] = &[
    ("Kitchen", "kitchen"),
    ("Outdoors", "outdoors"),
    ("Stationery", "stationery"),
];

const PRODUCTS: &[SeedProduct] = &[
    SeedProduct {
        name: "Citrus Press",
        description: "Cast-aluminium manual citrus press.",
        price: "39.50",
        category_slug: "kitchen",
        stock: 40,
        featured: true,
    },
    SeedProduct {
        name: "Enamel Camping Mug",
        description: "Double-fired enamel mug, 350 ml.",
        price: "14.00",
        category_slug: "outdoors",
        stock: 120,
        featured: false,
    },
    SeedProduct {
        name: "Field Notebook (3-pack)",
        description: "Pocket notebooks with dot grid, 48 pages each.",
        price: "12.75",
        category_slug: "stationery",
        stock: 85,
        featured: false,
    },
    SeedProduct {
        name: "Cold Brew Bottle",
        description: "One-litre glass bottle with stainless filter.",
        price: "28.00",
        category_slug: "kitchen",
        stock: 18,
        featured: true,
    },
];

/// Seed demo categories, products and one welcome coupon.
///
/// # Errors
///
/// Returns an error if the environment is incomplete or a query fails.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("CLEMENTINE_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| "CLEMENTINE_DATABASE_URL not set")?;
    let pool = db::create_pool(&database_url).await?;

    let categories = CategoryRepository::new(&pool);
    for (name, slug) in CATEGORIES {
        match categories.create(name, slug, None).await {
            Ok(category) => tracing::info!(%slug, id = %category.id, "category created"),
            Err(RepositoryError::Conflict(_)) => tracing::info!(%slug, "category exists, skipping"),
            Err(e) => return Err(e.into()),
        }
    }
    let by_slug = categories.list().await?;

    let products = ProductRepository::new(&pool);
    let existing = products
        .list(&db::products::ProductFilter {
            include_inactive: true,
            per_page: 100,
            page: 1,
            ..Default::default()
        })
        .await?;

    for seed in PRODUCTS {
        if existing.iter().any(|p| p.name == seed.name) {
            tracing::info!(name = seed.name, "product exists, skipping");
            continue;
        }
        let category_id = by_slug
            .iter()
            .find(|c| c.slug == seed.category_slug)
            .map(|c| c.id);
        let price: Decimal = seed.price.parse()?;
        let product = products
            .create(NewProduct {
                name: seed.name,
                description: seed.description,
                price,
                compare_price: None,
                category_id,
                stock: seed.stock,
                is_active: true,
                is_featured: seed.featured,
            })
            .await?;
        tracing::info!(name = seed.name, id = %product.id, "product created");
    }

    let coupons = CouponRepository::new(&pool);
    let now = Utc::now();
    match coupons
        .create(NewCoupon {
            code: "WELCOME10",
            discount_type: DiscountType::Percentage,
            value: Decimal::from(10),
            max_discount: Some(Decimal::from(25)),
            min_order_amount: Decimal::from(20),
            valid_from: now,
            valid_until: now + Duration::days(90),
            usage_limit: None,
            per_user_limit: Some(1),
            is_active: true,
        })
        .await
    {
        Ok(coupon) => tracing::info!(code = %coupon.code, "coupon created"),
        Err(RepositoryError::Conflict(_)) => tracing::info!("coupon WELCOME10 exists, skipping"),
        Err(e) => return Err(e.into()),
    }

    tracing::info!("Seed complete");
    Ok(())
}
