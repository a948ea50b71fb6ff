//! Demo data for local development.

use anyhow::{Context, Result};
use sqlx::{Pool, Sqlite};
use swap_core::auth;
use swap_core::images::{ImageInput, ImageSet};

use crate::posts::{insert_listing, ListingFields};
use crate::users::{insert_user, NewUser};

pub const TEST_USER_EMAIL: &str = "test@example.com";
pub const TEST_USER_PASSWORD: &str = "password123";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    pub test_user_created: bool,
    pub listings_created: usize,
}

struct SampleListing {
    title: &'static str,
    category: &'static str,
    price: f64,
    condition: &'static str,
    description: &'static str,
    image_url: &'static str,
}

const SAMPLE_LISTINGS: [SampleListing; 3] = [
    SampleListing {
        title: "Santa Cruz Classic Dot Deck",
        category: "decks",
        price: 65.0,
        condition: "excellent",
        description: "8.25\" deck, ridden a handful of times. Grip still sharp.",
        image_url: "https://images.unsplash.com/photo-1547447134-cd3f5c716030?w=800",
    },
    SampleListing {
        title: "Independent Stage 11 Trucks",
        category: "trucks",
        price: 45.0,
        condition: "good",
        description: "149mm hangers, new bushings. Some scuffs on the baseplates.",
        image_url: "https://images.unsplash.com/photo-1520045892732-304bc3ac5d8e?w=800",
    },
    SampleListing {
        title: "Spitfire Formula Four Wheels",
        category: "wheels",
        price: 35.0,
        condition: "like-new",
        description: "54mm 99a classic shape. Barely any coning.",
        image_url: "https://images.unsplash.com/photo-1564982752979-3f7bc974d29a?w=800",
    },
];

pub async fn seed(pool: &Pool<Sqlite>) -> Result<SeedReport> {
    let user_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;

    let mut test_user_created = false;
    if user_count == 0 {
        let password_hash = auth::hash_password(TEST_USER_PASSWORD)?;
        insert_user(
            pool,
            &NewUser {
                first_name: "Test",
                last_name: "User",
                username: "testuser",
                email: TEST_USER_EMAIL,
                password_hash: &password_hash,
                location: Some("Nairobi, Kenya"),
            },
        )
        .await
        .context("failed to create test user")?;
        test_user_created = true;
        tracing::info!(email = TEST_USER_EMAIL, "test user created");
    }

    let test_user_id: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE email = ?")
        .bind(TEST_USER_EMAIL)
        .fetch_optional(pool)
        .await?;
    let Some(test_user_id) = test_user_id else {
        tracing::info!("users exist without the test user; skipping sample listings");
        return Ok(SeedReport {
            test_user_created,
            listings_created: 0,
        });
    };

    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE seller_id = ?")
        .bind(test_user_id)
        .fetch_one(pool)
        .await?;
    if existing > 0 {
        return Ok(SeedReport {
            test_user_created,
            listings_created: 0,
        });
    }

    let mut tx = pool.begin().await?;
    for sample in &SAMPLE_LISTINGS {
        let fields = ListingFields {
            title: sample.title.to_string(),
            category: sample.category.to_string(),
            price: sample.price,
            condition: sample.condition.to_string(),
            description: sample.description.to_string(),
            location: "Nairobi, Kenya".to_string(),
        };
        let images = ImageSet::from_input(
            &ImageInput::Many(vec![sample.image_url.to_string()]),
            None,
        );
        insert_listing(&mut *tx, test_user_id, &fields, &images)
            .await
            .with_context(|| format!("failed to insert sample listing {}", sample.title))?;
    }
    tx.commit().await?;
    tracing::info!(count = SAMPLE_LISTINGS.len(), "sample listings created");

    Ok(SeedReport {
        test_user_created,
        listings_created: SAMPLE_LISTINGS.len(),
    })
}
