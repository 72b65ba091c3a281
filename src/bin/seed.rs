use chrono::Duration;
use food_delivery_api::{
    config::AppConfig,
    db::{MIGRATIONS_DIR, create_orm_conn, run_migrations},
    middleware::auth::{AuthUser, issue_token},
    models::Role,
};
use rust_decimal::Decimal;
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let orm = create_orm_conn(&config.database_url).await?;
    run_migrations(&orm, MIGRATIONS_DIR).await?;
    let pool = orm.get_postgres_connection_pool();

    let accounts = [
        ("Admin", "admin@example.com", Role::Admin),
        ("Erin Employee", "erin@example.com", Role::Employee),
        ("Eli Employee", "eli@example.com", Role::Employee),
        ("Casey Customer", "casey@example.com", Role::User),
    ];
    let mut users = Vec::with_capacity(accounts.len());
    for (name, email, role) in accounts {
        let user_id = ensure_user(pool, name, email, role).await?;
        users.push((email, AuthUser { user_id, role }));
    }

    seed_foods(pool).await?;
    seed_settings(pool).await?;

    println!("Seed completed. Development tokens (24h):");
    for (email, user) in &users {
        let token = issue_token(user, &config.jwt_secret, Duration::hours(24))?;
        println!("  {email} ({}): {token}", user.role.as_str());
    }
    Ok(())
}

async fn ensure_user(
    pool: &sqlx::PgPool,
    name: &str,
    email: &str,
    role: Role,
) -> anyhow::Result<Uuid> {
    let (user_id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, name, email, role)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role, is_active = TRUE
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(email)
    .bind(role.as_str())
    .fetch_one(pool)
    .await?;

    println!("Ensured user {email} (role={})", role.as_str());
    Ok(user_id)
}

async fn seed_foods(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let foods = [
        ("Margherita Pizza", "Pizza", Decimal::new(1000, 2)),
        ("Garlic Bread", "Sides", Decimal::new(500, 2)),
        ("Caesar Salad", "Salads", Decimal::new(850, 2)),
        ("Lemonade", "Drinks", Decimal::new(325, 2)),
    ];

    for (name, category, price) in foods {
        sqlx::query(
            r#"
            INSERT INTO foods (id, name, category, price)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(category)
        .bind(price)
        .execute(pool)
        .await?;
    }

    println!("Seeded foods");
    Ok(())
}

async fn seed_settings(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let promos = serde_json::json!([
        { "code": "WELCOME10", "type": "percentage", "value": "10", "is_active": true },
        { "code": "FIVEOFF", "type": "fixed", "value": "5.00", "is_active": true }
    ]);

    sqlx::query(
        r#"
        INSERT INTO settings (id, delivery_fee, tax_rate, promos)
        VALUES (1, $1, $2, $3)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(Decimal::new(300, 2))
    .bind(Decimal::new(8, 0))
    .bind(promos)
    .execute(pool)
    .await?;

    println!("Seeded settings");
    Ok(())
}
