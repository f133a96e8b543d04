use food_order_api::{config::AppConfig, db::{create_orm_conn, run_migrations}};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let database_url = match AppConfig::from_env() {
        Ok(config) => config.database_url,
        // Only the database is needed here; the rest of the config may be absent.
        Err(_) => std::env::var("DATABASE_URL")?,
    };
    let orm = create_orm_conn(&database_url).await?;
    run_migrations(&orm).await?;
    println!("Migrations applied");
    Ok(())
}
