use chrono::Utc;
use food_order_api::{
    db::{create_orm_conn, run_migrations},
    entity::{
        menus::{ActiveModel as MenuActive, Column as MenuCol, Entity as Menus},
        users::{ActiveModel as UserActive, Column as UserCol, Entity as Users},
    },
};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL")?;

    let orm = create_orm_conn(&database_url).await?;
    // Ensure migrations are applied.
    run_migrations(&orm).await?;

    let admin_id = ensure_user(&orm, "admin@example.com", "Admin", None, "admin").await?;
    let user_id = ensure_user(
        &orm,
        "customer@example.com",
        "Demo Customer",
        Some("12 Allen Avenue, Ikeja"),
        "user",
    )
    .await?;
    seed_menus(&orm).await?;

    println!("Seed completed. Admin ID: {admin_id}, Customer ID: {user_id}");
    Ok(())
}

async fn ensure_user(
    orm: &DatabaseConnection,
    email: &str,
    name: &str,
    address: Option<&str>,
    role: &str,
) -> anyhow::Result<Uuid> {
    if let Some(existing) = Users::find()
        .filter(UserCol::Email.eq(email))
        .one(orm)
        .await?
    {
        println!("User {email} already present");
        return Ok(existing.id);
    }

    let user = UserActive {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        name: Set(name.to_string()),
        address: Set(address.map(str::to_string)),
        role: Set(role.to_string()),
        created_at: Set(Utc::now().into()),
    }
    .insert(orm)
    .await?;

    println!("Ensured user {email} (role={role})");
    Ok(user.id)
}

async fn seed_menus(orm: &DatabaseConnection) -> anyhow::Result<()> {
    let menus = vec![
        ("Jollof Rice", "Smoky party jollof with plantain", 1250),
        ("Suya Platter", "Spiced beef skewers with onions", 1800),
        ("Pounded Yam & Egusi", "Served with assorted meat", 2200),
        ("Chapman", "House fruit punch", 450),
    ];

    for (name, description, price) in menus {
        let exists = Menus::find()
            .filter(MenuCol::Name.eq(name))
            .one(orm)
            .await?
            .is_some();
        if exists {
            continue;
        }
        MenuActive {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            description: Set(Some(description.to_string())),
            price: Set(price),
            created_at: Set(Utc::now().into()),
        }
        .insert(orm)
        .await?;
    }

    println!("Seeded menus");
    Ok(())
}
