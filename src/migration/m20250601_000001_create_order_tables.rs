use sea_orm::{EntityTrait, Schema};
use sea_orm_migration::prelude::*;

use crate::entity::{
    AuditLogs, CartItems, Carts, Menus, Notifications, OrderItems, Orders, Payments, Users,
    cart_items,
};

#[derive(DeriveMigrationName)]
pub struct Migration;

async fn create_from_entity<E>(manager: &SchemaManager<'_>, schema: &Schema, entity: E) -> Result<(), DbErr>
where
    E: EntityTrait,
{
    manager
        .create_table(schema.create_table_from_entity(entity).if_not_exists().to_owned())
        .await
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let schema = Schema::new(manager.get_database_backend());

        // Parents before children so foreign keys resolve.
        create_from_entity(manager, &schema, Users).await?;
        create_from_entity(manager, &schema, Menus).await?;
        create_from_entity(manager, &schema, Carts).await?;
        create_from_entity(manager, &schema, CartItems).await?;
        create_from_entity(manager, &schema, Orders).await?;
        create_from_entity(manager, &schema, OrderItems).await?;
        create_from_entity(manager, &schema, Payments).await?;
        create_from_entity(manager, &schema, Notifications).await?;
        create_from_entity(manager, &schema, AuditLogs).await?;

        // One line per (cart, menu): repeated adds merge into quantity.
        manager
            .create_index(
                Index::create()
                    .name("uq_cart_items_cart_menu")
                    .table(CartItems)
                    .col(cart_items::Column::CartId)
                    .col(cart_items::Column::MenuId)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AuditLogs).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Notifications).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Payments).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(OrderItems).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Orders).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CartItems).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Carts).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Menus).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users).if_exists().to_owned())
            .await
    }
}
