pub mod audit_logs;
pub mod cart_items;
pub mod carts;
pub mod menus;
pub mod notifications;
pub mod order_items;
pub mod orders;
pub mod payments;
pub mod sea_orm_active_enums;
pub mod users;

pub use audit_logs::Entity as AuditLogs;
pub use cart_items::Entity as CartItems;
pub use carts::Entity as Carts;
pub use menus::Entity as Menus;
pub use notifications::Entity as Notifications;
pub use order_items::Entity as OrderItems;
pub use orders::Entity as Orders;
pub use payments::Entity as Payments;
pub use users::Entity as Users;
