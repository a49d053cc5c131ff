//! `SeaORM` entity prelude.

pub use super::accounts::Entity as Accounts;
pub use super::sessions::Entity as Sessions;
