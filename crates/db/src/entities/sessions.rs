//! `SeaORM` Entity for sessions table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use tollgate_shared::types::Product;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "sessions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub sid: i64,
    pub product: i32,
    pub uid: i64,
    pub ip_address: String,
    pub minutes: i64,
    pub start: DateTime,
    pub end: Option<DateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::accounts::Entity",
        from = "Column::Uid",
        to = "super::accounts::Column::Uid"
    )]
    Accounts,
}

impl Related<super::accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Accounts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Product the session was billed under, if the stored code is known.
    #[must_use]
    pub const fn billed_product(&self) -> Option<Product> {
        Product::from_code(self.product)
    }
}
