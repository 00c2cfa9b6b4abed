//! Users known to the HTTP surface and their mapping to engine principals.

use engine::{Principal, Role};
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub username: String,
    pub display_name: String,
    pub role: String,
    pub active: bool,
    #[sea_orm(unique)]
    pub api_token: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// The identity handed to the engine. `None` when the stored role is unknown.
    pub fn principal(&self) -> Option<Principal> {
        let role = Role::try_from(self.role.as_str()).ok()?;
        Some(Principal {
            id: self.id,
            display_name: self.display_name.clone(),
            role,
            active: self.active,
        })
    }
}

/// Find the user owning `token`.
pub async fn by_token(db: &DatabaseConnection, token: &str) -> Result<Option<Model>, DbErr> {
    Entity::find()
        .filter(Column::ApiToken.eq(token))
        .one(db)
        .await
}
