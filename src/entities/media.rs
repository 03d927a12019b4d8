use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "media")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub catalog_id: i32,
    pub external_id: Option<i32>,
    pub kind: String,
    pub status: String,
    pub status4k: String,
    pub server_id: Option<i32>,
    pub server_id4k: Option<i32>,
    pub service_id: Option<i32>,
    pub service_id4k: Option<i32>,
    pub service_slug: Option<String>,
    pub service_slug4k: Option<String>,
    pub added_at: Option<String>, // RFC 3339
    pub last_season_change: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::season::Entity")]
    Season,
}

impl Related<super::season::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Season.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
