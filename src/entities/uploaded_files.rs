use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "uploaded_files")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub stored_name: String,
    pub original_name: String,
    #[sea_orm(unique)]
    pub relative_path: String,
    pub public_url: String,
    pub size_bytes: i64,
    pub mime_type: String,
    #[sea_orm(indexed)]
    pub category: String, // images, pdfs, documents, gallery, ...
    #[sea_orm(indexed)]
    pub owner_id: String,
    pub associated_entity_type: Option<String>,
    pub associated_entity_id: Option<String>,
    pub description: Option<String>,
    #[sea_orm(default_expr = "Expr::value(true)")]
    pub is_active: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::file_tags::Entity")]
    FileTags,
}

impl Related<super::file_tags::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FileTags.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
