use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ConnectionTrait, DatabaseConnection, QueryOrder, Set};

/// A named attendance window (e.g. "Morning", "Afternoon"). The `active`
/// flag gates scanning: no new record may be started while it is false,
/// though existing records stay readable.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, serde::Serialize)]
#[sea_orm(table_name = "attendance_sessions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::attendance_record::Entity")]
    Records,
}

impl Related<super::attendance_record::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Records.def()
    }
    fn via() -> Option<RelationDef> {
        None
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub async fn create(db: &DatabaseConnection, name: &str, active: bool) -> Result<Self, DbErr> {
        let now = Utc::now();
        let session = ActiveModel {
            name: Set(name.to_owned()),
            active: Set(active),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        session.insert(db).await
    }

    /// All sessions, ordered by id. Read-only directory listing.
    pub async fn list<C>(db: &C) -> Result<Vec<Self>, DbErr>
    where
        C: ConnectionTrait,
    {
        Entity::find().order_by_asc(Column::Id).all(db).await
    }

    /// Whether scanning is currently permitted for the session. A missing
    /// session id counts as inactive; the gate rejects it either way.
    pub async fn is_active<C>(db: &C, session_id: i64) -> Result<bool, DbErr>
    where
        C: ConnectionTrait,
    {
        Ok(Entity::find_by_id(session_id)
            .one(db)
            .await?
            .map(|s| s.active)
            .unwrap_or(false))
    }
}
