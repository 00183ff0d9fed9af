use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ConnectionTrait, DatabaseConnection, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Represents a user in the `users` table: students, faculty, SBO officers
/// and admins all live here, distinguished by [`Role`].
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// Primary key ID (auto-incremented). This is the identifier encoded in
    /// student QR codes.
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Unique school identifier.
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    /// Account role; replaces the original user-level lookup table.
    pub role: Role,
    /// Roster group; null for accounts outside any tribe (e.g. admins).
    pub tribe_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Enum representing user account roles.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Display, EnumString, Deserialize,
    Serialize,
)]
#[serde(rename_all = "snake_case")]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "user_role_type")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Role {
    #[sea_orm(string_value = "admin")]
    Admin,

    #[sea_orm(string_value = "faculty")]
    Faculty,

    #[sea_orm(string_value = "student")]
    Student,

    #[sea_orm(string_value = "sbo_officer")]
    SboOfficer,
}

impl Role {
    /// Human-readable role name as shown in attendance views.
    pub fn display_name(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Faculty => "Faculty",
            Role::Student => "Student",
            Role::SboOfficer => "SBO Officer",
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::tribe::Entity",
        from = "Column::TribeId",
        to = "super::tribe::Column::Id"
    )]
    Tribe,
}

impl Related<super::tribe::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tribe.def()
    }
    fn via() -> Option<RelationDef> {
        None
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub async fn create(
        db: &DatabaseConnection,
        username: &str,
        first_name: &str,
        last_name: &str,
        role: Role,
        tribe_id: Option<i64>,
    ) -> Result<Self, DbErr> {
        let now = Utc::now();
        let user = ActiveModel {
            username: Set(username.to_owned()),
            first_name: Set(first_name.to_owned()),
            last_name: Set(last_name.to_owned()),
            role: Set(role),
            tribe_id: Set(tribe_id),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        user.insert(db).await
    }

    pub async fn find_by_id<C>(db: &C, id: i64) -> Result<Option<Self>, DbErr>
    where
        C: ConnectionTrait,
    {
        Entity::find_by_id(id).one(db).await
    }

    /// All students of a tribe, ordered by last name for stable roster views.
    pub async fn students_in_tribe<C>(db: &C, tribe_id: i64) -> Result<Vec<Self>, DbErr>
    where
        C: ConnectionTrait,
    {
        Entity::find()
            .filter(Column::TribeId.eq(tribe_id))
            .filter(Column::Role.eq(Role::Student))
            .order_by_asc(Column::LastName)
            .all(db)
            .await
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}
