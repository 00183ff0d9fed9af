use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// One student's attendance for one session on one local calendar day.
///
/// The `(student_id, session_id, attendance_date)` triple is the natural key
/// and carries a unique index. `time_out` is only ever set after `time_in`;
/// once both are set the record is terminal for the day. Rows are created and
/// mutated exclusively through [`crate::attendance::process_scan`].
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, serde::Serialize)]
#[sea_orm(table_name = "attendance_records")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub student_id: i64,
    pub session_id: i64,
    /// Who recorded the scan: a faculty member or an SBO officer.
    pub processor_id: i64,
    pub processor_role: ProcessorRole,
    /// Calendar date under the UTC+8 policy; part of the natural key.
    pub attendance_date: Date,
    pub time_in: DateTime<Utc>,
    pub time_out: Option<DateTime<Utc>>,
}

/// Role of the actor who recorded a scan. Replaces the original pair of
/// nullable faculty/SBO foreign keys with a single tagged union.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Display, EnumString, Deserialize,
    Serialize,
)]
#[serde(rename_all = "snake_case")]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "processor_role_type")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ProcessorRole {
    #[sea_orm(string_value = "faculty")]
    Faculty,

    #[sea_orm(string_value = "sbo_officer")]
    SboOfficer,
}

impl ProcessorRole {
    /// Human-readable role name as shown in attendance views.
    pub fn display_name(&self) -> &'static str {
        match self {
            ProcessorRole::Faculty => "Faculty",
            ProcessorRole::SboOfficer => "SBO Officer",
        }
    }
}

impl Model {
    /// Whether the record is terminal: both time-in and time-out recorded.
    pub fn is_completed(&self) -> bool {
        self.time_out.is_some()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::attendance_session::Entity",
        from = "Column::SessionId",
        to = "super::attendance_session::Column::Id"
    )]
    Session,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::StudentId",
        to = "super::user::Column::Id"
    )]
    Student,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::ProcessorId",
        to = "super::user::Column::Id"
    )]
    Processor,
}

impl Related<super::attendance_session::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Session.def()
    }
    fn via() -> Option<RelationDef> {
        None
    }
}

impl ActiveModelBehavior for ActiveModel {}
