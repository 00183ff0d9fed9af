//! Wire DTOs for the attendance endpoints.
//!
//! Field names reproduce the shapes the existing QR-scanning frontend
//! expects (`attendance_*`, `attendanceS_*`, `facultyId`/`sboId`), so this
//! backend can be dropped in behind it unchanged.

use serde::{Deserialize, Serialize};

use db::attendance::{Processor, RosterStudent, TodayRecord};
use db::models::attendance_record::ProcessorRole;
use db::models::attendance_session;
use util::day;

/// The processor identity as the frontend sends it: exactly one of
/// `facultyId` or `sboId`. When both are present, `facultyId` wins — the two
/// client flows never send both.
#[derive(Debug, Deserialize)]
pub struct ProcessorReq {
    #[serde(rename = "facultyId")]
    pub faculty_id: Option<i64>,
    #[serde(rename = "sboId")]
    pub sbo_id: Option<i64>,
}

impl ProcessorReq {
    pub fn resolve(&self) -> Option<Processor> {
        if let Some(id) = self.faculty_id {
            return Some(Processor {
                id,
                role: ProcessorRole::Faculty,
            });
        }
        self.sbo_id.map(|id| Processor {
            id,
            role: ProcessorRole::SboOfficer,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ProcessAttendanceReq {
    #[serde(flatten)]
    pub processor: ProcessorReq,
    #[serde(rename = "studentId")]
    pub student_id: i64,
    #[serde(rename = "sessionId")]
    pub session_id: i64,
}

#[derive(Debug, Serialize)]
pub struct ProcessAttendanceResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<&'static str>,
    pub message: String,
}

impl ProcessAttendanceResponse {
    pub fn recorded(action: &'static str, message: impl Into<String>) -> Self {
        Self {
            success: true,
            action: Some(action),
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            action: None,
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AttendanceSessionRow {
    #[serde(rename = "attendanceS_id")]
    pub id: i64,
    #[serde(rename = "attendanceS_name")]
    pub name: String,
    /// 1 = active, 0 = inactive.
    #[serde(rename = "attendanceS_status")]
    pub status: i64,
}

impl From<attendance_session::Model> for AttendanceSessionRow {
    fn from(m: attendance_session::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            status: i64::from(m.active),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TodayAttendanceRow {
    pub attendance_id: i64,
    #[serde(rename = "attendance_studentId")]
    pub student_id: i64,
    #[serde(rename = "attendance_sessionId")]
    pub session_id: i64,
    /// Local (UTC+8) `YYYY-MM-DD HH:MM:SS`.
    #[serde(rename = "attendance_timeIn")]
    pub time_in: String,
    #[serde(rename = "attendance_timeOut")]
    pub time_out: Option<String>,
    /// Exactly one of the two processor columns is set, by role.
    #[serde(rename = "attendance_facultyId")]
    pub faculty_id: Option<i64>,
    #[serde(rename = "attendance_sboId")]
    pub sbo_id: Option<i64>,
    pub student_firstname: String,
    pub student_lastname: String,
    pub processor_firstname: String,
    pub processor_lastname: String,
    pub processor_role: String,
}

impl From<TodayRecord> for TodayAttendanceRow {
    fn from(row: TodayRecord) -> Self {
        let (faculty_id, sbo_id) = match row.record.processor_role {
            ProcessorRole::Faculty => (Some(row.record.processor_id), None),
            ProcessorRole::SboOfficer => (None, Some(row.record.processor_id)),
        };
        Self {
            attendance_id: row.record.id,
            student_id: row.record.student_id,
            session_id: row.record.session_id,
            time_in: day::format_local_timestamp(row.record.time_in),
            time_out: row.record.time_out.map(day::format_local_timestamp),
            faculty_id,
            sbo_id,
            student_firstname: row.student.first_name,
            student_lastname: row.student.last_name,
            processor_firstname: row.processor.first_name,
            processor_lastname: row.processor.last_name,
            processor_role: row.record.processor_role.display_name().to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RosterStudentRow {
    pub user_id: i64,
    pub user_firstname: String,
    pub user_lastname: String,
    pub tribe_name: String,
}

impl From<RosterStudent> for RosterStudentRow {
    fn from(row: RosterStudent) -> Self {
        Self {
            user_id: row.student.id,
            user_firstname: row.student.first_name,
            user_lastname: row.student.last_name,
            tribe_name: row.tribe_name,
        }
    }
}
