//! HTTP client for the attendance endpoints.
//!
//! DTO field names mirror the backend's wire shapes (`attendance_*`,
//! `attendanceS_*`). The [`AttendanceApi`] trait is the seam the scan loop
//! runs against; tests substitute a scripted implementation.

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server answered {0}")]
    Status(u16),
}

/// The operator identity, serialized as `facultyId` or `sboId` depending on
/// which flow the scanner runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorId {
    Faculty(i64),
    Sbo(i64),
}

impl ProcessorId {
    fn body(&self) -> Value {
        match self {
            ProcessorId::Faculty(id) => json!({ "facultyId": id }),
            ProcessorId::Sbo(id) => json!({ "sboId": id }),
        }
    }

    fn process_body(&self, student_id: i64, session_id: i64) -> Value {
        let mut body = self.body();
        body["studentId"] = json!(student_id);
        body["sessionId"] = json!(session_id);
        body
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SessionRow {
    #[serde(rename = "attendanceS_id")]
    pub id: i64,
    #[serde(rename = "attendanceS_name")]
    pub name: String,
    /// 1 = active, 0 = inactive.
    #[serde(rename = "attendanceS_status")]
    pub status: i64,
}

impl SessionRow {
    pub fn is_active(&self) -> bool {
        self.status == 1
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TodayRow {
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
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RosterRow {
    pub user_id: i64,
    pub user_firstname: String,
    pub user_lastname: String,
    pub tribe_name: String,
}

impl RosterRow {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.user_firstname, self.user_lastname)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProcessOutcome {
    pub success: bool,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// The backend surface the scan loop depends on.
#[async_trait]
pub trait AttendanceApi: Send + Sync {
    async fn fetch_sessions(&self) -> Result<Vec<SessionRow>, ApiError>;
    async fn fetch_roster(&self) -> Result<Vec<RosterRow>, ApiError>;
    async fn fetch_today(&self) -> Result<Vec<TodayRow>, ApiError>;
    async fn process_scan(
        &self,
        student_id: i64,
        session_id: i64,
    ) -> Result<ProcessOutcome, ApiError>;
}

pub struct HttpAttendanceApi {
    base_url: String,
    processor: ProcessorId,
    client: reqwest::Client,
}

impl HttpAttendanceApi {
    pub fn new(base_url: impl Into<String>, processor: ProcessorId) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            processor,
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_json<T>(&self, path: &str, body: &Value) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        let resp = self.client.post(self.url(path)).json(body).send().await?;
        if !resp.status().is_success() {
            return Err(ApiError::Status(resp.status().as_u16()));
        }
        Ok(resp.json().await?)
    }
}

#[async_trait]
impl AttendanceApi for HttpAttendanceApi {
    async fn fetch_sessions(&self) -> Result<Vec<SessionRow>, ApiError> {
        let resp = self
            .client
            .get(self.url("/api/attendance/sessions"))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(ApiError::Status(resp.status().as_u16()));
        }
        Ok(resp.json().await?)
    }

    async fn fetch_roster(&self) -> Result<Vec<RosterRow>, ApiError> {
        self.post_json("/api/attendance/students", &self.processor.body())
            .await
    }

    async fn fetch_today(&self) -> Result<Vec<TodayRow>, ApiError> {
        self.post_json("/api/attendance/today", &self.processor.body())
            .await
    }

    async fn process_scan(
        &self,
        student_id: i64,
        session_id: i64,
    ) -> Result<ProcessOutcome, ApiError> {
        self.post_json(
            "/api/attendance/process",
            &self.processor.process_body(student_id, session_id),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn processor_bodies_use_the_role_specific_field() {
        assert_eq!(
            ProcessorId::Faculty(7).body(),
            json!({ "facultyId": 7 })
        );
        assert_eq!(ProcessorId::Sbo(9).body(), json!({ "sboId": 9 }));

        assert_eq!(
            ProcessorId::Sbo(9).process_body(3, 1),
            json!({ "sboId": 9, "studentId": 3, "sessionId": 1 })
        );
    }

    #[test]
    fn session_status_flag_maps_to_active() {
        let row: SessionRow = serde_json::from_value(json!({
            "attendanceS_id": 1,
            "attendanceS_name": "Morning",
            "attendanceS_status": 1,
        }))
        .unwrap();
        assert!(row.is_active());

        let row: SessionRow = serde_json::from_value(json!({
            "attendanceS_id": 2,
            "attendanceS_name": "Afternoon",
            "attendanceS_status": 0,
        }))
        .unwrap();
        assert!(!row.is_active());
    }

    #[test]
    fn today_rows_tolerate_extra_join_fields() {
        let row: TodayRow = serde_json::from_value(json!({
            "attendance_id": 10,
            "attendance_studentId": 3,
            "attendance_sessionId": 1,
            "attendance_timeIn": "2026-03-09 09:00:00",
            "attendance_timeOut": null,
            "attendance_facultyId": 7,
            "attendance_sboId": null,
            "student_firstname": "Bea",
            "student_lastname": "Santos",
            "processor_firstname": "Farah",
            "processor_lastname": "Cruz",
            "processor_role": "Faculty",
        }))
        .unwrap();
        assert_eq!(row.student_id, 3);
        assert!(row.time_out.is_none());
    }
}
