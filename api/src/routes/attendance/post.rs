use axum::{Json, extract::State, http::StatusCode};
use chrono::Utc;

use db::attendance::{self, ScanOutcome};
use db::models::user;
use util::state::AppState;

use super::common::{
    ProcessAttendanceReq, ProcessAttendanceResponse, ProcessorReq, RosterStudentRow,
    TodayAttendanceRow,
};

/// POST /api/attendance/process
///
/// Runs one decoded scan through the attendance state machine. Business
/// rejections come back as `success: false` with a human-readable message;
/// only the body distinguishes them, matching the original endpoint.
pub async fn process_attendance(
    State(state): State<AppState>,
    Json(body): Json<ProcessAttendanceReq>,
) -> Json<ProcessAttendanceResponse> {
    let db = state.db();

    let Some(processor) = body.processor.resolve() else {
        return Json(ProcessAttendanceResponse::failure("Missing processor id"));
    };

    // Roster gate: the processor must exist under the claimed role and the
    // student must belong to the processor's tribe. The state machine never
    // sees a scan that fails here.
    let proc_user = match user::Model::find_by_id(db, processor.id).await {
        Ok(Some(u)) => u,
        Ok(None) => return Json(ProcessAttendanceResponse::failure("Processor not found")),
        Err(err) => {
            tracing::error!(%err, "failed to load processor");
            return Json(ProcessAttendanceResponse::failure(format!("Error: {err}")));
        }
    };
    if !role_matches(&proc_user, processor.role) {
        return Json(ProcessAttendanceResponse::failure("Processor not found"));
    }

    match attendance::resolve_rostered_student(db, &proc_user, body.student_id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return Json(ProcessAttendanceResponse::failure(
                "Student not found in your tribe",
            ));
        }
        Err(err) => {
            tracing::error!(%err, "failed to resolve student roster");
            return Json(ProcessAttendanceResponse::failure(format!("Error: {err}")));
        }
    }

    match attendance::process_scan(db, processor, body.student_id, body.session_id, Utc::now())
        .await
    {
        Ok(ScanOutcome::TimeIn(_)) => Json(ProcessAttendanceResponse::recorded(
            "time_in",
            "Time in recorded",
        )),
        Ok(ScanOutcome::TimeOut(_)) => Json(ProcessAttendanceResponse::recorded(
            "time_out",
            "Time out recorded",
        )),
        Ok(ScanOutcome::Rejected(rejection)) => {
            Json(ProcessAttendanceResponse::failure(rejection.message()))
        }
        Err(err) => {
            tracing::error!(%err, "attendance scan failed");
            Json(ProcessAttendanceResponse::failure(format!("Error: {err}")))
        }
    }
}

fn role_matches(proc_user: &user::Model, claimed: db::models::attendance_record::ProcessorRole) -> bool {
    use db::models::attendance_record::ProcessorRole;
    matches!(
        (proc_user.role, claimed),
        (user::Role::Faculty, ProcessorRole::Faculty)
            | (user::Role::SboOfficer, ProcessorRole::SboOfficer)
    )
}

/// POST /api/attendance/today
///
/// Today's records (UTC+8 day) for the processor's tribe, newest first.
/// Unknown processors get an empty array, like the original endpoint.
pub async fn today_attendance(
    State(state): State<AppState>,
    Json(body): Json<ProcessorReq>,
) -> (StatusCode, Json<Vec<TodayAttendanceRow>>) {
    let db = state.db();

    let Some(processor) = body.resolve() else {
        return (StatusCode::OK, Json(vec![]));
    };

    match attendance::today_records_for_processor(db, processor.id, Utc::now()).await {
        Ok(rows) => (
            StatusCode::OK,
            Json(rows.into_iter().map(TodayAttendanceRow::from).collect()),
        ),
        Err(err) => {
            tracing::error!(%err, "failed to load today's attendance");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(vec![]))
        }
    }
}

/// POST /api/attendance/students
///
/// The processor's tribe roster; the scanning client resolves decoded QR
/// payloads against this list before any ledger call.
pub async fn list_students(
    State(state): State<AppState>,
    Json(body): Json<ProcessorReq>,
) -> (StatusCode, Json<Vec<RosterStudentRow>>) {
    let db = state.db();

    let Some(processor) = body.resolve() else {
        return (StatusCode::OK, Json(vec![]));
    };

    match attendance::students_for_processor(db, processor.id).await {
        Ok(rows) => (
            StatusCode::OK,
            Json(rows.into_iter().map(RosterStudentRow::from).collect()),
        ),
        Err(err) => {
            tracing::error!(%err, "failed to load tribe roster");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(vec![]))
        }
    }
}
