use axum::{Json, extract::State, http::StatusCode};

use db::models::attendance_session;
use util::state::AppState;

use super::common::AttendanceSessionRow;

/// GET /api/attendance/sessions
///
/// Lists every attendance session with its active gate, ordered by id.
/// Sessions stay listed while inactive; only scanning is blocked.
pub async fn list_sessions(
    State(state): State<AppState>,
) -> (StatusCode, Json<Vec<AttendanceSessionRow>>) {
    let db = state.db();

    match attendance_session::Model::list(db).await {
        Ok(sessions) => (
            StatusCode::OK,
            Json(
                sessions
                    .into_iter()
                    .map(AttendanceSessionRow::from)
                    .collect(),
            ),
        ),
        Err(err) => {
            tracing::error!(%err, "failed to list attendance sessions");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(vec![]))
        }
    }
}
