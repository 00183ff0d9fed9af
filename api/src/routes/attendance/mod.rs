use axum::{
    Router,
    routing::{get, post},
};
use util::state::AppState;

mod common;
mod get;
mod post;

pub use get::list_sessions;
pub use post::{list_students, process_attendance, today_attendance};

pub fn attendance_routes() -> Router<AppState> {
    Router::new()
        .route("/process", post(process_attendance))
        .route("/today", post(today_attendance))
        .route("/students", post(list_students))
        .route("/sessions", get(list_sessions))
}
