use axum::Router;
use sea_orm::DatabaseConnection;
use util::state::AppState;

use db::models::{attendance_session, tribe, user, user::Role};
use db::test_utils::setup_test_db;

/// Users and sessions every attendance test starts from: one tribe with a
/// faculty member, an SBO officer and a student, a second tribe with its own
/// student, plus an active and an inactive session.
pub struct TestCtx {
    pub faculty: user::Model,
    pub sbo: user::Model,
    pub student: user::Model,
    pub outsider: user::Model,
    pub morning: attendance_session::Model,
    pub afternoon_inactive: attendance_session::Model,
}

pub async fn make_test_app() -> (Router, DatabaseConnection) {
    let db = setup_test_db().await;
    let app = axum::Router::new().nest("/api", api::routes::routes(AppState::new(db.clone())));
    (app, db)
}

pub async fn seed(db: &DatabaseConnection) -> TestCtx {
    let alpha = tribe::Model::create(db, "Alpha").await.expect("create tribe");
    let beta = tribe::Model::create(db, "Beta").await.expect("create tribe");

    let faculty = user::Model::create(db, "F-100", "Farah", "Cruz", Role::Faculty, Some(alpha.id))
        .await
        .unwrap();
    let sbo = user::Model::create(db, "O-200", "Sam", "Reyes", Role::SboOfficer, Some(alpha.id))
        .await
        .unwrap();
    let student = user::Model::create(db, "S-300", "Bea", "Santos", Role::Student, Some(alpha.id))
        .await
        .unwrap();
    let outsider = user::Model::create(db, "S-400", "Leo", "Tan", Role::Student, Some(beta.id))
        .await
        .unwrap();

    let morning = attendance_session::Model::create(db, "Morning", true)
        .await
        .unwrap();
    let afternoon_inactive = attendance_session::Model::create(db, "Afternoon", false)
        .await
        .unwrap();

    TestCtx {
        faculty,
        sbo,
        student,
        outsider,
        morning,
        afternoon_inactive,
    }
}
