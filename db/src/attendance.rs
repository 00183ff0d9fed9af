//! Attendance ledger: the per (student, session, day) time-in/time-out state
//! machine.
//!
//! A record moves `NO_RECORD -> TIMED_IN -> COMPLETED` within one UTC+8
//! calendar day and is terminal once completed. The read-then-write decision
//! runs inside a transaction, with the unique index on
//! `(student_id, session_id, attendance_date)` as the storage-level backstop:
//! a racing writer loses the insert, and the loser's scan is re-judged
//! against the committed row.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, Set, SqlErr, TransactionTrait,
};
use util::day;

use crate::models::{
    attendance_record::{self, ProcessorRole},
    attendance_session, tribe, user,
};

/// Minimum dwell between time-in and time-out. Guards against a single
/// camera pass toggling both transitions back to back.
pub const MIN_DWELL_SECS: i64 = 60 * 60;

/// The actor recording a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Processor {
    pub id: i64,
    pub role: ProcessorRole,
}

/// Result of feeding one decoded scan through the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    /// First valid scan of the day: a record was created.
    TimeIn(attendance_record::Model),
    /// Dwell time elapsed: the record was completed.
    TimeOut(attendance_record::Model),
    /// Business rejection; nothing was written.
    Rejected(ScanRejection),
}

/// Expected, user-facing rejections. These are values, not errors; `DbErr`
/// is reserved for infrastructure failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanRejection {
    SessionInactive,
    TooSoonForTimeOut { remaining_minutes: i64 },
    AlreadyCompleted,
}

impl ScanRejection {
    pub fn message(&self) -> String {
        match self {
            ScanRejection::SessionInactive => "Session is inactive".to_string(),
            ScanRejection::TooSoonForTimeOut { remaining_minutes } => format!(
                "Student already timed in. Wait {} minutes to allow time out",
                remaining_minutes
            ),
            ScanRejection::AlreadyCompleted => {
                "Student already completed attendance for this session".to_string()
            }
        }
    }
}

/// Runs one scan through the state machine.
///
/// The whole decision executes in a transaction. Losing an insert race to a
/// concurrent scanner surfaces as a unique-constraint violation; the
/// transaction is rolled back and the scan re-judged against the row the
/// winner committed, so the caller sees the same rejection a later arrival
/// would have seen.
pub async fn process_scan(
    db: &DatabaseConnection,
    processor: Processor,
    student_id: i64,
    session_id: i64,
    now: DateTime<Utc>,
) -> Result<ScanOutcome, DbErr> {
    for _ in 0..2 {
        let txn = db.begin().await?;
        match scan_once(&txn, processor, student_id, session_id, now).await {
            Ok(outcome) => {
                txn.commit().await?;
                return Ok(outcome);
            }
            Err(err) => {
                txn.rollback().await.ok();
                if is_unique_violation(&err) {
                    tracing::debug!(
                        student_id,
                        session_id,
                        "lost time-in insert race; re-judging against committed record"
                    );
                    continue;
                }
                return Err(err);
            }
        }
    }
    // Unreachable in practice: the second pass takes the existing-record
    // branch and cannot violate the natural key again.
    Err(DbErr::Custom("attendance scan conflicted twice".into()))
}

async fn scan_once<C>(
    conn: &C,
    processor: Processor,
    student_id: i64,
    session_id: i64,
    now: DateTime<Utc>,
) -> Result<ScanOutcome, DbErr>
where
    C: ConnectionTrait,
{
    if !attendance_session::Model::is_active(conn, session_id).await? {
        return Ok(ScanOutcome::Rejected(ScanRejection::SessionInactive));
    }

    let today = day::attendance_date(now);
    let existing = attendance_record::Entity::find()
        .filter(attendance_record::Column::StudentId.eq(student_id))
        .filter(attendance_record::Column::SessionId.eq(session_id))
        .filter(attendance_record::Column::AttendanceDate.eq(today))
        .one(conn)
        .await?;

    let Some(record) = existing else {
        let created = attendance_record::ActiveModel {
            student_id: Set(student_id),
            session_id: Set(session_id),
            processor_id: Set(processor.id),
            processor_role: Set(processor.role),
            attendance_date: Set(today),
            time_in: Set(now),
            time_out: Set(None),
            ..Default::default()
        }
        .insert(conn)
        .await?;
        return Ok(ScanOutcome::TimeIn(created));
    };

    if record.is_completed() {
        return Ok(ScanOutcome::Rejected(ScanRejection::AlreadyCompleted));
    }

    let elapsed_secs = (now - record.time_in).num_seconds();
    if elapsed_secs < MIN_DWELL_SECS {
        let remaining_minutes = (MIN_DWELL_SECS - elapsed_secs + 59) / 60;
        return Ok(ScanOutcome::Rejected(ScanRejection::TooSoonForTimeOut {
            remaining_minutes,
        }));
    }

    // Conditional update: zero rows affected means a concurrent scan
    // completed the record first.
    let res = attendance_record::Entity::update_many()
        .col_expr(attendance_record::Column::TimeOut, Expr::value(now))
        .filter(attendance_record::Column::Id.eq(record.id))
        .filter(attendance_record::Column::TimeOut.is_null())
        .exec(conn)
        .await?;
    if res.rows_affected == 0 {
        return Ok(ScanOutcome::Rejected(ScanRejection::AlreadyCompleted));
    }

    let updated = attendance_record::Entity::find_by_id(record.id)
        .one(conn)
        .await?
        .ok_or_else(|| {
            DbErr::RecordNotFound(format!("attendance record {} after time-out", record.id))
        })?;
    Ok(ScanOutcome::TimeOut(updated))
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// A today-view row: the record joined with student and processor identity.
#[derive(Debug, Clone, PartialEq)]
pub struct TodayRecord {
    pub record: attendance_record::Model,
    pub student: user::Model,
    pub processor: user::Model,
}

/// Today's records (UTC+8 day) for students of the processor's tribe,
/// newest time-in first. Unknown processors and processors without a tribe
/// yield an empty list, matching the original endpoint's behavior.
pub async fn today_records_for_processor(
    db: &DatabaseConnection,
    processor_id: i64,
    now: DateTime<Utc>,
) -> Result<Vec<TodayRecord>, DbErr> {
    let Some(proc_user) = user::Model::find_by_id(db, processor_id).await? else {
        return Ok(vec![]);
    };
    let Some(tribe_id) = proc_user.tribe_id else {
        return Ok(vec![]);
    };

    let students = user::Model::students_in_tribe(db, tribe_id).await?;
    if students.is_empty() {
        return Ok(vec![]);
    }
    let student_ids: Vec<i64> = students.iter().map(|s| s.id).collect();
    let students_by_id: HashMap<i64, user::Model> =
        students.into_iter().map(|s| (s.id, s)).collect();

    let records = attendance_record::Entity::find()
        .filter(attendance_record::Column::AttendanceDate.eq(day::attendance_date(now)))
        .filter(attendance_record::Column::StudentId.is_in(student_ids))
        .order_by_desc(attendance_record::Column::TimeIn)
        .all(db)
        .await?;

    // Resolve processor identities only for the rows we return.
    let processor_ids: Vec<i64> = records.iter().map(|r| r.processor_id).collect();
    let processors_by_id: HashMap<i64, user::Model> = user::Entity::find()
        .filter(user::Column::Id.is_in(processor_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();

    Ok(records
        .into_iter()
        .filter_map(|record| {
            let student = students_by_id.get(&record.student_id)?.clone();
            let processor = processors_by_id.get(&record.processor_id)?.clone();
            Some(TodayRecord {
                record,
                student,
                processor,
            })
        })
        .collect())
}

/// A roster entry for the scanning client.
#[derive(Debug, Clone, PartialEq)]
pub struct RosterStudent {
    pub student: user::Model,
    pub tribe_name: String,
}

/// The students a processor is authorized to scan: their tribe's roster.
pub async fn students_for_processor(
    db: &DatabaseConnection,
    processor_id: i64,
) -> Result<Vec<RosterStudent>, DbErr> {
    let Some(proc_user) = user::Model::find_by_id(db, processor_id).await? else {
        return Ok(vec![]);
    };
    let Some(tribe_id) = proc_user.tribe_id else {
        return Ok(vec![]);
    };
    let Some(tribe_row) = tribe::Entity::find_by_id(tribe_id).one(db).await? else {
        return Ok(vec![]);
    };

    let students = user::Model::students_in_tribe(db, tribe_id).await?;
    Ok(students
        .into_iter()
        .map(|student| RosterStudent {
            student,
            tribe_name: tribe_row.name.clone(),
        })
        .collect())
}

/// Roster gate checked before the state machine runs: the student must exist,
/// hold the student role, and share the processor's tribe.
pub async fn resolve_rostered_student(
    db: &DatabaseConnection,
    processor_user: &user::Model,
    student_id: i64,
) -> Result<Option<user::Model>, DbErr> {
    let Some(student) = user::Model::find_by_id(db, student_id).await? else {
        return Ok(None);
    };
    if student.role != user::Role::Student {
        return Ok(None);
    }
    match (processor_user.tribe_id, student.tribe_id) {
        (Some(a), Some(b)) if a == b => Ok(Some(student)),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::Role;
    use crate::test_utils::setup_test_db;
    use chrono::{Duration, TimeZone};
    use sea_orm::PaginatorTrait;

    struct Fixture {
        db: DatabaseConnection,
        faculty: user::Model,
        sbo: user::Model,
        student: user::Model,
        other_tribe_student: user::Model,
        morning: attendance_session::Model,
        afternoon_inactive: attendance_session::Model,
    }

    async fn setup() -> Fixture {
        let db = setup_test_db().await;

        let alpha = tribe::Model::create(&db, "Alpha").await.unwrap();
        let beta = tribe::Model::create(&db, "Beta").await.unwrap();

        let faculty = user::Model::create(&db, "F-100", "Farah", "Cruz", Role::Faculty, Some(alpha.id))
            .await
            .unwrap();
        let sbo = user::Model::create(&db, "O-200", "Sam", "Reyes", Role::SboOfficer, Some(alpha.id))
            .await
            .unwrap();
        let student =
            user::Model::create(&db, "S-300", "Bea", "Santos", Role::Student, Some(alpha.id))
                .await
                .unwrap();
        let other_tribe_student =
            user::Model::create(&db, "S-400", "Leo", "Tan", Role::Student, Some(beta.id))
                .await
                .unwrap();

        let morning = attendance_session::Model::create(&db, "Morning", true)
            .await
            .unwrap();
        let afternoon_inactive = attendance_session::Model::create(&db, "Afternoon", false)
            .await
            .unwrap();

        Fixture {
            db,
            faculty,
            sbo,
            student,
            other_tribe_student,
            morning,
            afternoon_inactive,
        }
    }

    fn faculty_processor(f: &Fixture) -> Processor {
        Processor {
            id: f.faculty.id,
            role: ProcessorRole::Faculty,
        }
    }

    async fn record_count(db: &DatabaseConnection) -> u64 {
        attendance_record::Entity::find().count(db).await.unwrap()
    }

    #[tokio::test]
    async fn first_scan_records_time_in() {
        let f = setup().await;
        let now = Utc.with_ymd_and_hms(2026, 3, 9, 1, 0, 0).unwrap();

        let outcome = process_scan(&f.db, faculty_processor(&f), f.student.id, f.morning.id, now)
            .await
            .unwrap();

        match outcome {
            ScanOutcome::TimeIn(rec) => {
                assert_eq!(rec.student_id, f.student.id);
                assert_eq!(rec.session_id, f.morning.id);
                assert_eq!(rec.processor_id, f.faculty.id);
                assert_eq!(rec.processor_role, ProcessorRole::Faculty);
                assert_eq!(rec.time_in, now);
                assert!(rec.time_out.is_none());
                assert_eq!(rec.attendance_date, day::attendance_date(now));
            }
            other => panic!("expected TimeIn, got {other:?}"),
        }
        assert_eq!(record_count(&f.db).await, 1);
    }

    #[tokio::test]
    async fn immediate_duplicate_scan_is_rejected_without_mutation() {
        let f = setup().await;
        let now = Utc.with_ymd_and_hms(2026, 3, 9, 1, 0, 0).unwrap();
        let p = faculty_processor(&f);

        process_scan(&f.db, p, f.student.id, f.morning.id, now)
            .await
            .unwrap();
        let second = process_scan(&f.db, p, f.student.id, f.morning.id, now + Duration::seconds(5))
            .await
            .unwrap();

        assert_eq!(
            second,
            ScanOutcome::Rejected(ScanRejection::TooSoonForTimeOut {
                remaining_minutes: 60
            })
        );
        assert_eq!(record_count(&f.db).await, 1);
    }

    #[tokio::test]
    async fn remaining_minutes_round_up() {
        let f = setup().await;
        let now = Utc.with_ymd_and_hms(2026, 3, 9, 1, 0, 0).unwrap();
        let p = faculty_processor(&f);

        process_scan(&f.db, p, f.student.id, f.morning.id, now)
            .await
            .unwrap();

        let at_30m = process_scan(
            &f.db,
            p,
            f.student.id,
            f.morning.id,
            now + Duration::minutes(30),
        )
        .await
        .unwrap();
        assert_eq!(
            at_30m,
            ScanOutcome::Rejected(ScanRejection::TooSoonForTimeOut {
                remaining_minutes: 30
            })
        );

        // 59m30s elapsed: 30 seconds short still counts as one minute to wait
        let at_59m30 = process_scan(
            &f.db,
            p,
            f.student.id,
            f.morning.id,
            now + Duration::seconds(59 * 60 + 30),
        )
        .await
        .unwrap();
        assert_eq!(
            at_59m30,
            ScanOutcome::Rejected(ScanRejection::TooSoonForTimeOut {
                remaining_minutes: 1
            })
        );
    }

    #[tokio::test]
    async fn scan_after_dwell_records_time_out_once() {
        let f = setup().await;
        let now = Utc.with_ymd_and_hms(2026, 3, 9, 1, 0, 0).unwrap();
        let p = faculty_processor(&f);

        process_scan(&f.db, p, f.student.id, f.morning.id, now)
            .await
            .unwrap();

        let later = now + Duration::minutes(61);
        let outcome = process_scan(&f.db, p, f.student.id, f.morning.id, later)
            .await
            .unwrap();
        match outcome {
            ScanOutcome::TimeOut(rec) => {
                assert_eq!(rec.time_in, now);
                assert_eq!(rec.time_out, Some(later));
            }
            other => panic!("expected TimeOut, got {other:?}"),
        }

        // Terminal: any further scan is rejected and nothing changes.
        let again = process_scan(&f.db, p, f.student.id, f.morning.id, later + Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(again, ScanOutcome::Rejected(ScanRejection::AlreadyCompleted));
        assert_eq!(record_count(&f.db).await, 1);

        let rec = attendance_record::Entity::find()
            .one(&f.db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rec.time_out, Some(later));
    }

    #[tokio::test]
    async fn exactly_one_hour_allows_time_out() {
        let f = setup().await;
        let now = Utc.with_ymd_and_hms(2026, 3, 9, 1, 0, 0).unwrap();
        let p = faculty_processor(&f);

        process_scan(&f.db, p, f.student.id, f.morning.id, now)
            .await
            .unwrap();
        let outcome = process_scan(&f.db, p, f.student.id, f.morning.id, now + Duration::hours(1))
            .await
            .unwrap();
        assert!(matches!(outcome, ScanOutcome::TimeOut(_)));
    }

    #[tokio::test]
    async fn inactive_session_rejects_without_creating_a_record() {
        let f = setup().await;
        let now = Utc.with_ymd_and_hms(2026, 3, 9, 5, 0, 0).unwrap();

        let outcome = process_scan(
            &f.db,
            faculty_processor(&f),
            f.student.id,
            f.afternoon_inactive.id,
            now,
        )
        .await
        .unwrap();

        assert_eq!(outcome, ScanOutcome::Rejected(ScanRejection::SessionInactive));
        assert_eq!(record_count(&f.db).await, 0);
    }

    #[tokio::test]
    async fn unknown_session_counts_as_inactive() {
        let f = setup().await;
        let now = Utc::now();

        let outcome = process_scan(&f.db, faculty_processor(&f), f.student.id, 9999, now)
            .await
            .unwrap();
        assert_eq!(outcome, ScanOutcome::Rejected(ScanRejection::SessionInactive));
    }

    #[tokio::test]
    async fn inactive_session_blocks_time_out_too() {
        let f = setup().await;
        let p = faculty_processor(&f);
        let now = Utc.with_ymd_and_hms(2026, 3, 9, 1, 0, 0).unwrap();

        process_scan(&f.db, p, f.student.id, f.morning.id, now)
            .await
            .unwrap();

        // Deactivate between scans; the gate applies to every transition.
        let mut active: attendance_session::ActiveModel = f.morning.clone().into();
        active.active = Set(false);
        active.update(&f.db).await.unwrap();

        let outcome = process_scan(&f.db, p, f.student.id, f.morning.id, now + Duration::hours(2))
            .await
            .unwrap();
        assert_eq!(outcome, ScanOutcome::Rejected(ScanRejection::SessionInactive));

        let rec = attendance_record::Entity::find()
            .one(&f.db)
            .await
            .unwrap()
            .unwrap();
        assert!(rec.time_out.is_none());
    }

    #[tokio::test]
    async fn next_local_day_opens_a_fresh_natural_key() {
        let f = setup().await;
        let p = faculty_processor(&f);

        // 23:59 UTC+8 on March 9th
        let late = Utc.with_ymd_and_hms(2026, 3, 9, 15, 59, 0).unwrap();
        // 00:01 UTC+8 on March 10th, two minutes later
        let early_next = Utc.with_ymd_and_hms(2026, 3, 9, 16, 1, 0).unwrap();

        let first = process_scan(&f.db, p, f.student.id, f.morning.id, late)
            .await
            .unwrap();
        assert!(matches!(first, ScanOutcome::TimeIn(_)));

        let second = process_scan(&f.db, p, f.student.id, f.morning.id, early_next)
            .await
            .unwrap();
        assert!(matches!(second, ScanOutcome::TimeIn(_)));

        assert_eq!(record_count(&f.db).await, 2);
    }

    #[tokio::test]
    async fn sessions_are_independent_natural_keys() {
        let f = setup().await;
        let p = faculty_processor(&f);
        let now = Utc.with_ymd_and_hms(2026, 3, 9, 1, 0, 0).unwrap();

        // Activate the afternoon session for this test.
        let mut active: attendance_session::ActiveModel = f.afternoon_inactive.clone().into();
        active.active = Set(true);
        active.update(&f.db).await.unwrap();

        process_scan(&f.db, p, f.student.id, f.morning.id, now)
            .await
            .unwrap();
        let other = process_scan(&f.db, p, f.student.id, f.afternoon_inactive.id, now)
            .await
            .unwrap();
        assert!(matches!(other, ScanOutcome::TimeIn(_)));
        assert_eq!(record_count(&f.db).await, 2);
    }

    #[tokio::test]
    async fn today_view_scopes_to_tribe_and_joins_identity() {
        let f = setup().await;
        let now = Utc.with_ymd_and_hms(2026, 3, 9, 1, 0, 0).unwrap();

        // Faculty records the tribe student; SBO records a second session for
        // the same student later the same day.
        process_scan(&f.db, faculty_processor(&f), f.student.id, f.morning.id, now)
            .await
            .unwrap();

        let mut active: attendance_session::ActiveModel = f.afternoon_inactive.clone().into();
        active.active = Set(true);
        active.update(&f.db).await.unwrap();
        process_scan(
            &f.db,
            Processor {
                id: f.sbo.id,
                role: ProcessorRole::SboOfficer,
            },
            f.student.id,
            f.afternoon_inactive.id,
            now + Duration::minutes(5),
        )
        .await
        .unwrap();

        let rows = today_records_for_processor(&f.db, f.faculty.id, now + Duration::minutes(10))
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);

        // Newest time-in first.
        assert_eq!(rows[0].record.session_id, f.afternoon_inactive.id);
        assert_eq!(rows[0].processor.id, f.sbo.id);
        assert_eq!(rows[0].record.processor_role, ProcessorRole::SboOfficer);
        assert_eq!(rows[1].record.session_id, f.morning.id);
        assert_eq!(rows[1].processor.id, f.faculty.id);
        assert_eq!(rows[1].student.full_name(), "Bea Santos");
    }

    #[tokio::test]
    async fn today_view_excludes_other_days_and_other_tribes() {
        let f = setup().await;
        let yesterday = Utc.with_ymd_and_hms(2026, 3, 8, 1, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 3, 9, 1, 0, 0).unwrap();
        let p = faculty_processor(&f);

        process_scan(&f.db, p, f.student.id, f.morning.id, yesterday)
            .await
            .unwrap();

        let rows = today_records_for_processor(&f.db, f.faculty.id, now)
            .await
            .unwrap();
        assert!(rows.is_empty());

        // A record for another tribe's student never shows up, even today.
        process_scan(&f.db, p, f.other_tribe_student.id, f.morning.id, now)
            .await
            .unwrap();
        let rows = today_records_for_processor(&f.db, f.faculty.id, now)
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn unknown_processor_sees_empty_today_view() {
        let f = setup().await;
        let rows = today_records_for_processor(&f.db, 424242, Utc::now())
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn roster_lists_only_tribe_students() {
        let f = setup().await;

        let roster = students_for_processor(&f.db, f.faculty.id).await.unwrap();
        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].student.id, f.student.id);
        assert_eq!(roster[0].tribe_name, "Alpha");

        let sbo_roster = students_for_processor(&f.db, f.sbo.id).await.unwrap();
        assert_eq!(sbo_roster.len(), 1);
    }

    #[tokio::test]
    async fn roster_gate_rejects_cross_tribe_and_non_students() {
        let f = setup().await;

        let ok = resolve_rostered_student(&f.db, &f.faculty, f.student.id)
            .await
            .unwrap();
        assert!(ok.is_some());

        let cross = resolve_rostered_student(&f.db, &f.faculty, f.other_tribe_student.id)
            .await
            .unwrap();
        assert!(cross.is_none());

        // Another processor is not a scannable student even in the same tribe.
        let not_student = resolve_rostered_student(&f.db, &f.faculty, f.sbo.id)
            .await
            .unwrap();
        assert!(not_student.is_none());

        let missing = resolve_rostered_student(&f.db, &f.faculty, 987654)
            .await
            .unwrap();
        assert!(missing.is_none());
    }
}
