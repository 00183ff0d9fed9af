pub mod attendance_record;
pub mod attendance_session;
pub mod tribe;
pub mod user;

pub use attendance_record::Entity as AttendanceRecord;
pub use attendance_session::Entity as AttendanceSession;
pub use tribe::Entity as Tribe;
pub use user::Entity as User;
