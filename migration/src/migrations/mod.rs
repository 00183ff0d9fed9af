pub mod m202607130001_create_tribes_and_users;
pub mod m202607130002_create_attendance;
