//! QR payload parsing.
//!
//! Codes carry either a bare identifier or a `student_id: <ID>` prefixed
//! string; whitespace around the identifier is insignificant.

/// Extracts the student identifier from a decoded QR payload.
pub fn parse_student_id(raw: &str) -> String {
    match raw.split_once("student_id:") {
        Some((_, rest)) => rest.trim().to_string(),
        None => raw.trim().to_string(),
    }
}
