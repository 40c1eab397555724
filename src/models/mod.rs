pub mod admin;
pub mod announcement;
pub mod attendance;
pub mod banner;
pub mod comment;
pub mod faculty;
pub mod fees;
pub mod ledger;
pub mod result;
pub mod student;
pub mod subject;
