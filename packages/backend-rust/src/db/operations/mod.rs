//! Row-level reads and writes. Every function runs on the caller's
//! connection so it joins the surrounding unit of work.

pub mod answers;
pub mod assessments;
pub mod courses;
pub mod pools;
pub mod users;
