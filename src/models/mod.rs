pub mod job;
pub mod university;
