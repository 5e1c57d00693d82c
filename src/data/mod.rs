pub mod course;
pub mod registration;
pub mod store;
pub mod user;
