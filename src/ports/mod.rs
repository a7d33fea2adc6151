pub mod database;
pub mod email;
pub mod member;
pub mod spam;
