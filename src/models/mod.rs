pub mod assignment;
pub mod generation;
pub mod question;
pub mod session;
pub mod user;
