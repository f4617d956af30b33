pub mod application;
pub mod company;
pub mod job;
pub mod notification;
pub mod otp;
pub mod resume;
pub mod user;
