pub mod otp;
pub mod transition;
