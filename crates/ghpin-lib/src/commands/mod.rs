pub mod app;
pub mod check;
pub mod pin;
