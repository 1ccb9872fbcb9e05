pub mod birthday;
pub mod models;
pub mod validation;
