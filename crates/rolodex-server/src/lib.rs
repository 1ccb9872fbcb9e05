pub mod auth;
pub mod avatar;
pub mod cache;
pub mod config;
pub mod mailer;
pub mod rate_limit;
pub mod session;
pub mod state;
pub mod web;
