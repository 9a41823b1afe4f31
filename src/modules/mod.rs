pub mod api;
pub mod auth;
pub mod config;
pub mod logger;
pub mod notify;
pub mod quota;
pub mod watch;
