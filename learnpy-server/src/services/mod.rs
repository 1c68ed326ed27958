//! Business services

pub mod chat_client;
pub mod database;
pub mod password;
pub mod session;
