pub mod access;
pub mod auth;
pub mod builds;
pub mod checklist;
pub mod config;
pub mod content;
pub mod error;
pub mod invites;
pub mod models;
pub mod registry;
pub mod routes;
pub mod state;
pub mod storage;
pub mod uploads;
