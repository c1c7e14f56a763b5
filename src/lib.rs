pub mod config;
pub mod dashboard;
pub mod db;
pub mod error;
pub mod routes;
pub mod state;
