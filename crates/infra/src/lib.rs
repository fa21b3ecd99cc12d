pub mod cache;
pub mod config;
pub mod db;
pub mod directory;
pub mod logging;
pub mod repositories;
