// src/lib.rs
pub mod allocation;
pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extraction;
pub mod forecast;
pub mod market;
pub mod models;
pub mod performance;
