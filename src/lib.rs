//! BharatTrips - property booking marketplace backend
//!
//! This library provides property search, bookings, the host listing
//! wizard, reviews and the admin dashboard behind a JSON HTTP API.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
