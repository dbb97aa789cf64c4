// ABOUTME: Destination store access module
// ABOUTME: Exports connection handling for the hosted PostgreSQL database

pub mod connection;

pub use connection::connect;
