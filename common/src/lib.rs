// Common library for the home automation bridge

pub mod admin;
pub mod bootstrap;
pub mod broker;
pub mod config;
pub mod errors;
pub mod health;
pub mod integrations;
pub mod message;
pub mod messager;
pub mod scheduler;
pub mod sensor;
pub mod telemetry;
