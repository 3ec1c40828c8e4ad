pub mod config;
pub mod gemini;
pub mod mask;
pub mod models;
pub mod routes;
pub mod session;
pub mod tools;
pub mod upload;
