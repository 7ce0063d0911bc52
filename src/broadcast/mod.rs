pub mod alerts;
pub mod backend;
pub mod engine;
pub mod errors;
pub mod incident;
pub mod location;
pub mod persistence;
pub mod recording;
pub mod session;
pub mod signals;
pub mod token;
pub mod types;
