//! Game constants shared by relay and client

pub mod rules;

pub use rules::GameRules;
