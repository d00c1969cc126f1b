pub mod cli;
pub mod config;
pub mod database;
pub mod engine;

#[cfg(test)]
pub mod testing;
