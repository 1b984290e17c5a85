pub mod app;
pub mod cli;
pub mod config;
pub mod controller;
pub mod fetch;
pub mod output;
pub mod registry;
pub mod session;
pub mod state;
pub mod transport;

#[cfg(test)]
mod tests;
