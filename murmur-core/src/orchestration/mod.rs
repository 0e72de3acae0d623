pub mod adapter;
pub mod limiter;
pub mod manager;
pub mod registry;
pub mod scheduler;
pub mod types;

#[cfg(test)]
mod tests;
