pub mod calculators;
pub mod engine;
pub mod rng;
pub mod state;
pub mod stats;

#[cfg(test)]
pub(crate) mod tests;
