//! Shared test doubles and cross-crate integration scenarios

pub mod doubles;

#[cfg(test)]
mod reconciliation;
