//! Dense linear algebra over exact rationals.
//!
//! A [`Matrix`](matrix::Matrix) may be flagged augmented, in which case its last
//! column holds the constants of a linear system. A [`Vector`](vector::Vector)
//! is a thin wrapper over a list of rationals that delegates to the matrix for
//! anything involving minors.

pub mod matrix;
pub mod vector;
