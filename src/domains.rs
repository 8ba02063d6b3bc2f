//! Number domains used by the engine.
//!
//! All linear algebra is carried out exactly over [`rational::Rational`].
//! Decimal approximations only appear transiently inside root finding.

pub mod rational;
