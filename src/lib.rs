//! Tutorica is an exact-rational linear algebra and root-finding engine that explains
//! every step it takes.
//!
//! Every operation returns its procedure as text next to its result, so that a front
//! end can show how a determinant was expanded, how a system was reduced or how a root
//! was approached.
//!
//! For example:
//!
//! ```
//! use tutorica::{operations, tensors::matrix::Matrix};
//!
//! let a = Matrix::from_nested_vec(vec![
//!     vec![1.into(), 2.into()],
//!     vec![3.into(), 4.into()],
//! ])
//! .unwrap();
//!
//! let inv = operations::mat_invert(("A", &a)).unwrap();
//! println!("{}:\n{}", inv.name, inv.trace);
//! assert!((&a * &inv.value).is_identity());
//! ```

pub mod derivative;
pub mod domain;
pub mod domains;
pub mod error;
pub mod function;
pub mod operations;
pub mod parser;
pub mod printer;
pub mod registry;
pub mod roots;
pub mod settings;
pub mod solve;
pub mod tensors;
