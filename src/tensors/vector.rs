use std::{
    fmt::Display,
    ops::{Add, Index, Mul, Neg, Sub},
    slice::Iter,
};

use crate::{
    domains::rational::Rational,
    error::{Error, Result},
    printer::VectorPrinter,
    tensors::matrix::Matrix,
};

/// An n-dimensional vector of rationals, `n ≥ 1`.
#[derive(Clone, Hash, PartialEq, Eq, Debug)]
pub struct Vector {
    pub(crate) data: Vec<Rational>,
}

/// The Euclidean length of a vector.
///
/// The squared norm is always exact. The length itself is exact only when the squared
/// norm is a perfect square; otherwise it is written as `√q` and carries a decimal
/// approximation.
#[derive(Clone, Debug, PartialEq)]
pub struct Magnitude {
    pub squared: Rational,
    pub exact: Option<Rational>,
    pub approx: f64,
}

impl Display for Magnitude {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.exact {
            Some(e) => f.write_str(&e.display()),
            None => write!(f, "√{}", self.squared.display()),
        }
    }
}

impl Vector {
    /// Create a new vector from a list of scalars.
    pub fn new(data: Vec<Rational>) -> Result<Vector> {
        if data.is_empty() {
            return Err(Error::Shape(
                "a vector needs at least one component".to_owned(),
            ));
        }

        Ok(Vector { data })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn iter(&self) -> Iter<'_, Rational> {
        self.data.iter()
    }

    pub fn as_slice(&self) -> &[Rational] {
        &self.data
    }

    pub fn is_zero(&self) -> bool {
        self.data.iter().all(|e| e.is_zero())
    }

    /// Create an `n×1` column matrix.
    pub fn into_matrix(self) -> Matrix {
        Matrix {
            nrows: self.data.len(),
            ncols: 1,
            data: self.data,
            augmented: false,
        }
    }

    fn check_same_len(&self, rhs: &Vector) -> Result<()> {
        if self.data.len() != rhs.data.len() {
            return Err(Error::Shape(format!(
                "vectors must share dimensions: {} vs {}",
                self.data.len(),
                rhs.data.len()
            )));
        }
        Ok(())
    }

    pub fn checked_add(&self, rhs: &Vector) -> Result<Vector> {
        self.check_same_len(rhs)?;
        Ok(Vector {
            data: self.data.iter().zip(&rhs.data).map(|(a, b)| a + b).collect(),
        })
    }

    pub fn checked_sub(&self, rhs: &Vector) -> Result<Vector> {
        self.check_same_len(rhs)?;
        Ok(Vector {
            data: self.data.iter().zip(&rhs.data).map(|(a, b)| a - b).collect(),
        })
    }

    pub fn mul_scalar(&self, e: &Rational) -> Vector {
        Vector {
            data: self.data.iter().map(|x| x * e).collect(),
        }
    }

    pub fn norm_squared(&self) -> Rational {
        self.data.iter().map(|e| e * e).sum()
    }

    /// Take the Euclidean scalar product of two vectors.
    pub fn dot(&self, rhs: &Vector) -> Result<Rational> {
        self.check_same_len(rhs)?;
        Ok(self.data.iter().zip(&rhs.data).map(|(a, b)| a * b).sum())
    }

    pub fn magnitude(&self) -> Magnitude {
        let squared = self.norm_squared();
        Magnitude {
            exact: squared.sqrt_exact(),
            approx: squared.to_f64().sqrt(),
            squared,
        }
    }

    /// Project the vector onto the `target` vector.
    pub fn project(&self, target: &Vector) -> Result<Vector> {
        let scale = self.dot(target)?.checked_div(&target.norm_squared())?;
        Ok(target.mul_scalar(&scale))
    }

    /// Compute the generalized cross product in `dim` dimensions.
    ///
    /// For `dim = 2` the two input vectors yield the single pseudo-scalar
    /// `a₁b₂ − a₂b₁`. For `dim ≥ 3` exactly `dim − 1` vectors are required and the
    /// result is orthogonal to each of them: its `i`th component is `(−1)^i` times the
    /// determinant of the stacked vectors with column `i` removed.
    pub fn cross(dim: usize, vectors: &[Vector]) -> Result<Vector> {
        if dim < 2 {
            return Err(Error::Shape(
                "a cross product needs at least two dimensions".to_owned(),
            ));
        }

        let expected = if dim == 2 { 2 } else { dim - 1 };
        if vectors.len() != expected {
            return Err(Error::Shape(format!(
                "a cross product in {} dimensions takes {} vectors, not {}",
                dim,
                expected,
                vectors.len()
            )));
        }

        if let Some(v) = vectors.iter().find(|v| v.len() != dim) {
            return Err(Error::Shape(format!(
                "every vector of a cross product in {} dimensions must have {} components, not {}",
                dim,
                dim,
                v.len()
            )));
        }

        match dim {
            2 => {
                let (a, b) = (&vectors[0].data, &vectors[1].data);
                Vector::new(vec![&a[0] * &b[1] - &a[1] * &b[0]])
            }
            3 => {
                let (a, b) = (&vectors[0].data, &vectors[1].data);
                Vector::new(vec![
                    &a[1] * &b[2] - &a[2] * &b[1],
                    &a[2] * &b[0] - &a[0] * &b[2],
                    &a[0] * &b[1] - &a[1] * &b[0],
                ])
            }
            _ => {
                let stacked = Matrix::from_linear(
                    vectors.iter().flat_map(|v| v.data.iter().cloned()).collect(),
                    dim - 1,
                    dim,
                )?;

                let data = (0..dim)
                    .map(|i| {
                        let d = stacked.remove_column(i).determinant()?;
                        Ok(if i % 2 == 1 { -d } else { d })
                    })
                    .collect::<Result<Vec<_>>>()?;

                Vector::new(data)
            }
        }
    }
}

impl Index<usize> for Vector {
    type Output = Rational;

    /// Get the `i`th entry of the vector.
    #[inline]
    fn index(&self, index: usize) -> &Self::Output {
        &self.data[index]
    }
}

impl Display for Vector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        VectorPrinter::new(self).fmt(f)
    }
}

impl Add<&Vector> for &Vector {
    type Output = Vector;

    /// Add two vectors. Panics on a length mismatch.
    fn add(self, rhs: &Vector) -> Self::Output {
        self.checked_add(rhs).unwrap_or_else(|e| panic!("{}", e))
    }
}

impl Sub<&Vector> for &Vector {
    type Output = Vector;

    fn sub(self, rhs: &Vector) -> Self::Output {
        self.checked_sub(rhs).unwrap_or_else(|e| panic!("{}", e))
    }
}

impl Mul<&Rational> for &Vector {
    type Output = Vector;

    fn mul(self, rhs: &Rational) -> Self::Output {
        self.mul_scalar(rhs)
    }
}

impl Neg for Vector {
    type Output = Vector;

    fn neg(mut self) -> Self::Output {
        for e in &mut self.data {
            *e = -&*e;
        }

        self
    }
}
