use std::{
    fmt::Display,
    ops::{Add, Index, IndexMut, Mul, Neg, Sub},
    slice::Chunks,
};

use tracing::debug;

use crate::{
    domains::rational::Rational,
    error::{Error, Result},
    printer::{format_factor, subscript, FactorOptions, MatrixPrinter, MINUS},
    tensors::vector::Vector,
};

/// A matrix with rational entries, stored row-major.
///
/// When `augmented` is set, the last column is the constants column of a linear
/// system. Indexing is unaffected by the flag.
#[derive(Clone, Hash, PartialEq, Eq, Debug)]
pub struct Matrix {
    pub(crate) data: Vec<Rational>,
    pub(crate) nrows: usize,
    pub(crate) ncols: usize,
    pub(crate) augmented: bool,
}

/// An elementary row operation. Rows are zero-based.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RowOperation {
    Swap(usize, usize),
    Scale {
        row: usize,
        factor: Rational,
    },
    /// `row[target] ← row[target] + factor · row[source]`
    AddMultiple {
        target: usize,
        source: usize,
        factor: Rational,
    },
}

impl RowOperation {
    /// Apply the operation to `m` in place.
    pub fn apply(&self, m: &mut Matrix) {
        match self {
            RowOperation::Swap(a, b) => m.swap_rows(*a, *b),
            RowOperation::Scale { row, factor } => {
                for l in 0..m.ncols {
                    m[(*row, l)] *= factor;
                }
            }
            RowOperation::AddMultiple {
                target,
                source,
                factor,
            } => {
                for l in 0..m.ncols {
                    let e = &m[(*source, l)] * factor;
                    m[(*target, l)] += &e;
                }
            }
        }
    }
}

impl Display for RowOperation {
    /// Write the operation in the `R₂ → R₂ − 3R₁` notation, with one-based rows.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let r = |i: usize| format!("R{}", subscript(i + 1));
        match self {
            RowOperation::Swap(a, b) => write!(f, "{} ↔ {}", r(*a), r(*b)),
            RowOperation::Scale { row, factor } => write!(
                f,
                "{} → {}{}",
                r(*row),
                format_factor(factor, FactorOptions::coefficient()),
                r(*row)
            ),
            RowOperation::AddMultiple {
                target,
                source,
                factor,
            } => write!(
                f,
                "{} → {} {} {}{}",
                r(*target),
                r(*target),
                if factor.is_negative() { MINUS } else { '+' },
                format_factor(&factor.abs(), FactorOptions::coefficient()),
                r(*source)
            ),
        }
    }
}

/// The result of bringing a matrix to upper-triangular form with partial pivoting.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Triangularization {
    pub upper: Matrix,
    /// Whether an odd number of row swaps was performed.
    pub odd_parity: bool,
    pub steps: Vec<RowOperation>,
}

/// A determinant, together with the elimination that produced it for matrices of size three or more.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Determinant {
    pub value: Rational,
    pub elimination: Option<Triangularization>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Inverse {
    pub inverse: Matrix,
    pub adjugate: Matrix,
    pub det: Rational,
}

impl Matrix {
    /// Create a new zeroed matrix with `nrows` rows and `ncols` columns.
    pub fn zeros(nrows: usize, ncols: usize) -> Matrix {
        Matrix {
            data: vec![Rational::zero(); nrows * ncols],
            nrows,
            ncols,
            augmented: false,
        }
    }

    /// Create a new square matrix with ones on the main diagonal and zeroes elsewhere.
    pub fn identity(nrows: usize) -> Matrix {
        Matrix {
            data: (0..nrows * nrows)
                .map(|i| {
                    if i % nrows == i / nrows {
                        Rational::one()
                    } else {
                        Rational::zero()
                    }
                })
                .collect(),
            nrows,
            ncols: nrows,
            augmented: false,
        }
    }

    /// Convert a row-major linear representation of a matrix to a `Matrix`.
    pub fn from_linear(data: Vec<Rational>, nrows: usize, ncols: usize) -> Result<Matrix> {
        if nrows == 0 || ncols == 0 {
            return Err(Error::Shape(
                "a matrix needs at least one row and one column".to_owned(),
            ));
        }

        if data.len() != nrows * ncols {
            return Err(Error::Shape(format!(
                "data length does not match matrix dimensions: {} vs {}×{}",
                data.len(),
                nrows,
                ncols
            )));
        }

        Ok(Matrix {
            data,
            nrows,
            ncols,
            augmented: false,
        })
    }

    /// Create a new matrix from a list of rows.
    pub fn from_nested_vec(rows: Vec<Vec<Rational>>) -> Result<Matrix> {
        let nrows = rows.len();
        let ncols = rows.first().map(|r| r.len()).unwrap_or(0);

        let mut data = Vec::with_capacity(nrows * ncols);
        for r in rows {
            if r.len() != ncols {
                return Err(Error::Shape("matrix is not rectangular".to_owned()));
            }
            data.extend(r);
        }

        Matrix::from_linear(data, nrows, ncols)
    }

    /// Create an augmented matrix whose last column holds the constants of a system.
    pub fn augmented(rows: Vec<Vec<Rational>>) -> Result<Matrix> {
        Matrix::from_nested_vec(rows)?.with_augmented(true)
    }

    /// Set or clear the augmented flag. An augmented matrix needs at least two columns.
    pub fn with_augmented(mut self, augmented: bool) -> Result<Matrix> {
        if augmented && self.ncols < 2 {
            return Err(Error::Shape(
                "an augmented matrix needs at least two columns".to_owned(),
            ));
        }

        self.augmented = augmented;
        Ok(self)
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn is_augmented(&self) -> bool {
        self.augmented
    }

    /// The entries in row-major order.
    pub fn data(&self) -> &[Rational] {
        &self.data
    }

    /// Return an iterator over the rows of the matrix.
    pub fn row_iter(&self) -> Chunks<'_, Rational> {
        self.data.chunks(self.ncols)
    }

    pub fn row(&self, i: usize) -> &[Rational] {
        &self.data[i * self.ncols..(i + 1) * self.ncols]
    }

    pub fn column(&self, j: usize) -> Vec<Rational> {
        (0..self.nrows).map(|i| self[(i, j)].clone()).collect()
    }

    /// Return true iff every entry in the matrix is zero.
    pub fn is_zero(&self) -> bool {
        self.data.iter().all(|e| e.is_zero())
    }

    pub fn is_square(&self) -> bool {
        self.nrows == self.ncols
    }

    pub fn is_identity(&self) -> bool {
        self.is_square()
            && self.data.iter().enumerate().all(|(i, e)| {
                if i % self.ncols == i / self.ncols {
                    e.is_one()
                } else {
                    e.is_zero()
                }
            })
    }

    /// The coefficient block: every column left of the separator of an augmented matrix,
    /// or a plain copy otherwise.
    pub fn coefficients(&self) -> Matrix {
        if self.augmented {
            self.remove_column(self.ncols - 1)
        } else {
            let mut m = self.clone();
            m.augmented = false;
            m
        }
    }

    /// The constants column of an augmented matrix.
    pub fn constants(&self) -> Result<Vector> {
        if !self.augmented {
            return Err(Error::Shape("the matrix is not augmented".to_owned()));
        }

        Vector::new(self.column(self.ncols - 1))
    }

    /// Transpose the matrix. The result is never augmented.
    pub fn transpose(&self) -> Matrix {
        let mut m = Matrix::zeros(self.ncols, self.nrows);
        for i in 0..self.nrows {
            for j in 0..self.ncols {
                m[(j, i)] = self[(i, j)].clone();
            }
        }
        m
    }

    /// Multiply the scalar `e` to each entry of the matrix.
    pub fn mul_scalar(&self, e: &Rational) -> Matrix {
        Matrix {
            data: self.data.iter().map(|ee| ee * e).collect(),
            nrows: self.nrows,
            ncols: self.ncols,
            augmented: self.augmented,
        }
    }

    fn check_same_shape(&self, rhs: &Matrix) -> Result<()> {
        if self.nrows != rhs.nrows || self.ncols != rhs.ncols {
            return Err(Error::Shape(format!(
                "matrices must share dimensions: {}×{} vs {}×{}",
                self.nrows, self.ncols, rhs.nrows, rhs.ncols
            )));
        }
        Ok(())
    }

    pub fn checked_add(&self, rhs: &Matrix) -> Result<Matrix> {
        self.check_same_shape(rhs)?;

        Ok(Matrix {
            data: self.data.iter().zip(&rhs.data).map(|(a, b)| a + b).collect(),
            nrows: self.nrows,
            ncols: self.ncols,
            augmented: self.augmented,
        })
    }

    pub fn checked_sub(&self, rhs: &Matrix) -> Result<Matrix> {
        self.check_same_shape(rhs)?;

        Ok(Matrix {
            data: self.data.iter().zip(&rhs.data).map(|(a, b)| a - b).collect(),
            nrows: self.nrows,
            ncols: self.ncols,
            augmented: self.augmented,
        })
    }

    /// Multiply two matrices.
    pub fn checked_mul(&self, rhs: &Matrix) -> Result<Matrix> {
        if self.ncols != rhs.nrows {
            return Err(Error::Shape(format!(
                "the left matrix has {} columns but the right matrix has {} rows",
                self.ncols, rhs.nrows
            )));
        }

        let mut m = Matrix::zeros(self.nrows, rhs.ncols);
        for i in 0..self.nrows {
            for j in 0..rhs.ncols {
                m[(i, j)] = (0..self.ncols).map(|k| &self[(i, k)] * &rhs[(k, j)]).sum();
            }
        }

        Ok(m)
    }

    /// Multiply by a column vector, yielding an `n×1` matrix.
    pub fn mul_vector(&self, v: &Vector) -> Result<Matrix> {
        self.checked_mul(&v.clone().into_matrix())
    }

    /// Swap two rows in place.
    pub fn swap_rows(&mut self, i: usize, j: usize) {
        if i == j {
            return;
        }

        for l in 0..self.ncols {
            self.data.swap(i * self.ncols + l, j * self.ncols + l);
        }
    }

    /// The matrix without column `j`.
    pub(crate) fn remove_column(&self, j: usize) -> Matrix {
        let data = self
            .data
            .iter()
            .enumerate()
            .filter(|(i, _)| i % self.ncols != j)
            .map(|(_, e)| e.clone())
            .collect();

        Matrix {
            data,
            nrows: self.nrows,
            ncols: self.ncols - 1,
            augmented: false,
        }
    }

    /// A copy with column `j` replaced by `column`.
    pub(crate) fn replace_column(&self, j: usize, column: &[Rational]) -> Matrix {
        let mut m = self.clone();
        for (i, e) in column.iter().enumerate() {
            m[(i, j)] = e.clone();
        }
        m
    }

    /// The matrix obtained by deleting row `i` and column `j`.
    pub fn minor(&self, i: usize, j: usize) -> Result<Matrix> {
        if self.nrows < 2 || self.ncols < 2 {
            return Err(Error::Shape(
                "a minor requires at least two rows and two columns".to_owned(),
            ));
        }
        if i >= self.nrows || j >= self.ncols {
            return Err(Error::Shape(format!(
                "entry ({}, {}) lies outside a {}×{} matrix",
                i + 1,
                j + 1,
                self.nrows,
                self.ncols
            )));
        }

        let data = self
            .data
            .iter()
            .enumerate()
            .filter(|(k, _)| k / self.ncols != i && k % self.ncols != j)
            .map(|(_, e)| e.clone())
            .collect();

        Ok(Matrix {
            data,
            nrows: self.nrows - 1,
            ncols: self.ncols - 1,
            augmented: false,
        })
    }

    /// Write the matrix in echelon form in place and return the number of pivots
    /// found in the first `max_col` columns.
    fn echelon(&mut self, max_col: usize) -> usize {
        let mut i = 0;
        for j in 0..max_col {
            if i >= self.nrows {
                break;
            }

            if self[(i, j)].is_zero() {
                // select a non-zero pivot
                match (i + 1..self.nrows).find(|&k| !self[(k, j)].is_zero()) {
                    Some(k) => self.swap_rows(i, k),
                    None => continue,
                }
            }

            let inv_x = Rational::one() / self[(i, j)].clone();
            for k in i + 1..self.nrows {
                if !self[(k, j)].is_zero() {
                    let s = &self[(k, j)] * &inv_x;
                    self[(k, j)] = Rational::zero();
                    for l in j + 1..self.ncols {
                        let e = &self[(k, l)] - &(&self[(i, l)] * &s);
                        self[(k, l)] = e;
                    }
                }
            }

            i += 1;
        }

        i
    }

    /// The rank of the matrix, counting every column including a constants column.
    pub fn rank(&self) -> usize {
        let mut m = self.clone();
        m.echelon(self.ncols)
    }

    /// Bring a copy of the matrix to upper-triangular form using partial pivoting by
    /// magnitude. A column whose largest candidate pivot is zero is skipped.
    pub fn triangularize(&self) -> Triangularization {
        let mut upper = self.clone();
        let mut odd_parity = false;
        let mut steps = vec![];

        for i in 0..self.nrows.min(self.ncols) {
            let mut r = i;
            for k in i + 1..self.nrows {
                if upper[(k, i)].abs() > upper[(r, i)].abs() {
                    r = k;
                }
            }

            if r != i {
                debug!(column = i, row = r, "pivot swap");
                let op = RowOperation::Swap(i, r);
                op.apply(&mut upper);
                steps.push(op);
                odd_parity = !odd_parity;
            }

            if upper[(i, i)].is_zero() {
                continue;
            }

            for j in i + 1..self.nrows {
                if upper[(j, i)].is_zero() {
                    continue;
                }

                let factor = -(upper[(j, i)].clone() / upper[(i, i)].clone());
                let op = RowOperation::AddMultiple {
                    target: j,
                    source: i,
                    factor,
                };
                op.apply(&mut upper);
                steps.push(op);
            }
        }

        Triangularization {
            upper,
            odd_parity,
            steps,
        }
    }

    fn check_square(&self, what: &str) -> Result<()> {
        if !self.is_square() {
            return Err(Error::Shape(format!(
                "the {} requires a square matrix, not {}×{}",
                what, self.nrows, self.ncols
            )));
        }
        Ok(())
    }

    /// Compute the determinant. Matrices of size three and up are triangularized and the
    /// elimination is returned alongside the value.
    pub fn det(&self) -> Result<Determinant> {
        self.check_square("determinant")?;

        let d = &self.data;
        match self.nrows {
            1 => Ok(Determinant {
                value: d[0].clone(),
                elimination: None,
            }),
            2 => Ok(Determinant {
                value: &d[0] * &d[3] - &d[1] * &d[2],
                elimination: None,
            }),
            n => {
                let t = self.triangularize();
                let mut value = Rational::one();
                for x in 0..n {
                    value *= &t.upper[(x, x)];
                }
                if t.odd_parity {
                    value = -value;
                }

                Ok(Determinant {
                    value,
                    elimination: Some(t),
                })
            }
        }
    }

    /// The value of the determinant.
    pub fn determinant(&self) -> Result<Rational> {
        Ok(self.det()?.value)
    }

    /// The cofactor `(−1)^(i+j) · det(minor(i, j))`.
    pub fn cofactor(&self, i: usize, j: usize) -> Result<Rational> {
        let d = self.minor(i, j)?.determinant()?;
        Ok(if (i + j) % 2 == 1 { -d } else { d })
    }

    /// The transpose of the matrix of cofactors.
    pub fn adjugate(&self) -> Result<Matrix> {
        self.check_square("adjugate")?;

        if self.nrows == 1 {
            return Ok(Matrix::identity(1));
        }

        let mut adj = Matrix::zeros(self.nrows, self.ncols);
        for i in 0..self.nrows {
            for j in 0..self.ncols {
                adj[(j, i)] = self.cofactor(i, j)?;
            }
        }

        Ok(adj)
    }

    /// Compute the inverse as `adj(A) / det(A)`.
    pub fn inverse(&self) -> Result<Inverse> {
        self.check_square("inverse")?;

        let det = self.determinant()?;
        if det.is_zero() {
            return Err(Error::ZeroDivision("singular matrix".to_owned()));
        }

        let adjugate = self.adjugate()?;
        let inverse = adjugate.mul_scalar(&det.inv()?);

        Ok(Inverse {
            inverse,
            adjugate,
            det,
        })
    }
}

impl Index<(usize, usize)> for Matrix {
    type Output = Rational;

    /// Get the `i`th row and `j`th column of the matrix, where `index=(i,j)`.
    #[inline]
    fn index(&self, index: (usize, usize)) -> &Self::Output {
        &self.data[index.0 * self.ncols + index.1]
    }
}

impl IndexMut<(usize, usize)> for Matrix {
    #[inline]
    fn index_mut(&mut self, index: (usize, usize)) -> &mut Rational {
        &mut self.data[index.0 * self.ncols + index.1]
    }
}

impl Display for Matrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        MatrixPrinter::new(self).fmt(f)
    }
}

impl Add<&Matrix> for &Matrix {
    type Output = Matrix;

    /// Add two matrices. Panics on a shape mismatch.
    fn add(self, rhs: &Matrix) -> Self::Output {
        self.checked_add(rhs).unwrap_or_else(|e| panic!("{}", e))
    }
}

impl Sub<&Matrix> for &Matrix {
    type Output = Matrix;

    /// Subtract two matrices. Panics on a shape mismatch.
    fn sub(self, rhs: &Matrix) -> Self::Output {
        self.checked_sub(rhs).unwrap_or_else(|e| panic!("{}", e))
    }
}

impl Mul<&Matrix> for &Matrix {
    type Output = Matrix;

    /// Multiply two matrices. Panics on a shape mismatch.
    fn mul(self, rhs: &Matrix) -> Self::Output {
        self.checked_mul(rhs).unwrap_or_else(|e| panic!("{}", e))
    }
}

impl Mul<&Rational> for &Matrix {
    type Output = Matrix;

    fn mul(self, rhs: &Rational) -> Self::Output {
        self.mul_scalar(rhs)
    }
}

impl Neg for Matrix {
    type Output = Matrix;

    /// Negate each entry of the matrix.
    fn neg(mut self) -> Self::Output {
        for e in &mut self.data {
            *e = -&*e;
        }

        self
    }
}

#[cfg(test)]
mod test {
    use crate::{domains::rational::Rational, error::Error, tensors::vector::Vector};

    use super::{Matrix, RowOperation};

    fn m(rows: &[&[i64]]) -> Matrix {
        Matrix::from_nested_vec(
            rows.iter()
                .map(|r| r.iter().map(|&e| e.into()).collect())
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn construction() {
        assert!(matches!(
            Matrix::from_nested_vec(vec![vec![1.into()], vec![1.into(), 2.into()]]),
            Err(Error::Shape(_))
        ));
        assert!(matches!(
            Matrix::from_nested_vec(vec![]),
            Err(Error::Shape(_))
        ));
        assert!(matches!(
            Matrix::augmented(vec![vec![1.into()]]),
            Err(Error::Shape(_))
        ));

        let a = m(&[&[1, 2, 5], &[3, 4, 6]]).with_augmented(true).unwrap();
        assert_eq!(a.coefficients(), m(&[&[1, 2], &[3, 4]]));
        assert_eq!(
            a.constants().unwrap(),
            Vector::new(vec![5.into(), 6.into()]).unwrap()
        );
        assert!(Matrix::identity(3).is_identity());
        assert!(!m(&[&[1, 0, 0]]).is_identity());
    }

    #[test]
    fn arithmetic() {
        let a = m(&[&[1, 2], &[3, 4]]);
        let b = m(&[&[0, 1], &[1, 0]]);

        assert_eq!(&(&a + &b) - &b, a);
        assert_eq!(&a * &b, m(&[&[2, 1], &[4, 3]]));
        assert_eq!(a.mul_scalar(&2.into()), m(&[&[2, 4], &[6, 8]]));
        assert_eq!(-a.clone(), m(&[&[-1, -2], &[-3, -4]]));
        assert!(matches!(
            a.checked_add(&m(&[&[1, 2]])),
            Err(Error::Shape(_))
        ));
        assert!(matches!(
            m(&[&[1, 2, 3]]).checked_mul(&a),
            Err(Error::Shape(_))
        ));
    }

    #[test]
    fn triangularize() {
        let a = m(&[&[0, 1, 2], &[1, 0, 3], &[4, -3, 8]]);
        let t = a.triangularize();

        assert_eq!(t.steps.len(), 4);
        assert_eq!(t.steps[0], RowOperation::Swap(0, 2));
        assert!(!t.odd_parity);
        for i in 0..3 {
            for j in 0..i {
                assert!(t.upper[(i, j)].is_zero());
            }
        }

        let d = a.det().unwrap();
        assert_eq!(d.value, (-2).into());
        assert!(d.elimination.is_some());
    }

    #[test]
    fn determinant() {
        assert_eq!(m(&[&[7]]).determinant().unwrap(), 7.into());
        assert_eq!(m(&[&[1, 2], &[3, 4]]).determinant().unwrap(), (-2).into());
        assert!(m(&[&[1, 2], &[3, 4]]).det().unwrap().elimination.is_none());

        // a dependent column leaves a zero on the diagonal
        let a = m(&[&[1, 2, 3], &[4, 5, 6], &[7, 8, 9]]);
        assert!(a.determinant().unwrap().is_zero());
        assert_eq!(a.rank(), 2);

        assert!(matches!(
            m(&[&[1, 2, 3]]).determinant(),
            Err(Error::Shape(_))
        ));
    }

    #[test]
    fn inverse() {
        let a = m(&[&[1, 2], &[3, 4]]);
        let inv = a.inverse().unwrap();

        assert_eq!(inv.det, (-2).into());
        assert_eq!(inv.adjugate, m(&[&[4, -2], &[-3, 1]]));
        assert_eq!(
            inv.inverse,
            Matrix::from_nested_vec(vec![
                vec![(-2).into(), 1.into()],
                vec![(3, 2).into(), Rational::from((-1, 2))],
            ])
            .unwrap()
        );
        assert!((&a * &inv.inverse).is_identity());

        let a = m(&[&[3, 2, 15, 4], &[9, 6, 7, 8], &[17, 45, 23, 12], &[13, 14, 15, 16]]);
        let inv = a.inverse().unwrap();
        assert!((&a * &inv.inverse).is_identity());
        assert!((&inv.inverse * &a).is_identity());

        assert_eq!(
            m(&[&[1, 2], &[2, 4]]).inverse(),
            Err(Error::ZeroDivision("singular matrix".to_owned()))
        );
        assert_eq!(
            Matrix::identity(3).inverse().unwrap().inverse,
            Matrix::identity(3)
        );
    }

    #[test]
    fn row_operation_display() {
        let ops = [
            RowOperation::Swap(0, 1),
            RowOperation::Scale {
                row: 0,
                factor: (1, 2).into(),
            },
            RowOperation::AddMultiple {
                target: 1,
                source: 0,
                factor: (-3).into(),
            },
            RowOperation::AddMultiple {
                target: 2,
                source: 0,
                factor: 1.into(),
            },
        ];

        let text: Vec<_> = ops.iter().map(|o| o.to_string()).collect();
        assert_eq!(
            text,
            ["R₁ ↔ R₂", "R₁ → (1/2)R₁", "R₂ → R₂ − 3R₁", "R₃ → R₃ + R₁"]
        );
    }
}
