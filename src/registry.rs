//! Named entities and their JSON files.
//!
//! Matrices and systems are named `A` to `Z`, vectors `a` to `z` and functions `f(x)`.
//! Each kind lives in its own file in a data directory. Keys this version does not know
//! are kept with the entity and written back unchanged.

use std::{
    collections::BTreeMap,
    fs,
    path::Path,
};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::{
    domains::rational::Rational,
    error::{Error, Result},
    function::Function,
    tensors::{matrix::Matrix, vector::Vector},
};

pub const MATRICES_FILE: &str = "matrices.json";
pub const VECTORS_FILE: &str = "vectors.json";
pub const SYSTEMS_FILE: &str = "systems.json";
pub const FUNCTIONS_FILE: &str = "functions.json";

/// A stored value with the keys that were read alongside it but not understood.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry<T> {
    pub value: T,
    pub extra: Map<String, Value>,
}

impl<T> Entry<T> {
    fn new(value: T) -> Entry<T> {
        Entry {
            value,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct MatrixRecord {
    rows: usize,
    cols: usize,
    values: Vec<Vec<Rational>>,
    #[serde(default)]
    augmented: bool,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl MatrixRecord {
    fn from_entry(e: &Entry<Matrix>) -> MatrixRecord {
        MatrixRecord {
            rows: e.value.nrows(),
            cols: e.value.ncols(),
            values: e.value.row_iter().map(|r| r.to_vec()).collect(),
            augmented: e.value.is_augmented(),
            extra: e.extra.clone(),
        }
    }

    fn into_entry(self, name: &str) -> Result<Entry<Matrix>> {
        if self.values.len() != self.rows || self.values.iter().any(|r| r.len() != self.cols) {
            return Err(Error::Persistence(format!(
                "matrix {} is declared {}×{} but its values do not match",
                name, self.rows, self.cols
            )));
        }

        let value = Matrix::from_nested_vec(self.values)?.with_augmented(self.augmented)?;
        Ok(Entry {
            value,
            extra: self.extra,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct VectorRecord {
    values: Vec<Rational>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct FunctionRecord {
    name: String,
    expr: String,
    #[serde(default)]
    rendered: bool,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

fn is_single(name: &str, valid: impl Fn(char) -> bool) -> bool {
    let mut chars = name.chars();
    matches!((chars.next(), chars.next()), (Some(c), None) if valid(c))
}

fn check_name(name: &str, kind: &str, valid: impl Fn(char) -> bool, hint: &str) -> Result<()> {
    if is_single(name, valid) {
        Ok(())
    } else {
        Err(Error::Parse(format!(
            "'{}' is not a valid {} name; use {}",
            name, kind, hint
        )))
    }
}

/// The four dictionaries of named entities, in lexicographic order of their names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Registry {
    matrices: BTreeMap<String, Entry<Matrix>>,
    vectors: BTreeMap<String, Entry<Vector>>,
    systems: BTreeMap<String, Entry<Matrix>>,
    functions: BTreeMap<String, Entry<Function>>,
}

impl Registry {
    pub fn new() -> Registry {
        Registry::default()
    }

    /// Store a matrix under a name `A` to `Z`, replacing any previous one.
    pub fn insert_matrix(&mut self, name: &str, m: Matrix) -> Result<()> {
        check_name(name, "matrix", |c| c.is_ascii_uppercase(), "a letter from A to Z")?;
        self.matrices.insert(name.to_owned(), Entry::new(m));
        Ok(())
    }

    pub fn insert_vector(&mut self, name: &str, v: Vector) -> Result<()> {
        check_name(name, "vector", |c| c.is_ascii_lowercase(), "a letter from a to z")?;
        self.vectors.insert(name.to_owned(), Entry::new(v));
        Ok(())
    }

    /// Store a system, which must be an augmented matrix.
    pub fn insert_system(&mut self, name: &str, s: Matrix) -> Result<()> {
        check_name(name, "system", |c| c.is_ascii_uppercase(), "a letter from A to Z")?;
        if !s.is_augmented() {
            return Err(Error::Shape(format!(
                "system {} must be an augmented matrix",
                name
            )));
        }
        self.systems.insert(name.to_owned(), Entry::new(s));
        Ok(())
    }

    /// Store a function under its own name.
    pub fn insert_function(&mut self, f: Function) {
        self.functions.insert(f.name().to_owned(), Entry::new(f));
    }

    pub fn matrix(&self, name: &str) -> Option<&Matrix> {
        self.matrices.get(name).map(|e| &e.value)
    }

    pub fn vector(&self, name: &str) -> Option<&Vector> {
        self.vectors.get(name).map(|e| &e.value)
    }

    pub fn system(&self, name: &str) -> Option<&Matrix> {
        self.systems.get(name).map(|e| &e.value)
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.get(name).map(|e| &e.value)
    }

    pub fn function_mut(&mut self, name: &str) -> Option<&mut Function> {
        self.functions.get_mut(name).map(|e| &mut e.value)
    }

    pub fn remove_matrix(&mut self, name: &str) -> Option<Matrix> {
        self.matrices.remove(name).map(|e| e.value)
    }

    pub fn remove_vector(&mut self, name: &str) -> Option<Vector> {
        self.vectors.remove(name).map(|e| e.value)
    }

    pub fn remove_system(&mut self, name: &str) -> Option<Matrix> {
        self.systems.remove(name).map(|e| e.value)
    }

    pub fn remove_function(&mut self, name: &str) -> Option<Function> {
        self.functions.remove(name).map(|e| e.value)
    }

    pub fn matrices(&self) -> impl Iterator<Item = (&str, &Entry<Matrix>)> {
        self.matrices.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn vectors(&self) -> impl Iterator<Item = (&str, &Entry<Vector>)> {
        self.vectors.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn systems(&self) -> impl Iterator<Item = (&str, &Entry<Matrix>)> {
        self.systems.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn functions(&self) -> impl Iterator<Item = (&str, &Entry<Function>)> {
        self.functions.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.matrices.is_empty()
            && self.vectors.is_empty()
            && self.systems.is_empty()
            && self.functions.is_empty()
    }

    /// Read the four files from `dir`. Missing files are empty dictionaries.
    pub fn load(dir: &Path) -> Result<Registry> {
        let mut r = Registry::new();

        for (name, rec) in read_file::<MatrixRecord>(&dir.join(MATRICES_FILE))? {
            let e = rec.into_entry(&name)?;
            check_name(&name, "matrix", |c| c.is_ascii_uppercase(), "a letter from A to Z")?;
            r.matrices.insert(name, e);
        }

        for (name, rec) in read_file::<MatrixRecord>(&dir.join(SYSTEMS_FILE))? {
            let e = rec.into_entry(&name)?;
            r.insert_system(&name, e.value)?;
            if let Some(s) = r.systems.get_mut(&name) {
                s.extra = e.extra;
            }
        }

        for (name, rec) in read_file::<VectorRecord>(&dir.join(VECTORS_FILE))? {
            check_name(&name, "vector", |c| c.is_ascii_lowercase(), "a letter from a to z")?;
            let value = Vector::new(rec.values)?;
            r.vectors.insert(
                name,
                Entry {
                    value,
                    extra: rec.extra,
                },
            );
        }

        for (key, rec) in read_file::<FunctionRecord>(&dir.join(FUNCTIONS_FILE))? {
            if key != rec.name {
                debug!(key = %key, name = %rec.name, "function stored under a different key");
            }
            let value = Function::restore(&rec.name, &rec.expr, rec.rendered)?;
            r.functions.insert(
                rec.name,
                Entry {
                    value,
                    extra: rec.extra,
                },
            );
        }

        info!(
            matrices = r.matrices.len(),
            vectors = r.vectors.len(),
            systems = r.systems.len(),
            functions = r.functions.len(),
            "loaded registry"
        );
        Ok(r)
    }

    /// Write the four files to `dir`, which is created if needed.
    pub fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;

        let matrices: BTreeMap<&str, MatrixRecord> = self
            .matrices
            .iter()
            .map(|(k, e)| (k.as_str(), MatrixRecord::from_entry(e)))
            .collect();
        write_file(&dir.join(MATRICES_FILE), &matrices)?;

        let systems: BTreeMap<&str, MatrixRecord> = self
            .systems
            .iter()
            .map(|(k, e)| (k.as_str(), MatrixRecord::from_entry(e)))
            .collect();
        write_file(&dir.join(SYSTEMS_FILE), &systems)?;

        let vectors: BTreeMap<&str, VectorRecord> = self
            .vectors
            .iter()
            .map(|(k, e)| {
                (
                    k.as_str(),
                    VectorRecord {
                        values: e.value.as_slice().to_vec(),
                        extra: e.extra.clone(),
                    },
                )
            })
            .collect();
        write_file(&dir.join(VECTORS_FILE), &vectors)?;

        let functions: BTreeMap<&str, FunctionRecord> = self
            .functions
            .iter()
            .map(|(k, e)| {
                (
                    k.as_str(),
                    FunctionRecord {
                        name: e.value.name().to_owned(),
                        expr: e.value.text(),
                        rendered: e.value.is_rendered(),
                        extra: e.extra.clone(),
                    },
                )
            })
            .collect();
        write_file(&dir.join(FUNCTIONS_FILE), &functions)?;

        info!(dir = %dir.display(), "saved registry");
        Ok(())
    }
}

fn read_file<T: DeserializeOwned>(path: &Path) -> Result<BTreeMap<String, T>> {
    if !path.exists() {
        debug!(path = %path.display(), "no file, starting empty");
        return Ok(BTreeMap::new());
    }

    let text = fs::read_to_string(path)?;
    if text.trim().is_empty() {
        return Ok(BTreeMap::new());
    }

    serde_json::from_str(&text)
        .map_err(|e| Error::Persistence(format!("{}: {}", path.display(), e)))
}

fn write_file<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}

#[cfg(test)]
mod test {
    use crate::{error::Error, tensors::matrix::Matrix};

    use super::Registry;

    #[test]
    fn names_are_checked() {
        let mut r = Registry::new();
        let m = Matrix::identity(2);

        assert!(r.insert_matrix("A", m.clone()).is_ok());
        assert!(matches!(r.insert_matrix("a", m.clone()), Err(Error::Parse(_))));
        assert!(matches!(r.insert_matrix("AB", m.clone()), Err(Error::Parse(_))));
        assert!(matches!(r.insert_system("S", m.clone()), Err(Error::Shape(_))));
        assert!(r
            .insert_system("S", m.with_augmented(true).unwrap())
            .is_ok());
    }

    #[test]
    fn lexicographic_order() {
        let mut r = Registry::new();
        for name in ["C", "A", "B"] {
            r.insert_matrix(name, Matrix::identity(1)).unwrap();
        }
        let names: Vec<&str> = r.matrices().map(|(k, _)| k).collect();
        assert_eq!(names, ["A", "B", "C"]);
    }
}
