use std::fs;

use tutorica::{
    domains::rational::Rational,
    function::Function,
    registry::{Registry, FUNCTIONS_FILE, MATRICES_FILE, VECTORS_FILE},
    tensors::{matrix::Matrix, vector::Vector},
};

fn sample() -> Registry {
    let mut r = Registry::new();
    r.insert_matrix(
        "A",
        Matrix::from_nested_vec(vec![
            vec![(1, 2).into(), 2.into()],
            vec![(-3).into(), (7, 3).into()],
        ])
        .unwrap(),
    )
    .unwrap();
    r.insert_system(
        "S",
        Matrix::augmented(vec![
            vec![2.into(), 1.into(), 5.into()],
            vec![1.into(), (-1).into(), 1.into()],
        ])
        .unwrap(),
    )
    .unwrap();
    r.insert_vector("u", Vector::new(vec![1.into(), (-2, 5).into()]).unwrap())
        .unwrap();

    let f = Function::new("f(x)", "x^2 - 2").unwrap();
    r.insert_function(f.derivative());
    r.insert_function(f);

    let mut g = Function::new("g(x)", "x^2/4").unwrap();
    g.set_rendered(true);
    r.insert_function(g.derivative());
    r.insert_function(g);
    r
}

#[test]
fn round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let r = sample();
    r.save(dir.path()).unwrap();

    let back = Registry::load(dir.path()).unwrap();
    assert_eq!(back.matrix("A"), r.matrix("A"));
    assert_eq!(back.vector("u"), r.vector("u"));
    assert!(back.system("S").unwrap().is_augmented());
    assert_eq!(back.system("S"), r.system("S"));

    let f = back.function("f(x)").unwrap();
    assert_eq!(f.evaluate(3.).unwrap(), 7.);
    assert_eq!(back.function("f'(x)").unwrap().text(), "2*x");

    let names: Vec<&str> = back.functions().map(|(k, _)| k).collect();
    assert_eq!(names, ["f'(x)", "f(x)", "g'(x)", "g(x)"]);
    assert!(back.function("g(x)").unwrap().is_rendered());

    assert_eq!(back, r);
}

#[test]
fn rational_encoding() {
    let dir = tempfile::tempdir().unwrap();
    sample().save(dir.path()).unwrap();

    let text = fs::read_to_string(dir.path().join(VECTORS_FILE)).unwrap();
    let json: serde_json::Value = serde_json::from_str(&text).unwrap();
    let second = &json["u"]["values"][1];
    assert_eq!(second["type"], "Rational");
    assert_eq!(second["num"], -2);
    assert_eq!(second["den"], 5);
}

#[test]
fn unknown_keys_survive() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join(MATRICES_FILE),
        r#"{"B": {"rows": 1, "cols": 2, "augmented": false, "color": "red",
            "values": [[{"type": "Rational", "num": 4, "den": 6}, {"type": "Rational", "num": 1, "den": 1}]]}}"#,
    )
    .unwrap();
    fs::write(
        dir.path().join(FUNCTIONS_FILE),
        r#"{"g(t)": {"name": "g(t)", "expr": "t^3 - 1", "rendered": true, "image": "g.png"}}"#,
    )
    .unwrap();

    let r = Registry::load(dir.path()).unwrap();
    assert_eq!(r.matrix("B").unwrap()[(0, 0)], Rational::from((2, 3)));
    assert!(r.function("g(t)").unwrap().is_rendered());

    let out = tempfile::tempdir().unwrap();
    r.save(out.path()).unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(out.path().join(MATRICES_FILE)).unwrap()).unwrap();
    assert_eq!(json["B"]["color"], "red");
    assert_eq!(json["B"]["values"][0][0]["num"], 2);
    assert_eq!(json["B"]["values"][0][0]["den"], 3);

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(out.path().join(FUNCTIONS_FILE)).unwrap()).unwrap();
    assert_eq!(json["g(t)"]["image"], "g.png");
    assert_eq!(json["g(t)"]["rendered"], true);
}

#[test]
fn missing_files_are_empty() {
    let dir = tempfile::tempdir().unwrap();
    assert!(Registry::load(dir.path()).unwrap().is_empty());
    assert!(Registry::load(&dir.path().join("nowhere")).unwrap().is_empty());
}
