use mutorch::Configuration;
use mutorch::constraint::Constraint;
use mutorch::error::Error;
use mutorch::language::{Language, Languages};
use mutorch::operators::{Operator, Operators, Transformation};

fn c_only() -> Languages {
    Languages::new().add(Language::new("c", [".c", ".h"])).unwrap()
}

// --- languages ---

#[test]
fn add_returns_new_collection() {
    let empty = Languages::new();
    let one = empty.add(Language::new("c", [".c"])).unwrap();
    assert!(empty.is_empty());
    assert_eq!(one.len(), 1);
    assert_eq!(one.get("c").unwrap().name, "c");
}

#[test]
fn unknown_language_is_not_found() {
    assert_eq!(c_only().get("cobol").unwrap_err(), Error::LanguageNotFound("cobol".into()));
}

#[test]
fn shared_file_ending_is_illegal() {
    let err = c_only().add(Language::new("cpp", [".cpp", ".h"])).unwrap_err();
    assert!(matches!(err, Error::IllegalConfig(_)));
}

#[test]
fn overwriting_language_releases_its_endings() {
    let languages = c_only().add(Language::new("c", [".c"])).unwrap();
    let languages = languages.add(Language::new("cpp", [".h", ".cpp"])).unwrap();
    assert_eq!(languages.detect("foo.h").unwrap().name, "cpp");
}

#[test]
fn detect_uses_file_suffix() {
    let languages = c_only();
    assert_eq!(languages.detect("src/foo.c").unwrap().name, "c");
    assert_eq!(
        languages.detect("README").unwrap_err(),
        Error::LanguageNotDetected("README".into())
    );
    assert!(matches!(languages.detect("foo.py"), Err(Error::LanguageNotDetected(_))));
}

// --- operators ---

#[test]
fn operator_requires_languages_and_transformations() {
    let t = Transformation::new("a", "b");
    assert!(matches!(Operator::new("", ["c"], vec![t.clone()]), Err(Error::BadConfigFile(_))));
    assert!(matches!(Operator::new("op", Vec::<String>::new(), vec![t]), Err(Error::BadConfigFile(_))));
    assert!(matches!(Operator::new("op", ["c"], vec![]), Err(Error::BadConfigFile(_))));
}

#[test]
fn operator_with_unknown_language_is_rejected() {
    let op = Operator::new("op", ["c", "cobol"], vec![Transformation::new("a", "b")]).unwrap();
    assert_eq!(
        Operators::new().add(op, &c_only()).unwrap_err(),
        Error::LanguageNotFound("cobol".into())
    );
}

#[test]
fn transformation_index_out_of_range() {
    let op = Operator::new("op", ["c"], vec![Transformation::new("a", "b")]).unwrap();
    assert!(op.transformation(0).is_ok());
    assert_eq!(
        op.transformation(1).unwrap_err(),
        Error::TransformationNotFound {
            operator: "op".into(),
            index: 1
        }
    );
}

#[test]
fn with_constraint_ignores_duplicates() {
    let t = Transformation::new(":[x] * :[y]", ":[x] / :[y]")
        .with_constraint(Constraint::is_single_term("x"))
        .with_constraint(Constraint::is_single_term("x"));
    assert_eq!(t.constraints.len(), 1);
}

// --- configuration files ---

#[test]
fn system_catalogue_loads() {
    let config = Configuration::system().unwrap();
    assert!(config.languages.contains("c"));
    assert!(config.languages.contains("python"));
    let op = config.operators.get("flip-arithmetic-operator").unwrap();
    assert_eq!(op.transformations()[0].match_template, ":[x] + :[y]");
    assert!(config.operators.for_language("python").any(|o| o.name() == "flip-boolean-operator-python"));
    assert!(!config.operators.for_language("python").any(|o| o.name() == "flip-boolean-operator"));
}

#[test]
fn user_config_extends_system_catalogue() {
    let system = Configuration::system().unwrap();
    let yaml = r#"
version: '1.0'
languages:
  - name: go
    file-endings: [.go]
operators:
  - name: swap-and
    languages: [go, c]
    transformations:
      - match: ':[x] && :[y]'
        rewrite: ':[y] && :[x]'
        constraints:
          - type: preceded-by
            any-of: ['(']
"#;
    let config = Configuration::from_yaml(yaml, Some(&system)).unwrap();
    assert_eq!(config.languages.len(), system.languages.len() + 1);
    let op = config.operators.get("swap-and").unwrap();
    assert!(op.supports_language("go"));
    assert_eq!(op.transformations()[0].constraints, vec![Constraint::preceded_by(["("])]);
    // the parent is untouched
    assert!(system.operators.get("swap-and").is_err());
}

#[test]
fn user_operator_overrides_system_operator() {
    let system = Configuration::system().unwrap();
    let yaml = r#"
version: 1.0
operators:
  - name: flip-boolean-literal
    languages: [c]
    transformations:
      - match: 'true'
        rewrite: '0'
"#;
    let config = Configuration::from_yaml(yaml, Some(&system)).unwrap();
    let op = config.operators.get("flip-boolean-literal").unwrap();
    assert_eq!(op.transformations().len(), 1);
    assert_eq!(op.transformations()[0].rewrite, "0");
}

#[test]
fn duplicate_operator_in_one_file_is_rejected() {
    let yaml = r#"
version: '1.0'
languages:
  - name: c
    file-endings: [.c]
operators:
  - name: dup
    languages: [c]
    transformations:
      - match: 'a'
        rewrite: 'b'
  - name: dup
    languages: [c]
    transformations:
      - match: 'b'
        rewrite: 'a'
"#;
    assert_eq!(
        Configuration::from_yaml(yaml, None).unwrap_err(),
        Error::OperatorNameAlreadyExists("dup".into())
    );
}

#[test]
fn bad_config_files() {
    let cases = [
        "languages: []",
        "version: '2.0'",
        "version: '1.0'\noperators:\n  - name: x\n",
        "version: '1.0'\noperators:\n  - name: x\n    languages: [c]\n    transformations: []\n",
        "version: [1.0",
        "version: '1.0'\noperators:\n  - name: x\n    languages: [c]\n    transformations:\n      - match: a\n        rewrite: b\n        constraints:\n          - type: sometimes\n",
    ];
    for yaml in cases {
        let err = Configuration::from_yaml(yaml, None).unwrap_err();
        assert!(matches!(err, Error::BadConfigFile(_)), "{:?} -> {:?}", yaml, err);
    }
}

#[test]
fn load_reads_explicit_user_config() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("user.yml");
    std::fs::write(
        &path,
        "version: '1.0'\nlanguages:\n  - name: go\n    file-endings: [.go]\n",
    )
    .unwrap();
    let config = Configuration::load(Some(path.as_path())).unwrap();
    assert!(config.languages.contains("go"));
    assert!(config.languages.contains("c"));

    let missing = dir.path().join("missing.yml");
    assert!(matches!(Configuration::load(Some(missing.as_path())), Err(Error::BadConfigFile(_))));
}
