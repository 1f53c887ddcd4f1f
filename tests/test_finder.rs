mod common;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use common::{FakeBackend, FakeMatcher, bindings, installation};
use mutorch::error::Error;
use mutorch::installation::Installation;
use mutorch::{Configuration, Location, LocationRange, Match, Mutation, MutationFilter};

const LOOP_C: &str = "int f(int n) {
  int t = 0;
  while (n > 0) {
    if (n == 3) break;
    t = t * -n;
    n--;
  }
  return -t;
}
";

fn mutation(op: &str, index: usize, loc: &str, args: &[(&str, &str)]) -> Mutation {
    Mutation::new(op, index, format!("loop.c@{}", loc).parse().unwrap(), bindings(args))
}

fn loop_installation() -> Installation {
    let backend = FakeBackend::new();
    backend.add_file("loop.c", LOOP_C);
    installation(backend)
}

// --- enumeration ---

#[test]
fn finds_all_mutations_in_catalogue_order() {
    let inst = loop_installation();
    let found = inst.mutations("base", "loop.c", &MutationFilter::default()).unwrap();
    assert_eq!(
        found,
        vec![
            mutation("flip-arithmetic-operator", 2, "5:8::5:14", &[("x", "t"), ("y", "-n")]),
            mutation("flip-relational-operator", 2, "3:9::3:14", &[("x", "n"), ("y", "0")]),
            mutation("flip-relational-operator", 4, "4:8::4:14", &[("x", "n"), ("y", "3")]),
            mutation("negate-if-condition", 0, "4:4::4:15", &[("c", "n == 3")]),
            mutation("remove-unary-negation", 0, "8:9::8:11", &[("x", "t")]),
        ]
    );
}

#[test]
fn constraints_filter_matches() {
    // `t * -n` and `n--` match `-:[x]` but are not preceded by an allowed token,
    // and `break;` follows `)` rather than a statement boundary
    let inst = loop_installation();
    let filter = MutationFilter {
        operators: Some(vec!["remove-unary-negation".into(), "delete-loop-control".into()]),
        ..Default::default()
    };
    let found = inst.mutations("base", "loop.c", &filter).unwrap();
    assert_eq!(found, vec![mutation("remove-unary-negation", 0, "8:9::8:11", &[("x", "t")])]);
}

#[test]
fn line_filter_keeps_mutations_starting_on_given_lines() {
    let inst = loop_installation();
    let filter = MutationFilter {
        lines: Some(BTreeSet::from([4])),
        ..Default::default()
    };
    let found = inst.mutations("base", "loop.c", &filter).unwrap();
    let operators: Vec<&str> = found.iter().map(|m| m.operator.as_str()).collect();
    assert_eq!(operators, vec!["flip-relational-operator", "negate-if-condition"]);
    assert!(found.iter().all(|m| m.location.start().line == 4));
}

#[test]
fn explicit_operators_are_used_as_given() {
    let inst = loop_installation();
    let filter = MutationFilter {
        operators: Some(vec!["negate-if-condition".into()]),
        ..Default::default()
    };
    let found = inst.mutations("base", "loop.c", &filter).unwrap();
    assert_eq!(found, vec![mutation("negate-if-condition", 0, "4:4::4:15", &[("c", "n == 3")])]);
}

#[test]
fn file_without_matches_has_no_mutations() {
    let backend = FakeBackend::new();
    backend.add_file("empty.c", "");
    let inst = installation(backend);
    assert!(inst.mutations("base", "empty.c", &MutationFilter::default()).unwrap().is_empty());
}

// --- failures before iteration ---

#[test]
fn lookup_failures_are_reported_up_front() {
    let inst = loop_installation();
    let default = MutationFilter::default();

    assert_eq!(
        inst.mutations("nope", "loop.c", &default).unwrap_err(),
        Error::SnapshotNotFound("nope".into())
    );
    assert_eq!(
        inst.mutations("base", "missing.c", &default).unwrap_err(),
        Error::FileNotFound("missing.c".into())
    );

    let unknown_language = MutationFilter {
        language: Some("cobol".into()),
        ..Default::default()
    };
    assert_eq!(
        inst.mutations("base", "loop.c", &unknown_language).unwrap_err(),
        Error::LanguageNotFound("cobol".into())
    );

    let unknown_operator = MutationFilter {
        operators: Some(vec!["no-such-op".into()]),
        ..Default::default()
    };
    assert_eq!(
        inst.mutations("base", "loop.c", &unknown_operator).unwrap_err(),
        Error::OperatorNotFound("no-such-op".into())
    );
}

#[test]
fn undetectable_language_is_reported() {
    let backend = FakeBackend::new();
    backend.add_file("Makefile", "all:\n\tcc -o f f.c\n");
    let inst = installation(backend);
    assert_eq!(
        inst.mutations("base", "Makefile", &MutationFilter::default()).unwrap_err(),
        Error::LanguageNotDetected("Makefile".into())
    );
}

// --- laziness ---

#[test]
fn matcher_is_queried_lazily() {
    let at = |l, c| Location::new(l, c);
    let matcher = Arc::new(FakeMatcher::with(
        "true",
        vec![Match {
            location: LocationRange::new(at(1, 4), at(1, 8)),
            bindings: Default::default(),
        }],
    ));
    let backend = FakeBackend::new();
    backend.add_file("t.c", "x = true;");
    let inst = Installation::new(Configuration::system().unwrap(), backend, matcher.clone());
    let snapshot = inst.snapshot("base").unwrap();

    let filter = MutationFilter {
        operators: Some(vec!["flip-boolean-literal".into()]),
        ..Default::default()
    };
    let mut mutations = inst.find_mutations(&snapshot, "t.c", &filter).unwrap();
    assert_eq!(matcher.queries.load(Ordering::SeqCst), 0);

    let first = mutations.next().unwrap().unwrap();
    assert_eq!(first.location.to_string(), "t.c@1:4::1:8");
    assert_eq!(matcher.queries.load(Ordering::SeqCst), 1);

    assert!(mutations.next().is_none());
    assert_eq!(matcher.queries.load(Ordering::SeqCst), 2);
}

#[test]
fn match_outside_file_is_an_error() {
    let at = |l, c| Location::new(l, c);
    let matcher = Arc::new(FakeMatcher::with(
        "true",
        vec![Match {
            location: LocationRange::new(at(7, 0), at(7, 4)),
            bindings: Default::default(),
        }],
    ));
    let backend = FakeBackend::new();
    backend.add_file("t.c", "x = true;");
    let inst = Installation::new(Configuration::system().unwrap(), backend, matcher);

    let filter = MutationFilter {
        operators: Some(vec!["flip-boolean-literal".into()]),
        ..Default::default()
    };
    let result = inst.mutations("base", "t.c", &filter);
    assert!(matches!(result, Err(Error::BadFormat(_))));
}
