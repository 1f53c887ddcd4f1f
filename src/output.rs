use console::Style;
use indexmap::IndexMap;

use crate::error::Error;
use crate::language::Language;
use crate::mutants::{Mutant, Mutation, Replacement};
use crate::operators::Operator;

pub fn print_error(msg: &str) {
    let style = Style::new().red().bold();
    eprintln!("{} {}", style.apply_to("✗"), msg);
}

pub fn print_success(msg: &str) {
    let style = Style::new().green().bold();
    println!("{} {}", style.apply_to("✓"), msg);
}

/// An error as the CLI reports it, with build output when there is some.
pub fn print_failure(err: &Error) {
    print_error(&format!("{} [{}]", err, err.kind()));
    if let Error::BuildFailure { output } = err {
        let dim = Style::new().dim();
        for line in output.lines() {
            eprintln!("  {}", dim.apply_to(line));
        }
    }
}

pub fn print_languages<'a>(languages: impl IntoIterator<Item = &'a Language>) {
    let name_style = Style::new().cyan().bold();
    let dim = Style::new().dim();
    for language in languages {
        let endings: Vec<&str> = language.file_endings.iter().map(String::as_str).collect();
        println!("{} {}", name_style.apply_to(&language.name), dim.apply_to(endings.join(" ")));
    }
}

pub fn print_operators(operators: &[&Operator]) {
    let name_style = Style::new().cyan().bold();
    let dim = Style::new().dim();
    for op in operators {
        let languages: Vec<&str> = op.languages().collect();
        println!(
            "{} {}",
            name_style.apply_to(op.name()),
            dim.apply_to(format!("[{}]", languages.join(", "))),
        );
        for (i, t) in op.transformations().iter().enumerate() {
            println!("  {} {} → {}", dim.apply_to(format!("#{}", i)), t.match_template, t.rewrite);
        }
    }
}

pub fn print_mutations(mutations: &[Mutation]) {
    let loc_style = Style::new().dim();
    let op_style = Style::new().magenta();

    if mutations.is_empty() {
        println!("no mutations found");
        return;
    }
    for m in mutations {
        let arguments: Vec<String> = m.arguments.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        println!(
            "  {} {} {}",
            m.location,
            op_style.apply_to(format!("{}#{}", m.operator, m.transformation_index)),
            loc_style.apply_to(arguments.join(" ")),
        );
    }
    println!();
    println!("{} mutations", mutations.len());
}

pub fn print_replacements(replacements: &IndexMap<String, Vec<Replacement>>) {
    let file_style = Style::new().bold();
    let op_style = Style::new().magenta();
    for (file, reps) in replacements {
        println!("{}", file_style.apply_to(file));
        for r in reps {
            println!("  {} → {}", r.location.range, op_style.apply_to(&r.text));
        }
    }
}

pub fn print_diff(diff: &str) {
    let del_style = Style::new().red();
    let add_style = Style::new().green();
    let hunk_style = Style::new().cyan();
    for line in diff.lines() {
        if line.starts_with("---") || line.starts_with("+++") {
            println!("{}", Style::new().bold().apply_to(line));
        } else if line.starts_with("@@") {
            println!("{}", hunk_style.apply_to(line));
        } else if line.starts_with('-') {
            println!("{}", del_style.apply_to(line));
        } else if line.starts_with('+') {
            println!("{}", add_style.apply_to(line));
        } else {
            println!("{}", line);
        }
    }
}

pub fn print_mutant(mutant: &Mutant) {
    let ref_style = Style::new().cyan().bold();
    let dim = Style::new().dim();
    println!(
        "{} {} {}",
        ref_style.apply_to(mutant.uuid.simple()),
        dim.apply_to(format!("base={}", mutant.base)),
        dim.apply_to(format!("snapshot={}", mutant.snapshot())),
    );
    for m in &mutant.mutations {
        println!("  {} {}#{}", m.location, m.operator, m.transformation_index);
    }
}
