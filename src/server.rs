//! JSON-lines request loop: one request object per input line, one response per output line.
//! Requests may carry an `id` that is copied into the response.
//!
//! Successful responses are `{"result": ...}`; failures are the error payload
//! `{"error": {"kind", "message", "data"}}`.

use std::collections::BTreeSet;
use std::io::{BufRead, Write};

use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::finder::MutationFilter;
use crate::installation::Installation;
use crate::mutants::{Mutant, Mutation};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum Request {
    Health,
    Languages,
    Language {
        name: String,
    },
    Operators {
        #[serde(default)]
        language: Option<String>,
    },
    Operator {
        name: String,
    },
    Mutations {
        snapshot: String,
        filepath: String,
        #[serde(default)]
        language: Option<String>,
        #[serde(default)]
        operators: Option<Vec<String>>,
        #[serde(default)]
        lines: Option<BTreeSet<usize>>,
    },
    Replacements {
        snapshot: String,
        mutations: Vec<Mutation>,
    },
    Diff {
        snapshot: String,
        mutations: Vec<Mutation>,
    },
    Mutate {
        snapshot: String,
        mutations: Vec<Mutation>,
    },
    Mutants,
    Mutant {
        uuid: String,
    },
    DeleteMutant {
        uuid: String,
    },
    ClearMutants,
    Shutdown,
}

fn to_value<T: serde::Serialize>(value: T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| Error::unexpected("failed to encode response", e))
}

/// Performs one request against `installation`.
pub fn handle(installation: &Installation, request: Request) -> Result<Value> {
    match request {
        Request::Health => to_value(installation.health()),
        Request::Languages => to_value(installation.languages().iter().collect::<Vec<_>>()),
        Request::Language { name } => to_value(installation.language(&name)?),
        Request::Operators { language } => to_value(installation.operators(language.as_deref())?),
        Request::Operator { name } => to_value(installation.operator(&name)?),
        Request::Mutations {
            snapshot,
            filepath,
            language,
            operators,
            lines,
        } => {
            let filter = MutationFilter {
                language,
                operators,
                lines,
            };
            to_value(installation.mutations(&snapshot, &filepath, &filter)?)
        }
        Request::Replacements { snapshot, mutations } => to_value(installation.replacements(&snapshot, &mutations)?),
        Request::Diff { snapshot, mutations } => to_value(installation.diff(&snapshot, &mutations)?),
        Request::Mutate { snapshot, mutations } => to_value(installation.mutate(&snapshot, mutations)?),
        Request::Mutants => to_value(installation.mutants()),
        Request::Mutant { uuid } => to_value(installation.mutant(&Mutant::parse_id(&uuid)?)?),
        Request::DeleteMutant { uuid } => to_value(installation.delete_mutant(&Mutant::parse_id(&uuid)?)?),
        Request::ClearMutants => {
            installation.clear_mutants();
            Ok(Value::Null)
        }
        Request::Shutdown => Ok(json!("shutting down")),
    }
}

fn respond(id: Option<Value>, outcome: Result<Value>) -> Value {
    let mut response = match outcome {
        Ok(result) => json!({ "result": result }),
        Err(e) => {
            warn!(kind = e.kind(), error = %e, "request failed");
            e.to_json()
        }
    };
    if let Some(id) = id {
        response["id"] = id;
    }
    response
}

/// Splits the optional client-chosen `id` off a request line.
fn parse_line(line: &str) -> (Option<Value>, Result<Request>) {
    let mut value: Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(e) => return (None, Err(Error::BadFormat(e.to_string()))),
    };
    let id = value.as_object_mut().and_then(|fields| fields.remove("id"));
    let request = serde_json::from_value(value).map_err(|e| Error::BadFormat(e.to_string()));
    (id, request)
}

/// Serves requests from `input` until a `shutdown` request or end of input,
/// then deletes every mutant that is still registered.
///
/// Each request runs on its own scoped thread, so responses may arrive out
/// of order; a request's `id` field, if any, is echoed in its response.
/// Shutdown stops reading but waits for in-flight requests.
pub fn serve<W: Write + Send>(installation: &Installation, input: impl BufRead, output: W) -> Result<()> {
    info!("serving requests");
    let output = Mutex::new(output);
    let failure: Mutex<Option<Error>> = Mutex::new(None);
    let send = |response: Value| {
        let mut out = output.lock();
        if let Err(e) = writeln!(out, "{}", response).and_then(|_| out.flush()) {
            failure
                .lock()
                .get_or_insert_with(|| Error::unexpected("response stream failed", e));
        }
    };

    let read = std::thread::scope(|scope| -> Result<()> {
        for line in input.lines() {
            let line = line.map_err(|e| Error::unexpected("request stream failed", e))?;
            if line.trim().is_empty() {
                continue;
            }
            match parse_line(&line) {
                (id, Ok(Request::Shutdown)) => {
                    info!("shutdown requested");
                    send(respond(id, handle(installation, Request::Shutdown)));
                    break;
                }
                (id, Ok(request)) => {
                    debug!(?request, "received request");
                    let send = &send;
                    scope.spawn(move || send(respond(id, handle(installation, request))));
                }
                (id, Err(e)) => send(respond(id, Err(e))),
            }
        }
        Ok(())
    });

    installation.clear_mutants();
    info!("server stopped");
    read?;
    match failure.into_inner() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
