//! `bts-helper`: a one-shot command-line bridge to a Jira-style REST tracker.
//!
//! Every run executes the requested operations in a fixed order and prints one JSON
//! document per result line on stdout. Exit code `0` means every operation succeeded,
//! `2` means the tracker rejected a request (a `{"message", "status"}` document is the
//! only thing on stdout), and `1` means any other failure (message on stderr).

pub mod cli;
pub mod config;

use std::collections::HashMap;
use std::ffi::OsString;
use std::io::{self, Write};
use std::process::ExitCode;

use bts_api::fields::denormalize_field_value;
use bts_api::{FetchedFields, FieldMap, Result, TrackerClient, TrackerError, Transport};
use clap::Parser;
use log::{debug, warn};
use serde_json::{json, Map, Value};

use crate::cli::Cli;

/// Exit code for failures the tracker reported itself.
pub const EXIT_TRACKER_ERROR: u8 = 2;

/// Parses `args`, runs every requested operation and maps the outcome to an exit code.
pub fn run<I, T>(args: I) -> ExitCode
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp_millis()
        .target(env_logger::Target::Stderr)
        .try_init();

    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("failed to start runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    // Output is held back until every operation succeeded, so a failure leaves
    // exactly one document on stdout.
    let mut buffer = Vec::new();
    match runtime.block_on(execute(&cli, &mut buffer)) {
        Ok(()) => match io::stdout().lock().write_all(&buffer) {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                eprintln!("failed to write output: {err}");
                ExitCode::FAILURE
            }
        },
        Err(err) => report_failure(&err),
    }
}

fn report_failure(err: &TrackerError) -> ExitCode {
    match application_error(err) {
        Some(payload) => {
            warn!("tracker rejected the request: {err}");
            println!("{payload}");
            ExitCode::from(EXIT_TRACKER_ERROR)
        }
        None => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

/// The stdout document for a tracker-reported failure, or `None` for anything else.
pub fn application_error(err: &TrackerError) -> Option<Value> {
    if !err.is_tracker_reported() {
        return None;
    }
    Some(error_document(err))
}

/// `{"message", "status"}`, the shape the library turns back into the same error.
fn error_document(err: &TrackerError) -> Value {
    json!({ "message": plain_message(err), "status": err.status() })
}

/// Runs every operation named on the command line against the tracker's REST API.
pub async fn execute<W: Write>(cli: &Cli, out: &mut W) -> Result<()> {
    let config = config::tracker_config(cli)?;
    let session = Session {
        field_map: config.field_map.clone(),
        client: TrackerClient::new(config)?,
    };

    session.get_issues(&cli.get_issue, out).await?;
    session.get_fields(cli.field_reads(), out).await?;
    session.set_fields(cli.field_writes(), out).await?;
    for (key, text) in cli.comments_to_add() {
        session.client.post_comment(key, text).await?;
        write_line(out, &json!({}))?;
    }
    for key in &cli.get_comments {
        let comments = session.client.list_comments(key).await?;
        write_line(out, &serde_json::to_value(comments)?)?;
    }
    for (key, id) in cli.comments_to_delete() {
        session.client.delete_comment(key, id).await?;
        write_line(out, &json!({}))?;
    }
    for key in &cli.get_transitions {
        let transitions = session.client.get_transitions(key).await?;
        write_line(out, &serde_json::to_value(transitions)?)?;
    }
    for (key, id) in cli.transitions_to_apply() {
        session.client.apply_transition(key, id).await?;
        write_line(out, &json!({}))?;
    }
    Ok(())
}

struct Session {
    client: TrackerClient,
    field_map: FieldMap,
}

impl Session {
    /// One line per key; a failing key prints its error document instead of aborting the run.
    async fn get_issues<W: Write>(&self, keys: &[String], out: &mut W) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let (natives, _) = self
            .field_map
            .to_native_names(&self.field_map.essential_names());
        for key in keys {
            let line = match self.client.fetch_fields(key, &natives).await {
                Ok(FetchedFields::Fields(fields)) => json!({ "key": key, "fields": fields }),
                Ok(FetchedFields::Rejected(message)) => {
                    json!({ "errors": true, "error_msg": message })
                }
                Err(err) => {
                    debug!("lookup of {key} failed: {err}");
                    error_document(&err)
                }
            };
            write_line(out, &line)?;
        }
        Ok(())
    }

    /// Raw native values, one line per requested pair; pairs for one key share a request.
    async fn get_fields<'a, W: Write>(
        &self,
        reads: impl Iterator<Item = (&'a str, &'a str)>,
        out: &mut W,
    ) -> Result<()> {
        let reads: Vec<(&str, String)> = reads
            .map(|(key, name)| (key, self.field_map.native_name(name).to_string()))
            .collect();

        let mut fetched: HashMap<&str, Map<String, Value>> = HashMap::new();
        for (key, names) in group_by_key(reads.iter().map(|(key, name)| (*key, name.clone()))) {
            match self.client.fetch_fields(key, &names).await? {
                FetchedFields::Fields(fields) => {
                    fetched.insert(key, fields);
                }
                FetchedFields::Rejected(message) => {
                    return Err(TrackerError::InvalidKey {
                        key: key.to_string(),
                        message,
                    })
                }
            }
        }

        for (key, name) in &reads {
            let value = fetched
                .get(key)
                .and_then(|fields| fields.get(name))
                .cloned()
                .unwrap_or(Value::Null);
            write_line(out, &value)?;
        }
        Ok(())
    }

    /// All pairs for one key go out in a single write; prints `{}` per key.
    async fn set_fields<'a, W: Write>(
        &self,
        writes: impl Iterator<Item = (&'a str, &'a str, &'a str)>,
        out: &mut W,
    ) -> Result<()> {
        let writes = writes.map(|(key, name, raw)| {
            let value = parse_value(raw);
            let value = if value.is_string() {
                denormalize_field_value(name, value)
            } else {
                value
            };
            (key, (self.field_map.native_name(name).to_string(), value))
        });
        for (key, fields) in group_by_key(writes) {
            let payload: Map<String, Value> = fields.into_iter().collect();
            self.client.write_fields(key, &payload).await?;
            write_line(out, &json!({}))?;
        }
        Ok(())
    }
}

/// Command-line values are JSON when they parse as JSON, plain strings otherwise.
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Groups items by key, keeping the order in which keys first appear.
fn group_by_key<'a, T>(items: impl Iterator<Item = (&'a str, T)>) -> Vec<(&'a str, Vec<T>)> {
    let mut groups: Vec<(&str, Vec<T>)> = Vec::new();
    for (key, item) in items {
        match groups.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, group)) => group.push(item),
            None => groups.push((key, vec![item])),
        }
    }
    groups
}

/// The tracker's own message, without the key prefix `Display` adds.
fn plain_message(err: &TrackerError) -> String {
    match err {
        TrackerError::Transport { message, .. } | TrackerError::InvalidKey { message, .. } => {
            message.clone()
        }
        other => other.to_string(),
    }
}

fn write_line<W: Write>(out: &mut W, value: &Value) -> Result<()> {
    writeln!(out, "{value}")?;
    Ok(())
}
