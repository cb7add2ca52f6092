//! Tests for `remote` subcommands and top-level commands.

use super::{parse, parse_err};
use crate::cli::{CliCommand, RemoteCommand};

#[test]
fn cli_parse_remote_add() {
    match parse(&[
        "xfer",
        "remote",
        "add",
        "minio-a",
        "--kind",
        "target",
        "--type",
        "s3",
        "--provider",
        "Minio",
        "--access-key-id",
        "AK",
        "--secret-access-key",
        "SK",
        "--endpoint",
        "http://10.0.0.5:9000",
    ]) {
        CliCommand::Remote {
            command: RemoteCommand::Add { name, kind, fields },
        } => {
            assert_eq!(name, "minio-a");
            assert_eq!(kind, "target");
            assert_eq!(fields.remote_type.as_deref(), Some("s3"));
            assert_eq!(fields.provider.as_deref(), Some("Minio"));
            assert_eq!(fields.endpoint.as_deref(), Some("http://10.0.0.5:9000"));
        }
        other => panic!("expected Remote Add, got {:?}", other),
    }
}

#[test]
fn cli_parse_remote_add_default_kind() {
    match parse(&["xfer", "remote", "add", "a"]) {
        CliCommand::Remote {
            command: RemoteCommand::Add { kind, fields, .. },
        } => {
            assert_eq!(kind, "source");
            assert!(fields.access_key_id.is_none());
        }
        other => panic!("expected Remote Add, got {:?}", other),
    }
}

#[test]
fn cli_parse_remote_list_filter() {
    match parse(&["xfer", "remote", "list", "--kind", "source"]) {
        CliCommand::Remote {
            command: RemoteCommand::List { kind },
        } => assert_eq!(kind.as_deref(), Some("source")),
        other => panic!("expected Remote List, got {:?}", other),
    }
}

#[test]
fn cli_parse_remote_update_partial() {
    match parse(&["xfer", "remote", "update", "3", "--endpoint", "https://s3"]) {
        CliCommand::Remote {
            command:
                RemoteCommand::Update {
                    id,
                    name,
                    kind,
                    fields,
                },
        } => {
            assert_eq!(id, 3);
            assert!(name.is_none());
            assert!(kind.is_none());
            assert_eq!(fields.endpoint.as_deref(), Some("https://s3"));
            assert!(fields.provider.is_none());
        }
        other => panic!("expected Remote Update, got {:?}", other),
    }
}

#[test]
fn cli_parse_remote_remove() {
    match parse(&["xfer", "remote", "remove", "8"]) {
        CliCommand::Remote {
            command: RemoteCommand::Remove { id },
        } => assert_eq!(id, 8),
        other => panic!("expected Remote Remove, got {:?}", other),
    }
}

#[test]
fn cli_parse_run_and_watch() {
    assert!(matches!(parse(&["xfer", "run"]), CliCommand::Run));
    assert!(matches!(parse(&["xfer", "watch"]), CliCommand::Watch { json: false }));
    assert!(matches!(
        parse(&["xfer", "watch", "--json"]),
        CliCommand::Watch { json: true }
    ));
}

#[test]
fn cli_parse_completions() {
    match parse(&["xfer", "completions", "bash"]) {
        CliCommand::Completions { shell } => assert_eq!(shell, clap_complete::Shell::Bash),
        other => panic!("expected Completions, got {:?}", other),
    }
}

#[test]
fn cli_rejects_unknown_and_missing() {
    parse_err(&["xfer"]);
    parse_err(&["xfer", "pause", "1"]);
    parse_err(&["xfer", "remote", "remove", "abc"]);
}
