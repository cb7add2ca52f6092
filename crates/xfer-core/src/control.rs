//! Control protocol between the `xfer run` daemon and short-lived CLI commands.
//!
//! One request per line over a unix socket:
//! - `stop <id>` is answered with a single `ok <outcome>` or `err <message>` line.
//! - `watch` turns the connection into a stream of JSON job events, one per line.

use std::fmt;
use std::path::PathBuf;

use crate::job_db::JobId;

/// Request sent by a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlRequest {
    Stop(JobId),
    Watch,
}

impl ControlRequest {
    /// Parse one request line. Returns None for unknown or malformed input.
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let req = match (parts.next()?, parts.next()) {
            ("stop", Some(id)) => ControlRequest::Stop(id.parse().ok()?),
            ("watch", None) => return Some(ControlRequest::Watch),
            _ => return None,
        };
        if parts.next().is_some() {
            return None;
        }
        Some(req)
    }
}

impl fmt::Display for ControlRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlRequest::Stop(id) => write!(f, "stop {}", id),
            ControlRequest::Watch => f.write_str("watch"),
        }
    }
}

/// Reply to a `stop` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlReply {
    Ok(String),
    Err(String),
}

impl ControlReply {
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim_end();
        if let Some(rest) = line.strip_prefix("ok ") {
            return Some(ControlReply::Ok(rest.to_string()));
        }
        if let Some(rest) = line.strip_prefix("err ") {
            return Some(ControlReply::Err(rest.to_string()));
        }
        None
    }
}

impl fmt::Display for ControlReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Replies are single lines.
        match self {
            ControlReply::Ok(msg) => write!(f, "ok {}", msg.replace('\n', " ")),
            ControlReply::Err(msg) => write!(f, "err {}", msg.replace('\n', " ")),
        }
    }
}

/// Default path for the control socket (same XDG state dir as the DB).
pub fn default_control_socket_path() -> std::io::Result<PathBuf> {
    let dir = xdg::BaseDirectories::with_prefix("xfer")?.get_state_home();
    Ok(dir.join("xfer").join("control.sock"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_requests() {
        assert_eq!(ControlRequest::parse("stop 12"), Some(ControlRequest::Stop(12)));
        assert_eq!(ControlRequest::parse("  stop   3 \n"), Some(ControlRequest::Stop(3)));
        assert_eq!(ControlRequest::parse("watch"), Some(ControlRequest::Watch));
        assert_eq!(ControlRequest::parse("stop"), None);
        assert_eq!(ControlRequest::parse("stop x"), None);
        assert_eq!(ControlRequest::parse("stop 1 2"), None);
        assert_eq!(ControlRequest::parse("watch 1"), None);
        assert_eq!(ControlRequest::parse("pause 1"), None);
        assert_eq!(ControlRequest::parse(""), None);
    }

    #[test]
    fn request_display_parses_back() {
        for req in [ControlRequest::Stop(42), ControlRequest::Watch] {
            assert_eq!(ControlRequest::parse(&req.to_string()), Some(req));
        }
    }

    #[test]
    fn replies() {
        assert_eq!(
            ControlReply::parse("ok canceled\n"),
            Some(ControlReply::Ok("canceled".into()))
        );
        assert_eq!(
            ControlReply::parse("err job 9 not found"),
            Some(ControlReply::Err("job 9 not found".into()))
        );
        assert_eq!(ControlReply::parse("hello"), None);
        assert_eq!(
            ControlReply::Err("a\nb".into()).to_string(),
            "err a b"
        );
    }
}
