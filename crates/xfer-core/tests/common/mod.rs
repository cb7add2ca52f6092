//! Shared helpers for integration tests: fake copy tools and a registered remote pair.

#![allow(dead_code)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use xfer_core::job_db::{JobDb, NewRemote, Remote, RemoteConfig};

/// Write an executable `/bin/sh` script standing in for the copy tool.
pub fn fake_tool(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("fake-rclone");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

pub async fn register_remotes(db: &JobDb) -> (Remote, Remote) {
    let mut out = Vec::new();
    for (name, kind) in [("minio-a", "source"), ("minio-b", "target")] {
        let remote = db
            .create_remote(&NewRemote {
                name: name.to_string(),
                kind: kind.to_string(),
                config: RemoteConfig {
                    remote_type: "s3".into(),
                    provider: "Minio".into(),
                    access_key_id: format!("{name}-key"),
                    secret_access_key: format!("{name}-secret"),
                    endpoint: "http://127.0.0.1:9000".into(),
                },
            })
            .await
            .unwrap();
        out.push(remote);
    }
    let target = out.pop().unwrap();
    let source = out.pop().unwrap();
    (source, target)
}
