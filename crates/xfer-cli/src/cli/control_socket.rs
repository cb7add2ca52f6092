//! Control socket: server (during `xfer run`) and client (for `xfer job stop`, `xfer watch`).
//! Protocol: one request per line, "stop <id>" or "watch"; see `xfer_core::control`.

use anyhow::{Context, Result};
use std::io::ErrorKind;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast::error::RecvError;
use xfer_core::control::{ControlReply, ControlRequest};
use xfer_core::job_db::JobId;
use xfer_core::supervisor::Supervisor;

/// Binds `path` (replacing a stale socket file) and spawns the accept loop.
pub fn spawn_control_listener(
    supervisor: Supervisor,
    path: impl AsRef<Path>,
) -> Result<tokio::task::JoinHandle<()>> {
    let path = path.as_ref();
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("create socket dir: {}", dir.display()))?;
    }
    let _ = std::fs::remove_file(path);
    let listener = UnixListener::bind(path)
        .with_context(|| format!("bind control socket: {}", path.display()))?;

    let handle = tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let supervisor = supervisor.clone();
                    tokio::spawn(async move {
                        if let Err(e) = serve_connection(supervisor, stream).await {
                            tracing::debug!("control connection: {:#}", e);
                        }
                    });
                }
                Err(e) => tracing::debug!("control socket accept: {}", e),
            }
        }
    });
    Ok(handle)
}

async fn serve_connection(supervisor: Supervisor, stream: UnixStream) -> Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();
    while let Some(line) = lines.next_line().await? {
        match ControlRequest::parse(&line) {
            Some(ControlRequest::Stop(id)) => {
                let reply = match supervisor.stop(id).await {
                    Ok(outcome) => ControlReply::Ok(outcome.to_string()),
                    Err(e) => ControlReply::Err(e.to_string()),
                };
                write_half.write_all(format!("{reply}\n").as_bytes()).await?;
            }
            Some(ControlRequest::Watch) => {
                let mut rx = supervisor.publisher().subscribe();
                loop {
                    tokio::select! {
                        received = rx.recv() => match received {
                            Ok(event) => {
                                let mut json = serde_json::to_string(&event)?;
                                json.push('\n');
                                write_half.write_all(json.as_bytes()).await?;
                            }
                            Err(RecvError::Lagged(n)) => {
                                tracing::debug!(skipped = n, "watch client lagging");
                            }
                            Err(RecvError::Closed) => return Ok(()),
                        },
                        // A watcher sends nothing after its request; EOF means it hung up.
                        line = lines.next_line() => match line {
                            Ok(Some(_)) => {}
                            Ok(None) | Err(_) => return Ok(()),
                        },
                    }
                }
            }
            None => {
                let reply = ControlReply::Err(format!("unknown request: {}", line.trim()));
                write_half.write_all(format!("{reply}\n").as_bytes()).await?;
            }
        }
    }
    Ok(())
}

/// Connects to the daemon, or returns None if no daemon is listening.
async fn connect(socket_path: &Path) -> Result<Option<UnixStream>> {
    match UnixStream::connect(socket_path).await {
        Ok(s) => Ok(Some(s)),
        Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::ConnectionRefused) => {
            Ok(None)
        }
        Err(e) => Err(e).with_context(|| format!("connect {}", socket_path.display())),
    }
}

/// Asks the daemon to stop a job. None if no daemon is running.
pub async fn send_stop(socket_path: &Path, job_id: JobId) -> Result<Option<ControlReply>> {
    let Some(mut stream) = connect(socket_path).await? else {
        return Ok(None);
    };
    stream
        .write_all(format!("{}\n", ControlRequest::Stop(job_id)).as_bytes())
        .await?;
    let mut line = String::new();
    BufReader::new(stream).read_line(&mut line).await?;
    let reply = ControlReply::parse(&line)
        .with_context(|| format!("unexpected reply from daemon: {:?}", line))?;
    Ok(Some(reply))
}

/// Subscribes to the daemon's event stream. None if no daemon is running.
pub async fn open_watch(
    socket_path: &Path,
) -> Result<Option<tokio::io::Lines<BufReader<UnixStream>>>> {
    let Some(mut stream) = connect(socket_path).await? else {
        return Ok(None);
    };
    stream
        .write_all(format!("{}\n", ControlRequest::Watch).as_bytes())
        .await?;
    Ok(Some(BufReader::new(stream).lines()))
}
