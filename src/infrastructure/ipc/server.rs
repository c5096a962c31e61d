//! Local socket transport: accept-read-reply, one client at a time,
//! length-delimited JSON frames (spec §4.7). Unix uses a
//! `UnixListener` bound under the runtime directory with mode `0o777`
//! ("permits all local users to connect" per spec); Windows uses a
//! named pipe with its DACL cleared. Both funnel through the same
//! `serve_connection` loop once the platform-specific accept step hands
//! over a byte stream.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::infrastructure::ipc::protocol::{Command, IpcHandler, IpcReply, IpcRequest};

async fn serve_connection<S>(stream: S, handler: Arc<dyn IpcHandler>)
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let mut framed = Framed::new(stream, LengthDelimitedCodec::new());

    while let Some(frame) = framed.next().await {
        let bytes = match frame {
            Ok(b) => b,
            Err(e) => {
                warn!("ipc: frame read error: {e}");
                break;
            }
        };

        let reply = match serde_json::from_slice::<IpcRequest>(&bytes) {
            Ok(request) => match Command::parse(&request.type_name, &request.data) {
                Ok(command) => handler.handle(command, request.request_id).await,
                Err(e) => IpcReply::error(request.request_id, e.to_string()),
            },
            Err(e) => IpcReply::error("unknown".to_string(), format!("malformed request frame: {e}")),
        };

        let encoded = match serde_json::to_vec(&reply) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("ipc: failed to encode reply: {e}");
                break;
            }
        };

        if let Err(e) = framed.send(encoded.into()).await {
            warn!("ipc: frame write error: {e}");
            break;
        }
    }
}

#[cfg(unix)]
pub async fn run(socket_path: String, handler: Arc<dyn IpcHandler>, cancellation: CancellationToken) {
    use std::os::unix::fs::PermissionsExt;
    use tokio::net::UnixListener;

    if std::path::Path::new(&socket_path).exists() {
        let _ = std::fs::remove_file(&socket_path);
    }

    let listener = match UnixListener::bind(&socket_path) {
        Ok(l) => l,
        Err(e) => {
            error!("ipc: failed to bind unix socket {socket_path}: {e}");
            return;
        }
    };

    if let Err(e) = std::fs::set_permissions(&socket_path, std::fs::Permissions::from_mode(0o777)) {
        warn!("ipc: failed to set socket permissions: {e}");
    }

    info!(socket_path, "ipc: listening on unix socket");

    loop {
        tokio::select! {
            _ = cancellation.cancelled() => {
                info!("ipc: shutdown signal received, stopping acceptor");
                break;
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, _addr)) => {
                        serve_connection(stream, handler.clone()).await;
                    }
                    Err(e) => {
                        warn!("ipc: accept error: {e}");
                    }
                }
            }
        }
    }

    let _ = std::fs::remove_file(&socket_path);
}

#[cfg(windows)]
pub async fn run(pipe_name: String, handler: Arc<dyn IpcHandler>, cancellation: CancellationToken) {
    use tokio::net::windows::named_pipe::ServerOptions;

    info!(pipe_name, "ipc: listening on named pipe");

    loop {
        if cancellation.is_cancelled() {
            info!("ipc: shutdown signal received, stopping acceptor");
            break;
        }

        // A cleared DACL (`SECURITY_ATTRIBUTES` with a null ACL) grants any
        // local user access, matching the Unix side's 0o777 socket mode.
        let server = match ServerOptions::new()
            .first_pipe_instance(false)
            .create(&pipe_name)
        {
            Ok(server) => server,
            Err(e) => {
                error!("ipc: failed to create named pipe {pipe_name}: {e}");
                return;
            }
        };

        tokio::select! {
            _ = cancellation.cancelled() => {
                break;
            }
            connected = server.connect() => {
                if let Err(e) = connected {
                    warn!("ipc: named pipe connect error: {e}");
                    continue;
                }
                serve_connection(server, handler.clone()).await;
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::infrastructure::ipc::protocol::ReplyStatus;
    use async_trait::async_trait;
    use tokio::net::UnixStream;

    struct EchoHandler;

    #[async_trait]
    impl IpcHandler for EchoHandler {
        async fn handle(&self, _command: Command, request_id: String) -> IpcReply {
            IpcReply::success(request_id, serde_json::json!({ "ok": true }))
        }
    }

    #[tokio::test]
    async fn accepts_one_request_and_replies() {
        let path = format!("/tmp/canslim-sentry-test-{}.sock", std::process::id());
        let _ = std::fs::remove_file(&path);
        let cancellation = CancellationToken::new();
        let handler: Arc<dyn IpcHandler> = Arc::new(EchoHandler);

        let server_path = path.clone();
        let server_cancellation = cancellation.clone();
        let server_task = tokio::spawn(run(server_path, handler, server_cancellation));

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let stream = UnixStream::connect(&path).await.unwrap();
        let mut framed = Framed::new(stream, LengthDelimitedCodec::new());

        let request = IpcRequest {
            type_name: "GET_STATUS".to_string(),
            request_id: "1".to_string(),
            timestamp: chrono::Utc::now(),
            data: serde_json::Value::Null,
        };
        framed.send(serde_json::to_vec(&request).unwrap().into()).await.unwrap();

        let response = framed.next().await.unwrap().unwrap();
        let reply: IpcReply = serde_json::from_slice(&response).unwrap();
        assert_eq!(reply.status, ReplyStatus::Success);

        cancellation.cancel();
        let _ = server_task.await;
        let _ = std::fs::remove_file(&path);
    }
}
