use orrery::protocol::{ProtocolHandler, DEFAULT_PORT};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    println!("🪐 Orrery Engine Server");
    println!("======================");

    let port = std::env::args()
        .nth(1)
        .map(|arg| arg.parse::<u16>())
        .transpose()?
        .unwrap_or(DEFAULT_PORT);

    // Every client drives the same set of handles.
    let handler = Arc::new(Mutex::new(ProtocolHandler::new()));

    let listener = TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    info!("🌐 TCP server listening on port {}", port);

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    info!("🔗 New client connected: {}", addr);
                    let client_handler = Arc::clone(&handler);
                    tokio::spawn(async move {
                        if let Err(e) = handle_client(stream, client_handler).await {
                            warn!("Client {} error: {}", addr, e);
                        }
                        info!("🔌 Client {} disconnected", addr);
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            },
            _ = tokio::signal::ctrl_c() => {
                break;
            }
        }
    }

    let live = handler.lock().await.interface().live_plugins();
    println!("🚀 Orrery server stopped with {} live plugin(s)", live);

    Ok(())
}

async fn handle_client(
    stream: TcpStream,
    handler: Arc<Mutex<ProtocolHandler>>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (reader, mut writer) = stream.into_split();
    let mut buf_reader = BufReader::new(reader);

    let mut line = String::new();
    loop {
        line.clear();
        match buf_reader.read_line(&mut line).await {
            Ok(0) => break, // Client disconnected
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                info!("📨 Received command: {}", trimmed);

                let response_json = {
                    let mut handler_guard = handler.lock().await;
                    handler_guard.handle_line(trimmed)
                };

                writer.write_all(response_json.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                info!("📤 Sent response: {}", response_json);
            }
            Err(e) => {
                error!("Error reading from client: {}", e);
                break;
            }
        }
    }

    Ok(())
}
