//! Demo host for `meshcore`: pairs the network controller with plain TCP
//! connections so the mesh can be exercised over loopback or a LAN.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use log::{error, info};
use meshcore::device::{Device, Stream};
use meshcore::internet::HttpInternetEngine;
use meshcore::network::MeshCallbacks;
use meshcore::{CoreError, Instance, MeshConfig, NetworkController};
use rand_core::OsRng;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

#[derive(Parser)]
#[command(name = "meshd", about = "Demo host for the mesh overlay core")]
struct Cli {
    /// 8-character hex application tag stamped onto this host's instance.
    #[arg(long, default_value = "deadbeef")]
    app_identifier: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Accept inbound TCP connections and treat each as a neighbor device.
    Listen {
        #[arg(long, default_value = "0.0.0.0:7878")]
        addr: String,
    },
    /// Dial a single neighbor over TCP.
    Dial {
        addr: String,
    },
}

/// Duplex neighbor stream backed by one TCP connection. Cloned into both
/// `Device::input` and `Device::output` since TCP itself is already
/// full-duplex.
struct TcpDuplexStream {
    id: String,
    read_half: Mutex<OwnedReadHalf>,
    write_half: Mutex<OwnedWriteHalf>,
}

#[async_trait::async_trait]
impl Stream for TcpDuplexStream {
    fn identifier(&self) -> &str {
        &self.id
    }

    async fn write(&self, data: &[u8]) -> Result<usize, CoreError> {
        let mut half = self.write_half.lock().await;
        half.write_all(data).await.map_err(|err| CoreError::WriteFailed(err.to_string()))?;
        Ok(data.len())
    }

    async fn read(&self) -> Result<Vec<u8>, CoreError> {
        let mut half = self.read_half.lock().await;
        let mut buf = vec![0u8; 4096];
        let n = half.read(&mut buf).await.map_err(|err| CoreError::WriteFailed(err.to_string()))?;
        buf.truncate(n);
        Ok(buf)
    }

    async fn close(&self, _err: Option<CoreError>) {
        let mut half = self.write_half.lock().await;
        let _ = half.shutdown().await;
    }
}

fn device_from_tcp(id: String, socket: TcpStream) -> Device {
    let _ = socket.set_nodelay(true);
    let (read_half, write_half) = socket.into_split();
    let stream = Arc::new(TcpDuplexStream { id: id.clone(), read_half: Mutex::new(read_half), write_half: Mutex::new(write_half) });
    Device::new(id, stream.clone(), stream)
}

struct LoggingCallbacks;

impl MeshCallbacks for LoggingCallbacks {
    fn on_instance_found(&self, instance: Instance) {
        info!("instance found: {instance}");
    }

    fn on_instance_lost(&self, instance: Instance, error: Option<CoreError>) {
        info!("instance lost: {instance} ({error:?})");
    }

    fn on_message_received(&self, data: Vec<u8>, origin: Instance) {
        info!("message from {origin}: {} bytes", data.len());
    }

    fn on_acknowledgement(&self, ticket: meshcore::Ticket) {
        info!("acknowledged seq={} dest={}", ticket.sequence, ticket.destination);
    }

    fn on_send_failure(&self, ticket: meshcore::Ticket, error: CoreError) {
        error!("send failed seq={} dest={}: {error}", ticket.sequence, ticket.destination);
    }

    fn on_internet_response(&self, status_code: u8, body: Vec<u8>) {
        info!("internet response {status_code}: {} bytes", body.len());
    }

    fn on_internet_request_failure(&self, message: String) {
        error!("internet request failed: {message}");
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let config = MeshConfig::new(
        meshcore::identity::parse_app_identifier(&cli.app_identifier).expect("valid app_identifier"),
    );
    let host = Instance::new_with_tag(config.app_tag, OsRng);
    info!("host instance: {host}");

    let internet = Arc::new(
        HttpInternetEngine::new(config.internet_connect_timeout_ms, config.internet_read_timeout_ms)
            .expect("failed to build the internet request engine's http client"),
    );
    let (controller, events) = NetworkController::new(host, config, Arc::new(LoggingCallbacks), internet);

    tokio::spawn(controller.clone().run(events));

    match cli.command {
        Command::Listen { addr } => {
            let listener = TcpListener::bind(&addr).await.expect("failed to bind");
            info!("listening on {addr}");
            loop {
                let (socket, peer) = match listener.accept().await {
                    Ok(pair) => pair,
                    Err(err) => {
                        error!("accept failed: {err}");
                        continue;
                    }
                };
                let device = device_from_tcp(peer.to_string(), socket);
                controller.add_device(Arc::new(device)).await;
            }
        }
        Command::Dial { addr } => {
            let socket = TcpStream::connect(&addr).await.expect("failed to connect");
            let device = device_from_tcp(addr.clone(), socket);
            controller.add_device(Arc::new(device)).await;
            std::future::pending::<()>().await;
        }
    }
}
