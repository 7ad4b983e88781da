use shared::{decode, encode, Packet, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{sleep, timeout};

const REPLY_TIMEOUT: Duration = Duration::from_secs(2);

async fn send(
    socket: &UdpSocket,
    server_addr: SocketAddr,
    packet: &Packet,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("-> {:?}", packet);
    socket.send_to(&encode(packet)?, server_addr).await?;
    Ok(())
}

// Prints every reply until the server goes quiet
async fn drain(socket: &UdpSocket, buf: &mut [u8]) -> Vec<Packet> {
    let mut packets = Vec::new();
    while let Ok(Ok((len, _))) = timeout(REPLY_TIMEOUT, socket.recv_from(buf)).await {
        match decode(&buf[0..len]) {
            Ok(packet) => {
                println!("<- {:?}", packet);
                packets.push(packet);
            }
            Err(e) => println!("Failed to decode reply: {}", e),
        }
    }
    packets
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let server_addr: SocketAddr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:8080".to_string())
        .parse()?;

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    println!("Test client bound to {}", socket.local_addr()?);

    let mut buf = [0u8; 2048];

    send(
        &socket,
        server_addr,
        &Packet::Connect {
            client_version: PROTOCOL_VERSION,
        },
    )
    .await?;
    let replies = drain(&socket, &mut buf).await;
    if !replies
        .iter()
        .any(|packet| matches!(packet, Packet::Connected { .. }))
    {
        println!("Server did not accept the connection");
        return Ok(());
    }

    send(&socket, server_addr, &Packet::RequestNewDelivery).await?;
    for packet in drain(&socket, &mut buf).await {
        if let Packet::DeliveryStarted { task } = packet {
            println!(
                "Task {}: {} -> {}, {}m, {:.1}s, ${} base",
                task.id,
                task.pickup_location.name,
                task.delivery_location.name,
                task.distance_meters,
                task.time_limit,
                task.base_reward
            );
        }
    }

    // A second request while the first attempt is live should get no answer
    send(&socket, server_addr, &Packet::RequestNewDelivery).await?;
    if drain(&socket, &mut buf).await.is_empty() {
        println!("Duplicate request ignored as expected");
    }

    // Asking to resume repeats the live task without restarting it
    send(&socket, server_addr, &Packet::ResumeDelivery).await?;
    drain(&socket, &mut buf).await;

    send(&socket, server_addr, &Packet::ReportJump).await?;
    drain(&socket, &mut buf).await;

    send(&socket, server_addr, &Packet::ReportDrift { drift_seconds: 1.5 }).await?;
    drain(&socket, &mut buf).await;

    sleep(Duration::from_secs(1)).await;
    send(&socket, server_addr, &Packet::CompleteDelivery).await?;
    drain(&socket, &mut buf).await;

    send(&socket, server_addr, &Packet::Disconnect).await?;
    println!("Test client finished");

    Ok(())
}
