use crate::config::ClientConfig;
use crate::game::constants::{HANDSHAKE_DEADLINE_MS, INPUT_SAMPLE_MS, PING_INTERVAL_MS};
use crate::game::types::Leaderboard;
use crate::game::world::SharedWorld;
use crate::protocol::{self, handshake, outbound, ProtocolError, ServerMessage};
use crate::transport::{self, WsStream};
use anyhow::{bail, Context};
use futures_util::stream::SplitStream;
use futures_util::StreamExt;
use serde::Serialize;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;

pub mod input;

use input::InputSignal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Connecting,
    Handshaking,
    Spawning,
    Playing,
    Dead,
    Closed,
}

#[derive(Debug, Serialize)]
pub struct SessionSummary {
    pub phase_reached: String,
    pub snakes_seen: u64,
    pub kills_seen: u64,
    pub foods_tracked: usize,
    pub leaderboard: Leaderboard,
}

/// Runs one session: connect, handshake, then the ingress/ping/input loop
/// until death plus close, transport close, or shutdown. The WebSocket and
/// the writer task never outlive this call.
pub async fn run(
    config: &ClientConfig,
    world: &SharedWorld,
    input_rx: watch::Receiver<InputSignal>,
    shutdown_rx: watch::Receiver<bool>,
) -> anyhow::Result<SessionSummary> {
    let mut phase = SessionPhase::Connecting;
    tracing::info!(url = %config.server_url, "session starting");

    let stream = transport::connect(&config.server_url).await?;
    let (sink, mut frames) = stream.split();
    let (outbound_tx, writer) = transport::spawn_writer(sink);

    let outcome = drive(
        config,
        world,
        &mut frames,
        &outbound_tx,
        input_rx,
        shutdown_rx,
        &mut phase,
    )
    .await;

    writer.abort();
    tracing::info!(reached = ?phase, "session closed");
    outcome.map(|()| summarize(world, phase))
}

fn summarize(world: &SharedWorld, reached: SessionPhase) -> SessionSummary {
    let world = world.read();
    SessionSummary {
        phase_reached: format!("{reached:?}"),
        snakes_seen: world.snakes_seen,
        kills_seen: world.kills_seen,
        foods_tracked: world.foods.len(),
        leaderboard: world.leaderboard.clone(),
    }
}

/// Outbound frames are fire-and-forget; once the transport is gone the
/// ingress side ends the session, so a failed queue push is only noted.
fn send(outbound_tx: &mpsc::UnboundedSender<Vec<u8>>, frame: Vec<u8>) {
    if outbound_tx.send(frame).is_err() {
        tracing::debug!("dropping outbound frame, transport closed");
    }
}

async fn drive(
    config: &ClientConfig,
    world: &SharedWorld,
    frames: &mut SplitStream<WsStream>,
    outbound_tx: &mpsc::UnboundedSender<Vec<u8>>,
    input_rx: watch::Receiver<InputSignal>,
    mut shutdown_rx: watch::Receiver<bool>,
    phase: &mut SessionPhase,
) -> anyhow::Result<()> {
    *phase = SessionPhase::Handshaking;
    let deadline = Instant::now() + Duration::from_millis(HANDSHAKE_DEADLINE_MS);

    send(outbound_tx, vec![handshake::START_LOGIN]);

    // Challenge: the whole pre-init frame feeds the permutation.
    let frame = next_frame_until(frames, deadline)
        .await
        .context("waiting for pre-init challenge")?;
    let (opcode, _) = protocol::split_frame(&frame)?;
    if opcode != b'6' {
        bail!(ProtocolError::Handshake(format!(
            "expected pre-init opcode '6', got {:#04x}",
            opcode
        )));
    }
    let answer = handshake::decode_secret(&frame)?;
    send(outbound_tx, answer.to_vec());

    // Server version: letters only, echoed through the same permutation.
    let frame = next_frame_until(frames, deadline)
        .await
        .context("waiting for server version")?;
    let (opcode, payload) = protocol::split_frame(&frame)?;
    if opcode != b'6' {
        bail!(ProtocolError::Handshake(format!(
            "expected version opcode '6', got {:#04x}",
            opcode
        )));
    }
    if !handshake::is_valid_version(payload) {
        bail!(ProtocolError::Handshake(
            "server version contains non-letters".to_string()
        ));
    }
    tracing::debug!(version_len = payload.len(), "server version verified");
    let echo = handshake::decode_secret(payload)?;
    send(outbound_tx, echo.to_vec());

    let setup = handshake::setup_frame(
        config.protocol_version,
        config.skin,
        &config.nickname,
        config.custom_skin.as_deref(),
    );
    send(outbound_tx, setup);

    // Everything before the initial-setup frame still mutates the store;
    // the 'a' itself flips us to Spawning.
    loop {
        let frame = next_frame_until(frames, deadline)
            .await
            .context("no initial setup before the handshake deadline")?;
        match protocol::parse_frame(&frame) {
            Ok(message) => {
                let is_setup = matches!(message, ServerMessage::Setup(_));
                world.write().apply(message);
                if is_setup {
                    break;
                }
            }
            Err(error) => tracing::warn!(%error, "dropping frame during handshake"),
        }
    }
    *phase = SessionPhase::Spawning;
    tracing::info!("spawning");

    let mut ping_timer = tokio::time::interval(Duration::from_millis(PING_INTERVAL_MS));
    let mut input_timer = tokio::time::interval(Duration::from_millis(INPUT_SAMPLE_MS));
    let mut heading_gate = outbound::HeadingGate::default();
    let mut ping_gate = outbound::PingGate::default();
    let mut boost_edge = outbound::BoostEdge::default();

    loop {
        tokio::select! {
            inbound = frames.next() => {
                let Some(result) = inbound else {
                    tracing::info!("server closed the stream");
                    break;
                };
                let message = result.context("websocket receive failed")?;
                match message {
                    Message::Binary(data) => {
                        handle_frame(&data, config, world, outbound_tx, phase, &mut ping_gate);
                    }
                    Message::Close(_) => {
                        tracing::info!("close frame from server");
                        break;
                    }
                    _ => {}
                }
            }
            _ = ping_timer.tick(), if *phase == SessionPhase::Playing => {
                if ping_gate.try_send(Instant::now()) {
                    send(outbound_tx, outbound::ping_frame());
                }
            }
            _ = input_timer.tick(), if *phase == SessionPhase::Playing => {
                let signal = *input_rx.borrow();
                if let Some(frame) = boost_edge.transition(signal.boost) {
                    send(outbound_tx, frame);
                }
                if heading_gate.permit(Instant::now()) {
                    send(outbound_tx, outbound::heading_frame(signal.angle));
                }
            }
            _ = shutdown_rx.changed() => {
                tracing::info!("shutdown requested");
                break;
            }
        }
    }

    Ok(())
}

/// Parse errors are logged and dropped; they never end the session.
fn handle_frame(
    data: &[u8],
    config: &ClientConfig,
    world: &SharedWorld,
    outbound_tx: &mpsc::UnboundedSender<Vec<u8>>,
    phase: &mut SessionPhase,
    ping_gate: &mut outbound::PingGate,
) {
    let message = match protocol::parse_frame(data) {
        Ok(message) => message,
        Err(error) => {
            tracing::warn!(%error, len = data.len(), "dropping inbound frame");
            return;
        }
    };

    match &message {
        ServerMessage::Pong => ping_gate.on_pong(),
        ServerMessage::OwnDeath => {
            if matches!(*phase, SessionPhase::Spawning | SessionPhase::Playing) {
                *phase = SessionPhase::Dead;
                tracing::info!("own snake died");
            }
        }
        ServerMessage::SnakeSeen(descriptor) if *phase == SessionPhase::Spawning => {
            let id = descriptor.id;
            world.write().adopt_own_snake(id);
            let respawn = handshake::setup_frame(
                config.protocol_version,
                config.skin,
                &config.nickname,
                config.custom_skin.as_deref(),
            );
            send(outbound_tx, respawn);
            *phase = SessionPhase::Playing;
            tracing::info!(id, "playing");
        }
        ServerMessage::Kill { killer, kills_raw, .. } => {
            tracing::info!(killer, kills_raw, "kill reported");
        }
        ServerMessage::Highscore(entry) => {
            tracing::info!(
                winner = %entry.winner_name,
                message = %entry.winner_message,
                "global highscore"
            );
        }
        _ => {}
    }

    world.write().apply(message);
}

async fn next_frame_until(
    frames: &mut SplitStream<WsStream>,
    deadline: Instant,
) -> anyhow::Result<Vec<u8>> {
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            bail!(ProtocolError::Handshake("deadline elapsed".to_string()));
        }
        match tokio::time::timeout(remaining, frames.next()).await {
            Err(_) => bail!(ProtocolError::Handshake("deadline elapsed".to_string())),
            Ok(None) => bail!("connection closed during handshake"),
            Ok(Some(Err(error))) => return Err(error).context("websocket receive failed"),
            Ok(Some(Ok(Message::Binary(data)))) => return Ok(data),
            Ok(Some(Ok(_))) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::SinkExt;
    use tokio::net::{TcpListener, TcpStream};
    use tokio_tungstenite::WebSocketStream;

    async fn recv_binary(ws: &mut WebSocketStream<TcpStream>) -> Vec<u8> {
        loop {
            match ws.next().await {
                Some(Ok(Message::Binary(data))) => return data,
                Some(Ok(_)) => {}
                other => panic!("unexpected websocket event: {other:?}"),
            }
        }
    }

    fn setup_payload() -> Vec<u8> {
        let mut payload = Vec::new();
        payload.extend_from_slice(&[0x00, 0x54, 0x60]); // game_radius = 21600
        payload.extend_from_slice(&411u16.to_be_bytes());
        payload.extend_from_slice(&480u16.to_be_bytes());
        payload.extend_from_slice(&130u16.to_be_bytes());
        payload.push(48);
        payload.extend_from_slice(&470u16.to_be_bytes());
        payload.extend_from_slice(&420u16.to_be_bytes());
        payload.extend_from_slice(&14u16.to_be_bytes());
        payload.extend_from_slice(&80u16.to_be_bytes());
        payload.extend_from_slice(&65u16.to_be_bytes());
        payload.extend_from_slice(&43u16.to_be_bytes());
        payload.push(11);
        payload
    }

    fn descriptor_payload(id: u16) -> Vec<u8> {
        let mut payload = Vec::new();
        payload.extend_from_slice(&id.to_be_bytes());
        payload.extend_from_slice(&[0x40, 0x00, 0x00]);
        payload.push(49);
        payload.extend_from_slice(&[0x20, 0x00, 0x00]);
        payload.extend_from_slice(&1500u16.to_be_bytes());
        payload.extend_from_slice(&[0x80, 0x00, 0x00]);
        payload.push(3);
        payload.extend_from_slice(&[0x00, 0xC3, 0x50]);
        payload.extend_from_slice(&[0x00, 0x61, 0xA8]);
        payload.push(3);
        payload.extend_from_slice(b"Bot");
        payload.push(0);
        payload.extend_from_slice(&[127, 127, 125, 127, 123, 127]);
        payload
    }

    #[tokio::test]
    async fn full_session_against_scripted_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let mut ws = tokio_tungstenite::accept_async(stream).await.expect("ws");

            let login = recv_binary(&mut ws).await;
            assert_eq!(login, vec![handshake::START_LOGIN]);

            // Pre-init challenge: anything ≥ 65 bytes works, frame included.
            let mut challenge = vec![0x07, 0x07, b'6'];
            challenge.extend(std::iter::repeat(b'k').take(70));
            ws.send(Message::Binary(challenge)).await.expect("send");

            let answer = recv_binary(&mut ws).await;
            assert_eq!(answer.len(), handshake::SECRET_LEN);
            assert!(answer.iter().all(u8::is_ascii_alphabetic));

            let mut version = vec![0x07, 0x07, b'6'];
            version.extend(std::iter::repeat(b'B').take(66));
            ws.send(Message::Binary(version)).await.expect("send");

            let echo = recv_binary(&mut ws).await;
            assert_eq!(echo.len(), handshake::SECRET_LEN);

            let setup = recv_binary(&mut ws).await;
            assert_eq!(setup[0], handshake::SETUP);
            assert_eq!(setup[1], 10);

            let mut initial = vec![0, 0, b'a'];
            initial.extend_from_slice(&setup_payload());
            ws.send(Message::Binary(initial)).await.expect("send");

            let mut snake = vec![0, 0, b's'];
            snake.extend_from_slice(&descriptor_payload(42));
            ws.send(Message::Binary(snake)).await.expect("send");

            // The spawn acknowledgment resends the setup packet; pings and
            // headings may interleave once the client is playing.
            loop {
                let frame = recv_binary(&mut ws).await;
                if frame.first() == Some(&handshake::SETUP) {
                    break;
                }
            }

            ws.send(Message::Binary(vec![0, 0, b'v'])).await.expect("send");
            let _ = ws.close(None).await;
        });

        let config = ClientConfig {
            server_url: format!("ws://{addr}"),
            nickname: "Tester".to_string(),
            skin: 5,
            protocol_version: 11,
            custom_skin: None,
        };
        let world = crate::game::world::shared();
        let (_input, input_rx) = input::channel();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let summary = run(&config, &world, input_rx, shutdown_rx)
            .await
            .expect("session");
        assert_eq!(summary.phase_reached, "Dead");
        assert_eq!(summary.snakes_seen, 1);

        let world = world.read();
        assert_eq!(world.own_snake_id, Some(42));
        assert!(!world.alive);
        assert!(world.constants.is_some());
        assert_eq!(world.snakes[&42].name, "Bot");

        server.await.expect("server task");
    }

    #[tokio::test]
    async fn handshake_fails_on_non_letter_version() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let mut ws = tokio_tungstenite::accept_async(stream).await.expect("ws");
            let _login = recv_binary(&mut ws).await;
            let mut challenge = vec![0x07, 0x07, b'6'];
            challenge.extend(std::iter::repeat(b'k').take(70));
            ws.send(Message::Binary(challenge)).await.expect("send");
            let _answer = recv_binary(&mut ws).await;
            let mut version = vec![0x07, 0x07, b'6'];
            version.extend(std::iter::repeat(b'9').take(66));
            ws.send(Message::Binary(version)).await.expect("send");
            // Keep the socket open; the client is the one giving up.
            let _ = ws.next().await;
        });

        let config = ClientConfig {
            server_url: format!("ws://{addr}"),
            nickname: "Tester".to_string(),
            skin: 0,
            protocol_version: 11,
            custom_skin: None,
        };
        let world = crate::game::world::shared();
        let (_input, input_rx) = input::channel();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let error = run(&config, &world, input_rx, shutdown_rx)
            .await
            .expect_err("handshake must fail");
        assert!(error.to_string().contains("non-letters"));
        server.abort();
        let _ = server.await;
    }
}
