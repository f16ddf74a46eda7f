use std::time::Instant;

use async_trait::async_trait;
use bytes::{BufMut, BytesMut};
use tokio::net::UdpSocket;
use tokio::time::timeout;

use super::{Probe, ProbeOutcome};
use crate::models::{Monitor, MonitorType};

const PACKET_HEADER: [u8; 4] = [0xFF, 0xFF, 0xFF, 0xFF];
const INFO_REQUEST: u8 = 0x54;
const INFO_RESPONSE: u8 = 0x49;
const CHALLENGE_RESPONSE: u8 = 0x41;
const INFO_QUERY: &[u8] = b"Source Engine Query\0";
const MAX_DATAGRAM: usize = 1400;

/// A2S game-server query: one `A2S_INFO` request (with challenge retry),
/// success iff the server returns parseable metadata.
pub struct SteamProbe;

impl SteamProbe {
    pub fn new() -> Self {
        Self
    }

    async fn query_info(&self, target: &str) -> Result<ServerInfo, String> {
        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .map_err(|e| format!("socket error: {e}"))?;
        socket
            .connect(target)
            .await
            .map_err(|e| format!("invalid address: {e}"))?;

        let mut buf = [0u8; MAX_DATAGRAM];

        let request = build_info_request(None);
        socket
            .send(&request)
            .await
            .map_err(|e| format!("send failed: {e}"))?;
        let mut len = socket
            .recv(&mut buf)
            .await
            .map_err(|e| format!("query failed: {e}"))?;

        // Modern servers answer the bare query with a challenge that must
        // be echoed back.
        if len >= 9 && buf[4] == CHALLENGE_RESPONSE {
            let challenge: [u8; 4] = buf[5..9].try_into().expect("length checked");
            let request = build_info_request(Some(challenge));
            socket
                .send(&request)
                .await
                .map_err(|e| format!("send failed: {e}"))?;
            len = socket
                .recv(&mut buf)
                .await
                .map_err(|e| format!("query failed: {e}"))?;
        }

        parse_info_response(&buf[..len])
    }
}

impl Default for SteamProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Probe for SteamProbe {
    fn kind(&self) -> MonitorType {
        MonitorType::Steam
    }

    async fn check(&self, monitor: &Monitor) -> ProbeOutcome {
        let start = Instant::now();

        let info = match timeout(monitor.timeout(), self.query_info(&monitor.target)).await {
            Ok(Ok(info)) => info,
            Ok(Err(e)) => return ProbeOutcome::failure(e, start.elapsed()),
            Err(_) => return ProbeOutcome::failure("query timed out", start.elapsed()),
        };
        let duration = start.elapsed();

        ProbeOutcome::success(
            format!(
                "{} ({}/{} players)",
                info.name, info.players, info.max_players
            ),
            duration,
        )
        .with_field("server_name", info.name)
        .with_field("map", info.map)
        .with_field("game", info.game)
        .with_field("players", info.players)
        .with_field("max_players", info.max_players)
    }
}

#[derive(Debug, PartialEq)]
struct ServerInfo {
    name: String,
    map: String,
    game: String,
    players: u8,
    max_players: u8,
}

fn build_info_request(challenge: Option<[u8; 4]>) -> Vec<u8> {
    let mut packet = BytesMut::with_capacity(4 + 1 + INFO_QUERY.len() + 4);
    packet.put_slice(&PACKET_HEADER);
    packet.put_u8(INFO_REQUEST);
    packet.put_slice(INFO_QUERY);
    if let Some(challenge) = challenge {
        packet.put_slice(&challenge);
    }
    packet.to_vec()
}

fn parse_info_response(packet: &[u8]) -> Result<ServerInfo, String> {
    let mut reader = Reader::new(packet);

    let header = reader.take(4).ok_or("short packet")?;
    if header != PACKET_HEADER {
        return Err("unexpected packet header".to_string());
    }
    if reader.u8().ok_or("short packet")? != INFO_RESPONSE {
        return Err("unexpected response type".to_string());
    }

    let _protocol = reader.u8().ok_or("truncated info payload")?;
    let name = reader.cstring().ok_or("truncated info payload")?;
    let map = reader.cstring().ok_or("truncated info payload")?;
    let _folder = reader.cstring().ok_or("truncated info payload")?;
    let game = reader.cstring().ok_or("truncated info payload")?;
    let _app_id = reader.u16_le().ok_or("truncated info payload")?;
    let players = reader.u8().ok_or("truncated info payload")?;
    let max_players = reader.u8().ok_or("truncated info payload")?;

    Ok(ServerInfo {
        name,
        map,
        game,
        players,
        max_players,
    })
}

struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        if self.buf.len() < n {
            return None;
        }
        let (head, rest) = self.buf.split_at(n);
        self.buf = rest;
        Some(head)
    }

    fn u8(&mut self) -> Option<u8> {
        self.take(1).map(|b| b[0])
    }

    fn u16_le(&mut self) -> Option<u16> {
        self.take(2).map(|b| u16::from_le_bytes([b[0], b[1]]))
    }

    fn cstring(&mut self) -> Option<String> {
        let end = self.buf.iter().position(|&b| b == 0)?;
        let raw = self.take(end)?;
        self.take(1)?;
        Some(String::from_utf8_lossy(raw).into_owned())
    }
}
