//! Live server metadata over the Source Engine query protocol
//!
//! Only reachable endpoints are queried. The client asks for server info
//! (current map) and the player list; both must succeed for the metadata to
//! count as available.

pub mod a2s;

use async_trait::async_trait;
use bytes::Bytes;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;

use crate::models::{Endpoint, ServerMetadata};
use crate::utils::error::QueryError;
use a2s::{Packet, Reply, SplitAssembler};

/// Default bound on each request/reply exchange
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(3);

/// Largest datagram we accept
const MAX_DATAGRAM: usize = 65_507;

/// How many challenge round-trips we tolerate per request
const MAX_CHALLENGES: usize = 2;

/// Source of live metadata for an endpoint
#[async_trait]
pub trait MetadataFetcher: Send + Sync {
    /// Query the endpoint's current map and players
    async fn fetch(&self, endpoint: &Endpoint) -> Result<ServerMetadata, QueryError>;
}

/// A2S query client
#[derive(Debug, Clone)]
pub struct A2sClient {
    timeout: Duration,
}

impl Default for A2sClient {
    fn default() -> Self {
        Self::new(DEFAULT_QUERY_TIMEOUT)
    }
}

impl A2sClient {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn connect(&self, endpoint: &Endpoint) -> Result<UdpSocket, QueryError> {
        let lookup = tokio::net::lookup_host((endpoint.ip.as_str(), endpoint.port));
        let target: SocketAddr = tokio::time::timeout(self.timeout, lookup)
            .await
            .map_err(|_| QueryError::Timeout(self.timeout))??
            .next()
            .ok_or_else(|| {
                QueryError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("no address for {}", endpoint.ip),
                ))
            })?;

        let local = if target.is_ipv6() {
            SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
        } else {
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
        };

        let socket = UdpSocket::bind(local).await?;
        socket.connect(target).await?;
        Ok(socket)
    }

    /// Send one request and wait for its complete reply
    async fn exchange(&self, socket: &UdpSocket, request: &Bytes) -> Result<Reply, QueryError> {
        socket.send(request).await?;

        tokio::time::timeout(self.timeout, Self::receive(socket))
            .await
            .map_err(|_| QueryError::Timeout(self.timeout))?
    }

    /// Read datagrams until one complete reply has arrived
    async fn receive(socket: &UdpSocket) -> Result<Reply, QueryError> {
        let mut assembler = SplitAssembler::new();
        let mut buf = vec![0u8; MAX_DATAGRAM];

        loop {
            let len = socket.recv(&mut buf).await?;
            let datagram = Bytes::copy_from_slice(&buf[..len]);

            match Packet::parse(datagram)? {
                Packet::Single(payload) => return a2s::decode_reply(payload),
                Packet::Fragment(fragment) => {
                    if let Some(payload) = assembler.push(fragment)? {
                        return a2s::decode_reply(payload);
                    }
                }
            }
        }
    }

    /// Run a request, answering challenges by resending with the challenge attached
    async fn request<F>(&self, socket: &UdpSocket, build: F) -> Result<Reply, QueryError>
    where
        F: Fn(Option<i32>) -> Bytes,
    {
        let mut challenge = None;

        for _ in 0..=MAX_CHALLENGES {
            match self.exchange(socket, &build(challenge)).await? {
                Reply::Challenge(value) => challenge = Some(value),
                reply => return Ok(reply),
            }
        }

        Err(QueryError::ChallengeLoop)
    }

    /// Query server info (`A2S_INFO`)
    pub async fn info(&self, endpoint: &Endpoint) -> Result<a2s::InfoReply, QueryError> {
        let socket = self.connect(endpoint).await?;
        self.info_on(&socket).await
    }

    /// Query connected player names (`A2S_PLAYER`)
    pub async fn players(&self, endpoint: &Endpoint) -> Result<Vec<a2s::PlayerEntry>, QueryError> {
        let socket = self.connect(endpoint).await?;
        self.players_on(&socket).await
    }

    async fn info_on(&self, socket: &UdpSocket) -> Result<a2s::InfoReply, QueryError> {
        match self.request(socket, a2s::info_request).await? {
            Reply::Info(info) => Ok(info),
            Reply::Players(_) => Err(QueryError::UnexpectedReply(b'D')),
            Reply::Challenge(_) => Err(QueryError::ChallengeLoop),
        }
    }

    async fn players_on(&self, socket: &UdpSocket) -> Result<Vec<a2s::PlayerEntry>, QueryError> {
        match self.request(socket, a2s::player_request).await? {
            Reply::Players(players) => Ok(players),
            Reply::Info(_) => Err(QueryError::UnexpectedReply(b'I')),
            Reply::Challenge(_) => Err(QueryError::ChallengeLoop),
        }
    }
}

#[async_trait]
impl MetadataFetcher for A2sClient {
    async fn fetch(&self, endpoint: &Endpoint) -> Result<ServerMetadata, QueryError> {
        let socket = self.connect(endpoint).await?;

        let info = self.info_on(&socket).await?;
        let players = self.players_on(&socket).await?;

        tracing::debug!(
            endpoint = %endpoint.name,
            map = %info.map,
            players = players.len(),
            "Metadata fetched"
        );

        Ok(ServerMetadata {
            activity: info.map,
            participants: players.into_iter().map(|p| p.name).collect(),
            server_name: Some(info.name),
            game: Some(info.game),
            player_count: Some(info.players),
            max_players: Some(info.max_players),
        })
    }
}
