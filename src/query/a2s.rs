//! Source Engine query (A2S) packet codec
//!
//! Only the parts needed for status reports are decoded: the map from
//! `A2S_INFO` and the player names from `A2S_PLAYER`.
//!
//! ```text
//! simple packet: FF FF FF FF | type | payload...
//! split packet:  FE FF FF FF | id i32 | total u8 | number u8 | size u16 | payload...
//! ```
//!
//! All integers are little-endian, strings are NUL-terminated.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::utils::error::QueryError;

/// Header of a reply that fits in one datagram
pub const SIMPLE_HEADER: i32 = -1;

/// Header of one fragment of a split reply
pub const SPLIT_HEADER: i32 = -2;

const A2S_INFO: u8 = b'T';
const A2S_PLAYER: u8 = b'U';
const S2C_CHALLENGE: u8 = b'A';
const S2A_INFO: u8 = b'I';
const S2A_INFO_GOLDSOURCE: u8 = b'm';
const S2A_PLAYER: u8 = b'D';

const INFO_QUERY: &[u8] = b"Source Engine Query\0";

/// Challenge placeholder that asks the server for a real challenge
const NO_CHALLENGE: i32 = -1;

/// Flag in the split id marking bzip2-compressed replies
const COMPRESSED_FLAG: u32 = 0x8000_0000;

/// Build an `A2S_INFO` request, appending the challenge when the server asked for one
pub fn info_request(challenge: Option<i32>) -> Bytes {
    let mut buf = BytesMut::with_capacity(29);
    buf.put_i32_le(SIMPLE_HEADER);
    buf.put_u8(A2S_INFO);
    buf.put_slice(INFO_QUERY);
    if let Some(challenge) = challenge {
        buf.put_i32_le(challenge);
    }
    buf.freeze()
}

/// Build an `A2S_PLAYER` request
pub fn player_request(challenge: Option<i32>) -> Bytes {
    let mut buf = BytesMut::with_capacity(9);
    buf.put_i32_le(SIMPLE_HEADER);
    buf.put_u8(A2S_PLAYER);
    buf.put_i32_le(challenge.unwrap_or(NO_CHALLENGE));
    buf.freeze()
}

/// Server information from an `A2S_INFO` reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoReply {
    pub name: String,
    pub map: String,
    pub folder: String,
    pub game: String,
    pub players: u8,
    pub max_players: u8,
}

/// One entry of an `A2S_PLAYER` reply
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerEntry {
    pub index: u8,
    pub name: String,
    pub score: i32,
    pub duration_secs: f32,
}

/// Decoded reply payload
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Challenge(i32),
    Info(InfoReply),
    Players(Vec<PlayerEntry>),
}

/// One received datagram
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    /// Complete reply, header stripped
    Single(Bytes),
    Fragment(Fragment),
}

/// Fragment of a split reply
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub id: i32,
    pub total: u8,
    pub number: u8,
    pub payload: Bytes,
}

impl Packet {
    /// Classify a datagram by its header
    pub fn parse(mut datagram: Bytes) -> Result<Self, QueryError> {
        let header = read_i32(&mut datagram, "packet header")?;

        match header {
            SIMPLE_HEADER => Ok(Self::Single(datagram)),
            SPLIT_HEADER => {
                let id = read_i32(&mut datagram, "split id")?;
                if (id as u32) & COMPRESSED_FLAG != 0 {
                    return Err(QueryError::UnsupportedSplit(
                        "compressed replies are not supported".to_string(),
                    ));
                }
                let total = read_u8(&mut datagram, "split total")?;
                let number = read_u8(&mut datagram, "split number")?;
                // Source engine fragments carry the maximum fragment size
                let _size = read_u16(&mut datagram, "split size")?;

                if total == 0 || number >= total {
                    return Err(QueryError::UnsupportedSplit(format!(
                        "fragment {number} of {total}"
                    )));
                }

                Ok(Self::Fragment(Fragment {
                    id,
                    total,
                    number,
                    payload: datagram,
                }))
            }
            other => Err(QueryError::UnexpectedHeader(other)),
        }
    }
}

/// Collects the fragments of one split reply
#[derive(Debug, Default)]
pub struct SplitAssembler {
    id: Option<i32>,
    parts: Vec<Option<Bytes>>,
}

impl SplitAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fragment; returns the reassembled reply (header stripped) once complete
    pub fn push(&mut self, fragment: Fragment) -> Result<Option<Bytes>, QueryError> {
        match self.id {
            None => {
                self.id = Some(fragment.id);
                self.parts = vec![None; fragment.total as usize];
            }
            Some(id) if id != fragment.id => {
                // A fragment of an older reply; ignore it
                return Ok(None);
            }
            Some(_) if self.parts.len() != fragment.total as usize => {
                return Err(QueryError::UnsupportedSplit(
                    "fragment count changed mid-reply".to_string(),
                ));
            }
            Some(_) => {}
        }

        self.parts[fragment.number as usize] = Some(fragment.payload);

        if self.parts.iter().any(Option::is_none) {
            return Ok(None);
        }

        let mut whole = BytesMut::new();
        for part in self.parts.drain(..).flatten() {
            whole.put(part);
        }
        self.id = None;

        // The reassembled payload starts with the simple header again
        let mut whole = whole.freeze();
        let header = read_i32(&mut whole, "reassembled header")?;
        if header != SIMPLE_HEADER {
            return Err(QueryError::UnexpectedHeader(header));
        }
        Ok(Some(whole))
    }
}

/// Decode a complete reply payload (header already stripped)
pub fn decode_reply(mut payload: Bytes) -> Result<Reply, QueryError> {
    let kind = read_u8(&mut payload, "reply type")?;

    match kind {
        S2C_CHALLENGE => Ok(Reply::Challenge(read_i32(&mut payload, "challenge")?)),
        S2A_INFO => decode_info(&mut payload).map(Reply::Info),
        S2A_INFO_GOLDSOURCE => decode_goldsource_info(&mut payload).map(Reply::Info),
        S2A_PLAYER => decode_players(&mut payload).map(Reply::Players),
        other => Err(QueryError::UnexpectedReply(other)),
    }
}

fn decode_info(buf: &mut Bytes) -> Result<InfoReply, QueryError> {
    let _protocol = read_u8(buf, "protocol")?;
    let name = read_cstring(buf, "server name")?;
    let map = read_cstring(buf, "map")?;
    let folder = read_cstring(buf, "folder")?;
    let game = read_cstring(buf, "game")?;
    let _app_id = read_u16(buf, "app id")?;
    let players = read_u8(buf, "player count")?;
    let max_players = read_u8(buf, "max players")?;
    // bots, server type, environment, visibility, VAC and the extra data
    // flags follow; reports don't use them

    Ok(InfoReply {
        name,
        map,
        folder,
        game,
        players,
        max_players,
    })
}

fn decode_goldsource_info(buf: &mut Bytes) -> Result<InfoReply, QueryError> {
    let _address = read_cstring(buf, "address")?;
    let name = read_cstring(buf, "server name")?;
    let map = read_cstring(buf, "map")?;
    let folder = read_cstring(buf, "folder")?;
    let game = read_cstring(buf, "game")?;
    let players = read_u8(buf, "player count")?;
    let max_players = read_u8(buf, "max players")?;

    Ok(InfoReply {
        name,
        map,
        folder,
        game,
        players,
        max_players,
    })
}

fn decode_players(buf: &mut Bytes) -> Result<Vec<PlayerEntry>, QueryError> {
    let count = read_u8(buf, "player count")?;
    let mut players = Vec::with_capacity(count as usize);

    for _ in 0..count {
        let index = read_u8(buf, "player index")?;
        let name = read_cstring(buf, "player name")?;
        let score = read_i32(buf, "player score")?;
        let duration_secs = read_f32(buf, "player duration")?;
        players.push(PlayerEntry {
            index,
            name,
            score,
            duration_secs,
        });
    }

    Ok(players)
}

fn read_u8(buf: &mut Bytes, what: &'static str) -> Result<u8, QueryError> {
    if buf.remaining() < 1 {
        return Err(QueryError::Truncated(what));
    }
    Ok(buf.get_u8())
}

fn read_u16(buf: &mut Bytes, what: &'static str) -> Result<u16, QueryError> {
    if buf.remaining() < 2 {
        return Err(QueryError::Truncated(what));
    }
    Ok(buf.get_u16_le())
}

fn read_i32(buf: &mut Bytes, what: &'static str) -> Result<i32, QueryError> {
    if buf.remaining() < 4 {
        return Err(QueryError::Truncated(what));
    }
    Ok(buf.get_i32_le())
}

fn read_f32(buf: &mut Bytes, what: &'static str) -> Result<f32, QueryError> {
    if buf.remaining() < 4 {
        return Err(QueryError::Truncated(what));
    }
    Ok(buf.get_f32_le())
}

fn read_cstring(buf: &mut Bytes, what: &'static str) -> Result<String, QueryError> {
    let end = buf
        .iter()
        .position(|&b| b == 0)
        .ok_or(QueryError::Truncated(what))?;
    let raw = buf.split_to(end);
    buf.advance(1);
    Ok(String::from_utf8_lossy(&raw).into_owned())
}
