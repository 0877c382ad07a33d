// Core data structures for serverwatch

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Activity label used when the map is not known
pub const UNKNOWN_ACTIVITY: &str = "unknown";

/// A monitored game server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Unique display key, also used as the binding identity
    pub name: String,
    /// Host name or IP literal
    pub ip: String,
    pub port: u16,
    /// Opaque connect hint shown to users (e.g. a steam:// link)
    pub connect_link: String,
}

impl Endpoint {
    pub fn new(
        name: impl Into<String>,
        ip: impl Into<String>,
        port: u16,
        connect_link: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            ip: ip.into(),
            port,
            connect_link: connect_link.into(),
        }
    }

    /// Identity under which the endpoint's report binding is stored
    pub fn identity(&self) -> &str {
        &self.name
    }

    /// `ip:port` as shown in reports and used for socket connects
    pub fn address(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }

    /// Check whether this endpoint answers to the given address
    pub fn matches_address(&self, ip: &str, port: u16) -> bool {
        self.ip == ip && self.port == port
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{})", self.name, self.ip, self.port)
    }
}

/// Live state reported by a server's query protocol
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerMetadata {
    /// Current map
    pub activity: String,
    /// Connected player names in reply order
    pub participants: Vec<String>,
    /// Server name as advertised by the server itself
    pub server_name: Option<String>,
    pub game: Option<String>,
    pub player_count: Option<u8>,
    pub max_players: Option<u8>,
}

/// Human-readable region of an endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionLabel {
    /// ISO country code when the lookup succeeded and the code is known
    pub country: Option<String>,
    /// Localized display text (flag + name, or the unknown label)
    pub label: String,
}

impl RegionLabel {
    pub fn known(country: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            country: Some(country.into()),
            label: label.into(),
        }
    }

    pub fn unknown(label: impl Into<String>) -> Self {
        Self {
            country: None,
            label: label.into(),
        }
    }

    pub fn is_known(&self) -> bool {
        self.country.is_some()
    }
}

impl fmt::Display for RegionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

/// Momentary status of one endpoint in one cycle
///
/// Built once per cycle and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub endpoint: Endpoint,
    pub reachable: bool,
    /// Map name, [`UNKNOWN_ACTIVITY`] when unreachable or metadata is unavailable
    pub activity: String,
    pub participants: Vec<String>,
    pub region: RegionLabel,
    /// Image shown with the report
    pub asset: PathBuf,
    pub observed_at: DateTime<Utc>,
}

impl StatusSnapshot {
    /// Snapshot of an endpoint that did not answer the liveness probe
    pub fn unreachable(endpoint: Endpoint, region: RegionLabel, asset: PathBuf) -> Self {
        Self {
            endpoint,
            reachable: false,
            activity: UNKNOWN_ACTIVITY.to_string(),
            participants: Vec::new(),
            region,
            asset,
            observed_at: Utc::now(),
        }
    }

    /// Snapshot of a reachable endpoint; `metadata` is `None` when the query failed
    ///
    /// `resolve_asset` receives the final activity label and picks the image.
    pub fn reachable<F>(
        endpoint: Endpoint,
        metadata: Option<ServerMetadata>,
        region: RegionLabel,
        resolve_asset: F,
    ) -> Self
    where
        F: FnOnce(&str) -> PathBuf,
    {
        let (activity, participants) = match metadata {
            Some(meta) if !meta.activity.trim().is_empty() => (meta.activity, meta.participants),
            Some(meta) => (UNKNOWN_ACTIVITY.to_string(), meta.participants),
            None => (UNKNOWN_ACTIVITY.to_string(), Vec::new()),
        };
        let asset = resolve_asset(&activity);

        Self {
            endpoint,
            reachable: true,
            activity,
            participants,
            region,
            asset,
            observed_at: Utc::now(),
        }
    }
}

/// External identifier of a published report (a Discord message snowflake)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportId(pub u64);

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ReportId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(ReportId)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alpha() -> Endpoint {
        Endpoint::new("Alpha", "10.0.0.5", 27015, "steam://connect/10.0.0.5:27015")
    }

    #[test]
    fn test_endpoint_address_and_identity() {
        let endpoint = alpha();
        assert_eq!(endpoint.address(), "10.0.0.5:27015");
        assert_eq!(endpoint.identity(), "Alpha");
        assert!(endpoint.matches_address("10.0.0.5", 27015));
        assert!(!endpoint.matches_address("10.0.0.5", 27016));
    }

    #[test]
    fn test_unreachable_snapshot_defaults() {
        let snapshot = StatusSnapshot::unreachable(
            alpha(),
            RegionLabel::unknown("Unknown"),
            PathBuf::from("maps/unknown.png"),
        );
        assert!(!snapshot.reachable);
        assert_eq!(snapshot.activity, UNKNOWN_ACTIVITY);
        assert!(snapshot.participants.is_empty());
    }

    #[test]
    fn test_reachable_snapshot_without_metadata() {
        let snapshot = StatusSnapshot::reachable(
            alpha(),
            None,
            RegionLabel::unknown("Unknown"),
            |activity| PathBuf::from(format!("maps/{activity}.png")),
        );
        assert!(snapshot.reachable);
        assert_eq!(snapshot.activity, UNKNOWN_ACTIVITY);
        assert!(snapshot.participants.is_empty());
    }

    #[test]
    fn test_reachable_snapshot_blank_map_is_unknown() {
        let metadata = ServerMetadata {
            activity: String::new(),
            participants: vec!["Bob".to_string()],
            ..Default::default()
        };
        let snapshot = StatusSnapshot::reachable(
            alpha(),
            Some(metadata),
            RegionLabel::unknown("Unknown"),
            |activity| PathBuf::from(format!("maps/{activity}.png")),
        );
        assert_eq!(snapshot.activity, UNKNOWN_ACTIVITY);
        assert_eq!(snapshot.asset, PathBuf::from("maps/unknown.png"));
        assert_eq!(snapshot.participants, vec!["Bob".to_string()]);
    }

    #[test]
    fn test_report_id_parse() {
        assert_eq!("1234567890".parse::<ReportId>().unwrap(), ReportId(1234567890));
        assert_eq!(" 42 ".parse::<ReportId>().unwrap(), ReportId(42));
        assert!("abc".parse::<ReportId>().is_err());
    }
}
