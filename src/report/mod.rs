//! Status report rendering
//!
//! Turns a [`StatusSnapshot`] into a [`Report`], the channel-neutral form of a
//! Discord embed. Rendering is a pure function of the snapshot and the
//! builder's locale; the map image was already chosen when the snapshot was
//! taken (see [`assets`]).

pub mod assets;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

use crate::i18n::{t, Locale};
use crate::models::StatusSnapshot;
use crate::utils::truncate_text;

pub use assets::{AssetResolver, FsAssetResolver};

/// Embed color of reachable servers
pub const COLOR_ONLINE: u32 = 0x2E_CC_71;

/// Embed color of unreachable servers
pub const COLOR_OFFLINE: u32 = 0xE7_4C_3C;

/// Longest value a single report field may hold
pub const MAX_FIELD_CHARS: usize = 1024;

/// Role of a field inside a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Participants,
    Region,
}

/// A named block of text inside a report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportField {
    #[serde(skip)]
    pub kind: FieldKind,
    pub name: String,
    pub value: String,
    pub inline: bool,
}

/// Rendered status of one endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub title: String,
    pub description: String,
    pub color: u32,
    pub fields: Vec<ReportField>,
    /// Image file attached to the report
    pub asset: PathBuf,
    pub timestamp: DateTime<Utc>,
}

impl Report {
    /// File name under which the asset is attached
    pub fn attachment_name(&self) -> Option<String> {
        self.asset
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string)
    }

    /// Field of the given kind, if present
    pub fn field(&self, kind: FieldKind) -> Option<&ReportField> {
        self.fields.iter().find(|field| field.kind == kind)
    }

    pub fn is_online(&self) -> bool {
        self.color == COLOR_ONLINE
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.title)?;
        writeln!(f, "{}", self.description)?;
        for field in &self.fields {
            writeln!(f, "{}", field.name)?;
            writeln!(f, "{}", field.value)?;
        }
        write!(f, "[{}]", self.asset.display())
    }
}

/// Builds reports in one language
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportBuilder {
    locale: Locale,
}

impl ReportBuilder {
    pub fn new(locale: Locale) -> Self {
        Self { locale }
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    /// Render a snapshot
    pub fn build(&self, snapshot: &StatusSnapshot) -> Report {
        let locale = self.locale.as_str();
        let endpoint = &snapshot.endpoint;

        let status = if snapshot.reachable {
            t!("report.online", locale = locale)
        } else {
            t!("report.offline", locale = locale)
        };

        let mut description = format!(
            "**{}**: {}\n \n{}: {}\n{}: {}",
            t!("report.status", locale = locale),
            status,
            t!("report.address", locale = locale),
            endpoint.address(),
            t!("report.connect", locale = locale),
            endpoint.connect_link,
        );

        let mut fields = Vec::with_capacity(2);

        if snapshot.reachable {
            description.push_str(&format!(
                "\n{}: {}",
                t!("report.map", locale = locale),
                snapshot.activity
            ));

            let players = if snapshot.participants.is_empty() {
                t!("report.no_players", locale = locale).to_string()
            } else {
                truncate_text(&snapshot.participants.join("\n"), MAX_FIELD_CHARS)
            };

            fields.push(ReportField {
                kind: FieldKind::Participants,
                name: t!("report.players", locale = locale).to_string(),
                value: players,
                inline: false,
            });
        }

        fields.push(ReportField {
            kind: FieldKind::Region,
            name: t!("report.region", locale = locale).to_string(),
            value: snapshot.region.label.clone(),
            inline: true,
        });

        Report {
            title: endpoint.name.clone(),
            description,
            color: if snapshot.reachable {
                COLOR_ONLINE
            } else {
                COLOR_OFFLINE
            },
            fields,
            asset: snapshot.asset.clone(),
            timestamp: snapshot.observed_at,
        }
    }
}
