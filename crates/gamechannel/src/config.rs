//! Runtime configuration and the static channel registry.
//!
//! Everything here is a plain struct built once at startup. Nothing reads
//! the environment; the binary maps flags and environment variables onto
//! these types.

use std::path::Path;
use std::time::Duration;

use gamechannel_protocol::{
    ChannelEntry, ChannelStatus, DEFAULT_MAX_FRAME_SIZE, FramePolicy, Framer, ServerList,
};
use gamechannel_transport::TcpOptions;
use serde::Deserialize;

use crate::ConfigError;

/// Port of the main channel, used when nothing else is configured.
pub const DEFAULT_CHANNEL_PORT: u16 = 9090;

/// Host both listeners bind to by default.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Settings for the room protocol listener.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Address to listen on.
    pub bind_addr: String,
    /// How the framer treats a leading byte that does not open an object.
    pub frame_policy: FramePolicy,
    /// Largest accepted message, in bytes.
    pub max_frame_size: usize,
    /// A connection with no complete read for this long is closed.
    /// `None` disables the deadline.
    pub idle_timeout: Option<Duration>,
    /// Socket options for accepted connections.
    pub tcp: TcpOptions,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("{DEFAULT_HOST}:{DEFAULT_CHANNEL_PORT}"),
            frame_policy: FramePolicy::Tolerant,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            idle_timeout: Some(Duration::from_secs(120)),
            tcp: TcpOptions::default(),
        }
    }
}

impl ChannelConfig {
    /// The framer every connection uses.
    pub fn framer(&self) -> Framer {
        Framer::new(self.frame_policy, self.max_frame_size)
    }
}

/// Settings for the discovery responder.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub bind_addr: String,
    /// Bytes read (and ignored) before the list is written.
    pub handshake_len: usize,
    /// How long to wait for the handshake before answering anyway.
    pub handshake_wait: Duration,
    /// Hard limit on the whole exchange.
    pub deadline: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("{DEFAULT_HOST}:{DEFAULT_CHANNEL_PORT}"),
            handshake_len: 2,
            handshake_wait: Duration::from_secs(2),
            deadline: Duration::from_secs(30),
        }
    }
}

// ---------------------------------------------------------------------------
// Port lists
// ---------------------------------------------------------------------------

/// Parses a comma-separated list of ports and inclusive ranges, e.g.
/// `"29998,29990-29992"`.
///
/// Blank, zero, malformed and reversed entries are skipped. Duplicates are
/// dropped, keeping the first occurrence.
pub fn parse_ports(list: &str) -> Vec<u16> {
    let mut out = Vec::new();
    for part in list.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.split_once('-') {
            Some((start, end)) => {
                let (Ok(start), Ok(end)) =
                    (start.trim().parse::<u16>(), end.trim().parse::<u16>())
                else {
                    continue;
                };
                if start > 0 && end >= start {
                    out.extend(start..=end);
                }
            }
            None => match part.parse::<u16>() {
                Ok(port) if port > 0 => out.push(port),
                _ => {}
            },
        }
    }
    dedup(out)
}

/// Combines the configured sources into one port list.
///
/// Order is `single`, then the ports in `list`, then `alias`. Falls back to
/// [`DEFAULT_CHANNEL_PORT`] when nothing is configured.
pub fn channel_ports(single: Option<u16>, list: Option<&str>, alias: Option<u16>) -> Vec<u16> {
    let mut ports: Vec<u16> = single.into_iter().filter(|p| *p > 0).collect();
    if let Some(list) = list {
        ports.extend(parse_ports(list));
    }
    ports.extend(alias.filter(|p| *p > 0));

    if ports.is_empty() {
        return vec![DEFAULT_CHANNEL_PORT];
    }
    dedup(ports)
}

/// Picks the port this process serves.
///
/// An explicit port wins. Otherwise the port at `index`, or the first
/// port when the index is missing or out of range.
pub fn select_port(ports: &[u16], explicit: Option<u16>, index: Option<usize>) -> u16 {
    if let Some(port) = explicit.filter(|p| *p > 0) {
        return port;
    }
    index
        .and_then(|i| ports.get(i))
        .or_else(|| ports.first())
        .copied()
        .unwrap_or(DEFAULT_CHANNEL_PORT)
}

fn dedup(ports: Vec<u16>) -> Vec<u16> {
    let mut seen = std::collections::HashSet::new();
    ports.into_iter().filter(|p| seen.insert(*p)).collect()
}

// ---------------------------------------------------------------------------
// Channel registry
// ---------------------------------------------------------------------------

/// One entry of a channel file. Fields other than these are ignored.
#[derive(Debug, Deserialize)]
struct ChannelFileEntry {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    port: u16,
}

/// The static list of channels advertised by discovery.
///
/// Loaded once at startup and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRegistry {
    entries: Vec<ChannelEntry>,
}

impl ChannelRegistry {
    /// One online entry per port, all advertised at `ip`.
    ///
    /// The default port is named "Main Channel", every other one "Channel".
    pub fn from_ports(ip: &str, ports: &[u16]) -> Self {
        let entries = ports
            .iter()
            .map(|&port| ChannelEntry {
                id: default_id(port),
                name: default_name(port).to_string(),
                ip: ip.to_string(),
                port,
                status: ChannelStatus::Online,
            })
            .collect();
        Self { entries }
    }

    /// Loads a JSON array of `{"id", "name", "port"}` objects.
    ///
    /// Missing ids and names get the same defaults as
    /// [`from_ports`](Self::from_ports).
    ///
    /// # Errors
    /// - [`ConfigError::Io`] if the file cannot be read
    /// - [`ConfigError::Parse`] if it is not a valid channel array
    /// - [`ConfigError::NoChannels`] if the array is empty
    pub fn from_json_file(path: impl AsRef<Path>, ip: &str) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw, ip)
    }

    /// Same as [`from_json_file`](Self::from_json_file) for an in-memory
    /// document.
    pub fn from_json(raw: &str, ip: &str) -> Result<Self, ConfigError> {
        let file: Vec<ChannelFileEntry> = serde_json::from_str(raw)?;
        if file.is_empty() {
            return Err(ConfigError::NoChannels);
        }

        let entries = file
            .into_iter()
            .map(|e| ChannelEntry {
                id: if e.id.is_empty() { default_id(e.port) } else { e.id },
                name: if e.name.is_empty() {
                    default_name(e.port).to_string()
                } else {
                    e.name
                },
                ip: ip.to_string(),
                port: e.port,
                status: ChannelStatus::Online,
            })
            .collect();
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[ChannelEntry] {
        &self.entries
    }

    pub fn ports(&self) -> Vec<u16> {
        self.entries.iter().map(|e| e.port).collect()
    }

    /// The discovery document.
    pub fn server_list(&self) -> ServerList {
        ServerList {
            servers: self.entries.clone(),
        }
    }
}

fn default_id(port: u16) -> String {
    format!("channel-{port}")
}

fn default_name(port: u16) -> &'static str {
    if port == DEFAULT_CHANNEL_PORT {
        "Main Channel"
    } else {
        "Channel"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ports_list_and_ranges() {
        assert_eq!(
            parse_ports("29998, 29990-29992 ,29996"),
            vec![29998, 29990, 29991, 29992, 29996]
        );
    }

    #[test]
    fn test_parse_ports_skips_bad_entries() {
        assert_eq!(parse_ports("0,abc,,10-5,70000,3-x,7"), vec![7]);
        assert!(parse_ports("   ").is_empty());
    }

    #[test]
    fn test_parse_ports_dedups_in_order() {
        assert_eq!(parse_ports("5,3-6,5"), vec![5, 3, 4, 6]);
    }

    #[test]
    fn test_channel_ports_order_and_fallback() {
        assert_eq!(
            channel_ports(Some(9000), Some("9001,9000"), Some(9002)),
            vec![9000, 9001, 9002]
        );
        assert_eq!(channel_ports(None, None, None), vec![DEFAULT_CHANNEL_PORT]);
        assert_eq!(channel_ports(Some(0), Some(""), None), vec![DEFAULT_CHANNEL_PORT]);
    }

    #[test]
    fn test_select_port() {
        let ports = [9090, 9091, 9092];
        assert_eq!(select_port(&ports, Some(7000), Some(2)), 7000);
        assert_eq!(select_port(&ports, None, Some(2)), 9092);
        assert_eq!(select_port(&ports, None, Some(10)), 9090);
        assert_eq!(select_port(&ports, Some(0), None), 9090);
        assert_eq!(select_port(&[], None, None), DEFAULT_CHANNEL_PORT);
    }

    #[test]
    fn test_registry_from_ports_names_main_channel() {
        let reg = ChannelRegistry::from_ports("10.0.0.2", &[9090, 9091]);
        let e = reg.entries();
        assert_eq!(e[0].name, "Main Channel");
        assert_eq!(e[0].id, "channel-9090");
        assert_eq!(e[1].name, "Channel");
        assert!(e.iter().all(|c| c.ip == "10.0.0.2" && c.status == ChannelStatus::Online));
        assert_eq!(reg.ports(), vec![9090, 9091]);
    }

    #[test]
    fn test_registry_from_json_ignores_extra_fields() {
        let raw = r#"[
            {"id":"ch1","name":"Alpha","port":29998,"run_cmd":"./server -port 29998"},
            {"port":9090}
        ]"#;
        let reg = ChannelRegistry::from_json(raw, "127.0.0.1").unwrap();
        assert_eq!(reg.entries()[0].id, "ch1");
        assert_eq!(reg.entries()[0].name, "Alpha");
        assert_eq!(reg.entries()[1].id, "channel-9090");
        assert_eq!(reg.entries()[1].name, "Main Channel");
    }

    #[test]
    fn test_registry_from_json_errors() {
        assert!(matches!(
            ChannelRegistry::from_json("[]", "127.0.0.1"),
            Err(ConfigError::NoChannels)
        ));
        assert!(matches!(
            ChannelRegistry::from_json("{", "127.0.0.1"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            ChannelRegistry::from_json_file("/nonexistent/channels.json", "127.0.0.1"),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn test_defaults() {
        let cfg = ChannelConfig::default();
        assert_eq!(cfg.bind_addr, "127.0.0.1:9090");
        assert_eq!(cfg.frame_policy, FramePolicy::Tolerant);
        assert_eq!(cfg.max_frame_size, 512 * 1024);
        assert_eq!(cfg.framer().max_size(), 512 * 1024);

        let disc = DiscoveryConfig::default();
        assert_eq!(disc.handshake_len, 2);
        assert_eq!(disc.deadline, Duration::from_secs(30));
    }
}
