use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Last-known status of a monitor, derived from its most recently
/// processed check, heartbeat, or overdue event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorStatus {
    #[default]
    Unknown,
    Up,
    Down,
}

impl std::fmt::Display for MonitorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MonitorStatus::Unknown => write!(f, "unknown"),
            MonitorStatus::Up => write!(f, "up"),
            MonitorStatus::Down => write!(f, "down"),
        }
    }
}

/// Closed set of supported monitor protocols. The three HTTP variants share
/// one probe; they differ only in which secondary check is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorType {
    Http,
    HttpKeyword,
    HttpJson,
    Tcp,
    Ping,
    Dns,
    Websocket,
    Steam,
    Docker,
    Push,
}

impl std::fmt::Display for MonitorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MonitorType::Http => "http",
            MonitorType::HttpKeyword => "http_keyword",
            MonitorType::HttpJson => "http_json",
            MonitorType::Tcp => "tcp",
            MonitorType::Ping => "ping",
            MonitorType::Dns => "dns",
            MonitorType::Websocket => "websocket",
            MonitorType::Steam => "steam",
            MonitorType::Docker => "docker",
            MonitorType::Push => "push",
        };
        write!(f, "{s}")
    }
}

/// A configured target plus protocol and schedule metadata.
///
/// `interval_seconds` is consulted only for push-monitor grace computation;
/// active probes run on the scheduler's fixed cadence regardless.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Monitor {
    pub id: i32,
    pub name: String,
    pub monitor_type: MonitorType,
    /// URL, host:port, hostname, or container host depending on the type.
    pub target: String,
    /// Opaque ingress token, push monitors only.
    pub push_token: Option<String>,
    pub interval_seconds: i32,
    pub timeout_seconds: i32,
    /// HTTP method, defaults to GET when empty.
    pub method: Option<String>,
    pub body: Option<String>,
    /// JSON object of extra request headers.
    pub headers: Option<String>,
    /// Expected HTTP status: exact code like "200", or the "2xx" wildcard.
    pub expected_status: Option<String>,
    /// Substring for keyword checks; doubles as the container name/id for
    /// docker monitors.
    pub keyword: Option<String>,
    pub json_path: Option<String>,
    pub json_value: Option<String>,
    pub enabled: bool,
    pub last_status: MonitorStatus,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub certificate_expiry: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Monitor {
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_seconds.max(1) as u64)
    }
}

/// One completed check outcome. Append-only; never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub monitor_id: i32,
    pub status: MonitorStatus,
    pub response_time_ms: i64,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// A notification sink. `config` is an opaque JSON blob that only the
/// matching sender knows how to parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationChannel {
    pub id: i32,
    pub name: String,
    pub channel_type: String,
    pub config: String,
    pub enabled: bool,
}

/// Many-to-many edge between a monitor and a notification channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Subscription {
    pub monitor_id: i32,
    pub channel_id: i32,
}
