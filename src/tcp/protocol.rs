//! Line protocol spoken over the TCP surface
//!
//! ```text
//! client: <api key>[,<region id>]\n
//! server: a:ok | a:timeout | a:wrong_api_key
//! server: s:<region id>=<0|1>        state line
//! server: p:<random integer>         keepalive
//! ```

use std::fmt;

/// One server-to-client line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line {
    AuthOk,
    AuthTimeout,
    WrongApiKey,
    State { region: u32, alert: bool },
    Ping(u32),
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Line::AuthOk => write!(f, "a:ok"),
            Line::AuthTimeout => write!(f, "a:timeout"),
            Line::WrongApiKey => write!(f, "a:wrong_api_key"),
            Line::State { region, alert } => write!(f, "s:{}={}", region, u8::from(*alert)),
            Line::Ping(n) => write!(f, "p:{n}"),
        }
    }
}

impl Line {
    /// Wire form, newline terminated
    pub fn to_wire(self) -> String {
        format!("{self}\n")
    }
}

/// Parsed authentication line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRequest {
    pub api_key: String,
    /// `0` subscribes to every region
    pub region: u32,
}

impl AuthRequest {
    /// Parse `<key>[,<region>]`. An unparseable region means every region.
    pub fn parse(line: &str) -> Self {
        let mut parts = line.trim().split(',');
        let api_key = parts.next().unwrap_or_default().to_string();
        let region = parts
            .next()
            .and_then(|id| id.trim().parse().ok())
            .unwrap_or(0);
        Self { api_key, region }
    }
}
