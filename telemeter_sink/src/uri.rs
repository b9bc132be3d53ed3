use std::fmt;
use tracing::warn;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 8094;

/// Where the sink sends its datagrams.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Destination {
    pub host: String,
    pub port: u16,
}

impl Destination {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parses `[scheme://][host]:port`.
    ///
    /// The segment before the last `:` is the host (leading slashes removed)
    /// and the last segment is the port. A missing or empty host becomes
    /// `localhost`; a port without leading digits becomes `8094`. Never fails.
    pub fn parse(uri: &str) -> Self {
        let parts: Vec<&str> = uri.split(':').collect();

        let host = parts
            .len()
            .checked_sub(2)
            .map(|i| parts[i].trim_start_matches('/'))
            .filter(|host| !host.is_empty())
            .unwrap_or(DEFAULT_HOST);

        let raw_port = parts.last().copied().unwrap_or_default();
        let port = leading_port(raw_port).unwrap_or_else(|| {
            if !raw_port.is_empty() {
                warn!(uri = %uri, port = %raw_port, "Unparseable port, using {}", DEFAULT_PORT);
            }
            DEFAULT_PORT
        });

        Self::new(host, port)
    }
}

impl Default for Destination {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PORT)
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

// Reads the decimal prefix of `raw`, the way lenient integer parsing does:
// "8094abc" is 8094, "abc" is nothing.
fn leading_port(raw: &str) -> Option<u16> {
    let trimmed = raw.trim_start();
    let digits: String = trimmed.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_hostname() {
        assert_eq!(
            Destination::parse("udp://telegraf:8094"),
            Destination::new("telegraf", 8094)
        );
    }

    #[test]
    fn test_parse_ipv4() {
        assert_eq!(
            Destination::parse("udp://127.0.0.1:9000"),
            Destination::new("127.0.0.1", 9000)
        );
    }

    #[test]
    fn test_parse_without_host() {
        assert_eq!(Destination::parse("udp://:8094"), Destination::new("localhost", 8094));
    }

    #[test]
    fn test_parse_without_scheme() {
        assert_eq!(Destination::parse("telegraf:8125"), Destination::new("telegraf", 8125));
    }

    #[test]
    fn test_parse_defaults() {
        assert_eq!(Destination::parse(""), Destination::default());
        assert_eq!(Destination::parse("udp://telegraf:http"), Destination::new("telegraf", 8094));
        assert_eq!(Destination::parse("udp://telegraf:"), Destination::new("telegraf", 8094));
        assert_eq!(Destination::parse("udp://telegraf:99999"), Destination::new("telegraf", 8094));
    }

    #[test]
    fn test_display() {
        assert_eq!(Destination::new("telegraf", 8094).to_string(), "telegraf:8094");
    }

    proptest! {
        #[test]
        fn parse_never_yields_empty_host(uri in ".*") {
            let destination = Destination::parse(&uri);
            prop_assert!(!destination.host.is_empty());
        }
    }
}
