pub mod config;
pub mod error;
pub mod line_protocol;
pub mod sink;
pub mod transport;
pub mod uri;

pub use config::{load_sink_config, parse_sink_config, SinkConfig, SinkConfigBuilder};
pub use error::{Result, SinkError};
pub use line_protocol::{now_nanos, to_line};
pub use sink::TelegrafSink;
pub use transport::{Transport, UdpTransport};
pub use uri::{Destination, DEFAULT_HOST, DEFAULT_PORT};
