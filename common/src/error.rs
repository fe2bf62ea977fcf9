use std::fmt;
use thiserror::Error;

/// Routing stage, printed as the log prefix used for that stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Global,
    Detail,
    ViaEscape,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Phase::Global => "[GLOBAL]",
            Phase::Detail => "[DETAIL]",
            Phase::ViaEscape => "[VIA-ESCAPE]",
        };
        f.write_str(tag)
    }
}

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("configuration file: {0}")]
    Config(String),

    #[error("port '{name}' at ({x:.3}, {y:.3}) um lies outside the routing grid")]
    InvalidPort { name: String, x: f64, y: f64 },

    #[error(
        "{phase} net '{net}' unroutable between ({:.3}, {:.3}) and ({:.3}, {:.3}) um",
        .source_um.0, .source_um.1, .sink_um.0, .sink_um.1
    )]
    NoRoute {
        net: String,
        phase: Phase,
        source_um: (f64, f64),
        sink_um: (f64, f64),
    },

    #[error("path invariant violated: {0}")]
    PathInvariantViolated(String),

    #[error("routing cancelled")]
    Cancelled,

    #[error("net '{net}' failed: {source}")]
    NetFailed {
        net: String,
        #[source]
        source: Box<RouteError>,
    },
}

pub type Result<T> = std::result::Result<T, RouteError>;
