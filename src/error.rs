use std::fmt;

#[derive(Debug)]
pub enum PlayerError {
    /// The selected file is not audio; nothing was changed.
    InputRejected { mime: String },
    NoTrackLoaded,
    Decode(DecodeError),
    Graph(GraphError),
    /// The compressed encoder was present but failed mid-stream.
    Encode(String),
    ExportInProgress,
    /// A render job finished after the track it was started for was replaced.
    ExportOrphaned,
    UnknownParam(String),
    UnknownPreset(String),
    InvalidValue { param: &'static str, value: f64 },
    Config(String),
}

#[derive(Debug)]
pub enum DecodeError {
    Empty,
    UnsupportedFormat { mime: String },
    Wav(String),
    Mp3(String),
    InvalidLayout { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum GraphError {
    DanglingEdge { from: usize, to: usize },
    SourceCount(usize),
    SinkCount(usize),
    Cycle { visited: usize, total: usize },
}

impl fmt::Display for PlayerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerError::InputRejected { mime } => {
                write!(f, "Please select an audio file (got '{mime}')")
            }
            PlayerError::NoTrackLoaded => write!(f, "Please load an audio file first"),
            PlayerError::Decode(e) => write!(f, "Decode error: {e}"),
            PlayerError::Graph(e) => write!(f, "Graph error: {e}"),
            PlayerError::Encode(msg) => write!(f, "Encode error: {msg}"),
            PlayerError::ExportInProgress => write!(f, "An export is already in progress"),
            PlayerError::ExportOrphaned => {
                write!(f, "Export discarded: the track was replaced while rendering")
            }
            PlayerError::UnknownParam(name) => write!(f, "Unknown control '{name}'"),
            PlayerError::UnknownPreset(name) => write!(f, "Unknown preset '{name}'"),
            PlayerError::InvalidValue { param, value } => {
                write!(f, "Invalid value {value} for {param}")
            }
            PlayerError::Config(msg) => write!(f, "Config error: {msg}"),
        }
    }
}

impl std::error::Error for PlayerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PlayerError::Decode(e) => Some(e),
            PlayerError::Graph(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Empty => write!(f, "file contains no audio frames"),
            DecodeError::UnsupportedFormat { mime } => write!(f, "unsupported format '{mime}'"),
            DecodeError::Wav(msg) => write!(f, "invalid WAV data: {msg}"),
            DecodeError::Mp3(msg) => write!(f, "invalid MP3 data: {msg}"),
            DecodeError::InvalidLayout { reason } => write!(f, "invalid channel layout: {reason}"),
        }
    }
}

impl std::error::Error for DecodeError {}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphError::DanglingEdge { from, to } => {
                write!(f, "edge {from} -> {to} references a missing node")
            }
            GraphError::SourceCount(n) => write!(f, "expected exactly one source, found {n}"),
            GraphError::SinkCount(n) => write!(f, "expected exactly one sink, found {n}"),
            GraphError::Cycle { visited, total } => {
                write!(f, "cycle detected: ordered {visited} of {total} nodes")
            }
        }
    }
}

impl std::error::Error for GraphError {}

impl From<DecodeError> for PlayerError {
    fn from(e: DecodeError) -> Self {
        PlayerError::Decode(e)
    }
}

impl From<GraphError> for PlayerError {
    fn from(e: GraphError) -> Self {
        PlayerError::Graph(e)
    }
}

impl From<hound::Error> for DecodeError {
    fn from(e: hound::Error) -> Self {
        DecodeError::Wav(e.to_string())
    }
}
