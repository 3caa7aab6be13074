//! Connection handles.
//!
//! Filter handles are bare stream types (`"Visual"`). Source handles name
//! a concrete track: `"<trackName>/<StreamType>"`.

use crate::types::{StreamType, Track};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Handle {
    Stream(StreamType),
    Track { name: String, stream_type: StreamType },
}

impl Handle {
    pub fn stream(stream_type: StreamType) -> Self {
        Handle::Stream(stream_type)
    }

    pub fn track(name: impl Into<String>, stream_type: StreamType) -> Self {
        Handle::Track {
            name: name.into(),
            stream_type,
        }
    }

    pub fn stream_type(&self) -> &StreamType {
        match self {
            Handle::Stream(st) => st,
            Handle::Track { stream_type, .. } => stream_type,
        }
    }
}

impl From<&Track> for Handle {
    fn from(track: &Track) -> Self {
        Handle::track(track.name.clone(), track.stream_type.clone())
    }
}

impl FromStr for Handle {
    type Err = std::convert::Infallible;

    /// Track names may contain `/`; stream types never do.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.rsplit_once('/') {
            Some((name, st)) => Handle::track(name, StreamType::from(st.to_string())),
            None => Handle::Stream(StreamType::from(s.to_string())),
        })
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handle::Stream(st) => write!(f, "{}", st),
            Handle::Track { name, stream_type } => write!(f, "{}/{}", name, stream_type),
        }
    }
}
