//! Core data types shared by the catalog, graph and bridge layers.
//!
//! # Main Types
//!
//! - [`StreamType`] - Media stream category, used as capability tag and connection handle
//! - [`Track`] - One media stream discovered by inspecting an input

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Media stream category as reported by the engine.
///
/// Names follow the engine's spelling (`Visual`, `Audio`, ...). Anything the
/// engine reports that is not one of the common categories is kept verbatim
/// in [`StreamType::Other`] so capability matching still works on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StreamType {
    Visual,
    Audio,
    Text,
    Scene,
    File,
    Other(String),
}

impl StreamType {
    pub fn as_str(&self) -> &str {
        match self {
            StreamType::Visual => "Visual",
            StreamType::Audio => "Audio",
            StreamType::Text => "Text",
            StreamType::Scene => "Scene",
            StreamType::File => "File",
            StreamType::Other(name) => name,
        }
    }
}

impl FromStr for StreamType {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "Visual" => StreamType::Visual,
            "Audio" => StreamType::Audio,
            "Text" => StreamType::Text,
            "Scene" => StreamType::Scene,
            "File" => StreamType::File,
            other => StreamType::Other(other.to_string()),
        })
    }
}

impl From<String> for StreamType {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(st) => st,
            Err(never) => match never {},
        }
    }
}

impl From<StreamType> for String {
    fn from(st: StreamType) -> Self {
        st.as_str().to_string()
    }
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured metadata for one stream found by inspection.
///
/// `attributes` holds every attribute the engine reported, verbatim and as
/// strings, including `PID` and `StreamType`. The typed fields are
/// conveniences derived from those attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub pid: u32,
    pub stream_type: StreamType,
    pub name: String,
    pub attributes: BTreeMap<String, String>,
}

impl Track {
    /// Look up a raw attribute by its engine name
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Connection handle this track exposes on a Source node: `"<name>/<StreamType>"`
    pub fn handle(&self) -> String {
        format!("{}/{}", self.name, self.stream_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_type_parse_known() {
        assert_eq!("Audio".parse::<StreamType>().unwrap(), StreamType::Audio);
        assert_eq!("Visual".parse::<StreamType>().unwrap(), StreamType::Visual);
    }

    #[test]
    fn test_stream_type_parse_unknown_kept_verbatim() {
        let st: StreamType = "ObjectDescriptor".parse().unwrap();
        assert_eq!(st, StreamType::Other("ObjectDescriptor".into()));
        assert_eq!(st.to_string(), "ObjectDescriptor");
    }

    #[test]
    fn test_stream_type_serde_as_string() {
        let json = serde_json::to_string(&vec![StreamType::Visual, StreamType::Audio]).unwrap();
        assert_eq!(json, r#"["Visual","Audio"]"#);
        let back: Vec<StreamType> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, vec![StreamType::Visual, StreamType::Audio]);
    }

    #[test]
    fn test_track_handle() {
        let track = Track {
            pid: 1,
            stream_type: StreamType::Audio,
            name: "track1".into(),
            attributes: BTreeMap::new(),
        };
        assert_eq!(track.handle(), "track1/Audio");
    }
}
