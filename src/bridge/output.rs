//! Capture of the engine's line-oriented output for one invocation.
//!
//! The print channel feeds [`OutputCollector::push_line`]; the error channel
//! is kept apart as diagnostics and echoed to the log. After a successful
//! inspection the buffered lines form an XML document:
//!
//! ```xml
//! <GPACInspect>
//!   <PIDConfigure PID="1" StreamType="Audio" name="a" .../>
//!   <PIDConfigure PID="2" StreamType="Visual" name="v" .../>
//! </GPACInspect>
//! ```
//!
//! Every element child of the root becomes one [`Track`], in document order.

use crate::engine::EngineOutput;
use crate::error::ParseError;
use crate::types::{StreamType, Track};
use std::collections::{BTreeMap, HashSet};

const PID_ATTRIBUTE: &str = "PID";
const STREAM_TYPE_ATTRIBUTE: &str = "StreamType";
const NAME_ATTRIBUTE: &str = "name";

#[derive(Debug, Default)]
pub struct OutputCollector {
    lines: Vec<String>,
    diagnostics: Vec<String>,
    /// Printed text exactly as received, blank lines included
    transcript: String,
}

impl OutputCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new invocation window
    pub fn begin(&mut self) {
        self.lines.clear();
        self.diagnostics.clear();
        self.transcript.clear();
    }

    /// Append one printed line; blank lines are dropped
    pub fn push_line(&mut self, line: &str) {
        self.transcript.push_str(line);
        self.transcript.push('\n');
        let line = line.trim();
        if !line.is_empty() {
            self.lines.push(line.to_string());
        }
    }

    pub fn push_diagnostic(&mut self, line: &str) {
        let line = line.trim();
        if !line.is_empty() {
            tracing::debug!(target: "filterflow_rs::engine", "{}", line);
            self.diagnostics.push(line.to_string());
        }
    }

    /// Split raw captured bytes into lines
    pub fn push_output(&mut self, output: &EngineOutput) {
        for line in String::from_utf8_lossy(&output.stdout).lines() {
            self.push_line(line);
        }
        for line in String::from_utf8_lossy(&output.stderr).lines() {
            self.push_diagnostic(line);
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn diagnostics(&self) -> &[String] {
        &self.diagnostics
    }

    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    /// Buffered lines joined with newlines
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    pub fn take_lines(&mut self) -> Vec<String> {
        std::mem::take(&mut self.lines)
    }

    /// Parse the buffered inspection document into tracks.
    ///
    /// Only meaningful after an invocation that exited with code 0.
    pub fn finish(&self) -> Result<Vec<Track>, ParseError> {
        if self.lines.is_empty() {
            return Err(ParseError::Empty);
        }
        parse_tracks(&self.text())
    }
}

/// Parse inspection XML into tracks
pub fn parse_tracks(xml: &str) -> Result<Vec<Track>, ParseError> {
    let doc = roxmltree::Document::parse(xml)
        .map_err(|e| ParseError::Malformed(format!("XML parse error: {}", e)))?;

    let mut seen = HashSet::new();
    let mut tracks = Vec::new();
    for (index, element) in doc
        .root_element()
        .children()
        .filter(|n| n.is_element())
        .enumerate()
    {
        let track = parse_track(index, &element)?;
        if !seen.insert(track.pid) {
            return Err(ParseError::DuplicatePid(track.pid));
        }
        tracks.push(track);
    }
    Ok(tracks)
}

fn parse_track(index: usize, element: &roxmltree::Node) -> Result<Track, ParseError> {
    let attributes: BTreeMap<String, String> = element
        .attributes()
        .map(|a| (a.name().to_string(), a.value().to_string()))
        .collect();

    let pid_text = attributes
        .get(PID_ATTRIBUTE)
        .ok_or(ParseError::MissingAttribute {
            index,
            attribute: PID_ATTRIBUTE,
        })?;
    let pid = pid_text
        .trim()
        .parse::<u32>()
        .map_err(|_| ParseError::InvalidPid {
            index,
            value: pid_text.clone(),
        })?;

    let stream_type = attributes
        .get(STREAM_TYPE_ATTRIBUTE)
        .ok_or(ParseError::MissingAttribute {
            index,
            attribute: STREAM_TYPE_ATTRIBUTE,
        })?
        .parse::<StreamType>()
        .unwrap_or_else(|never| match never {});

    let name = attributes
        .get(NAME_ATTRIBUTE)
        .cloned()
        .unwrap_or_else(|| format!("PID{}", pid));

    Ok(Track {
        pid,
        stream_type,
        name,
        attributes,
    })
}
