//! Parsers for the engine's help output.
//!
//! Four outputs feed the catalogs:
//!
//! - `-h codecs`: a preamble, then `name[|alias...] [IODE]: description (mime[, ...])`
//! - `-h filters`: one `name: description` line per filter
//! - `-hh <name>`: metadata block, free-form body, options and a capability bundle
//! - `-h links <name>`: `Sources: ...` and `Sinks: ...` lines (on the error stream)

use super::codec::{CodecCapabilities, CodecDescriptor};
use super::descriptor::{Capabilities, RawFilterDescriptor};
use super::option::{OptionKind, RawOptionSchema};
use crate::error::CatalogError;
use crate::types::StreamType;
use serde_json::Value;
use std::collections::BTreeMap;

/// Header lines preceding the metadata block of `-hh`
const HELP_HEADER_LINES: usize = 3;

const OPTIONS_MARKER: &str = "Options (expert):";
const NO_OPTIONS_MARKER: &str = "No options";
const CAPABILITIES_MARKER: &str = "Capabilities Bundle:";

/// Empty lines before the codec list starts
const CODEC_PREAMBLE_BREAKS: usize = 2;

/// Parse `-h codecs`. Aliases become their own entries with `variant_of` set,
/// listed before their primary name.
pub fn parse_codec_list(text: &str) -> Result<Vec<CodecDescriptor>, CatalogError> {
    let mut lines = text.lines();
    let mut breaks = 0;
    while breaks < CODEC_PREAMBLE_BREAKS {
        let line = lines.next().ok_or_else(|| {
            CatalogError::HelpFormat("codec listing ended inside its preamble".into())
        })?;
        if line.is_empty() {
            breaks += 1;
        }
    }

    let mut codecs = Vec::new();
    for line in lines {
        let Some((names, letters, description, mime)) = parse_codec_line(line) else {
            continue;
        };
        let capabilities = CodecCapabilities::from_letters(letters);
        let mut names = names.split('|');
        let Some(primary) = names.next() else {
            continue;
        };
        for alias in names {
            codecs.push(CodecDescriptor {
                name: alias.to_string(),
                description: description.to_string(),
                mime: mime.to_string(),
                variant_of: Some(primary.to_string()),
                capabilities,
            });
        }
        codecs.push(CodecDescriptor {
            name: primary.to_string(),
            description: description.to_string(),
            mime: mime.to_string(),
            variant_of: None,
            capabilities,
        });
    }
    Ok(codecs)
}

/// `names letters: description (mime list)` into its four fields.
///
/// The mime is the last parenthesized group, the description follows the
/// last colon before it.
fn parse_codec_line(line: &str) -> Option<(&str, &str, &str, &str)> {
    let (head, mimes) = line.trim_end().strip_suffix(')')?.rsplit_once(" (")?;
    let (name_part, description) = head.rsplit_once(':')?;
    let description = description.trim();
    if description.is_empty() || mimes.is_empty() {
        return None;
    }
    let mut fields = name_part.split_whitespace();
    let names = fields.next()?;
    let letters = fields.next().unwrap_or("");

    let mime = if mimes.contains(',') {
        mimes
            .split(',')
            .map(str::trim)
            .find(|m| m.contains('/'))
            .unwrap_or(mimes)
    } else {
        mimes
    };
    Some((names, letters, description, mime))
}

/// Parse `-h filters` into `(name, description)` pairs.
pub fn parse_filter_list(text: &str) -> Vec<(String, String)> {
    text.lines()
        .filter_map(|line| {
            let (name, description) = line.split_once(": ")?;
            let name = name.trim();
            let description = description.trim();
            if name.is_empty() || description.is_empty() || name.contains(char::is_whitespace) {
                return None;
            }
            Some((name.to_string(), description.to_string()))
        })
        .collect()
}

/// Parse `-hh <name>` into a catalog entry without links.
pub fn parse_filter_help(
    name: &str,
    description: &str,
    text: &str,
) -> Result<RawFilterDescriptor, CatalogError> {
    let mut lines = text.lines().skip(HELP_HEADER_LINES);
    let mut metadata = BTreeMap::new();

    for line in lines.by_ref() {
        if line.trim().is_empty() {
            break;
        }
        let (key, value) = line.split_once(": ").ok_or_else(|| {
            CatalogError::HelpFormat(format!("{}: bad metadata line '{}'", name, line))
        })?;
        metadata.insert(key.trim().to_lowercase(), Value::String(value.trim().to_string()));
    }

    let mut body = String::new();
    let mut has_options = false;
    for line in lines.by_ref() {
        if line.contains(OPTIONS_MARKER) {
            lines.next();
            has_options = true;
            break;
        }
        if line.contains(NO_OPTIONS_MARKER) {
            break;
        }
        body.push_str(line);
        body.push('\n');
    }
    metadata.insert("body".to_string(), Value::String(body));

    let mut options: BTreeMap<String, RawOptionSchema> = BTreeMap::new();
    let mut last_option: Option<String> = None;
    let mut reached_capabilities = false;
    for line in lines.by_ref() {
        if line.contains(CAPABILITIES_MARKER) {
            reached_capabilities = true;
            break;
        }
        if !has_options {
            continue;
        }
        if let Some((variant, doc)) = parse_enum_line(line) {
            if let Some(schema) = last_option.as_ref().and_then(|k| options.get_mut(k)) {
                schema
                    .variants
                    .get_or_insert_with(BTreeMap::new)
                    .insert(variant, doc);
            }
            continue;
        }
        if let Some((key, schema)) = parse_option_line(line) {
            last_option = Some(key.clone());
            options.insert(key, schema);
        }
    }

    // Help that ends before the bundle leaves the filter without capabilities.
    let capabilities = if reached_capabilities {
        parse_capabilities(&mut lines)
    } else {
        Capabilities::default()
    };

    Ok(RawFilterDescriptor {
        name: name.to_string(),
        description: description.to_string(),
        capabilities,
        sources: Vec::new(),
        sinks: Vec::new(),
        options,
        metadata,
    })
}

/// Parse `-h links <name>` into `(sources, sinks)`.
pub fn parse_links(text: &str) -> Option<(Vec<String>, Vec<String>)> {
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    let sources = parse_link_line(lines.next()?)?;
    let sinks = parse_link_line(lines.next()?)?;
    Some((sources, sinks))
}

fn parse_link_line(line: &str) -> Option<Vec<String>> {
    let (_, names) = line.split_once(": ")?;
    if names.contains("none") {
        return Some(Vec::new());
    }
    Some(names.split_whitespace().map(str::to_string).collect())
}

/// `  * variant: description`
fn parse_enum_line(line: &str) -> Option<(String, String)> {
    let rest = line.trim_start().strip_prefix("* ")?;
    let (variant, doc) = rest.split_once(": ")?;
    Some((variant.trim().to_string(), doc.trim().to_string()))
}

/// `name (type[, default: value][, ...]): description`
fn parse_option_line(line: &str) -> Option<(String, RawOptionSchema)> {
    if line.starts_with(char::is_whitespace) {
        return None;
    }
    let open = line.find(" (")?;
    let close = open + line[open..].find("):")?;
    let key = line[..open].trim();
    if key.is_empty() || key.contains(char::is_whitespace) {
        return None;
    }

    let mut fields = line[open + 2..close].split(", ");
    let type_name = fields.next()?.trim().to_string();
    let default = fields
        .find_map(|part| part.trim().strip_prefix("default: "))
        .map(|raw| cast_default(&type_name, raw.trim()));
    let description = line[close + 2..].trim().to_string();

    Some((
        key.to_string(),
        RawOptionSchema {
            type_name,
            description,
            default,
            variants: None,
        },
    ))
}

fn cast_default(type_name: &str, raw: &str) -> Value {
    match OptionKind::resolve(type_name, None) {
        Some(OptionKind::Number) => {
            if let Ok(i) = raw.parse::<i64>() {
                Value::from(i)
            } else if let Ok(f) = raw.parse::<f64>() {
                Value::from(f)
            } else {
                Value::String(raw.to_string())
            }
        }
        Some(OptionKind::Boolean) => match raw {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            other => Value::String(other.to_string()),
        },
        _ => Value::String(raw.to_string()),
    }
}

fn parse_capabilities<'a>(lines: &mut impl Iterator<Item = &'a str>) -> Capabilities {
    let mut caps = Capabilities::default();
    for line in lines {
        if line.trim().is_empty() {
            break;
        }
        let is_input = line.contains("Input");
        let is_output = line.contains("Output");

        if let Some(value) = quoted_value(line, "StreamType=\"") {
            let st: StreamType = match value.parse() {
                Ok(st) => st,
                Err(never) => match never {},
            };
            if is_input && !caps.input.stream_type.contains(&st) {
                caps.input.stream_type.push(st.clone());
            }
            if is_output && !caps.output.stream_type.contains(&st) {
                caps.output.stream_type.push(st);
            }
        } else if let Some(value) = quoted_value(line, "CodecID=\"") {
            if is_input && !caps.input.codec_id.iter().any(|c| c == value) {
                caps.input.codec_id.push(value.to_string());
            }
            if is_output && !caps.output.codec_id.iter().any(|c| c == value) {
                caps.output.codec_id.push(value.to_string());
            }
        }
    }
    caps
}

fn quoted_value<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let start = line.find(prefix)? + prefix.len();
    let len = line[start..].find('"')?;
    Some(&line[start..start + len])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const RESAMPLE_HELP: &str = "\
Filter resample
----
Register name used to load filter: resample
Version: 1.0
Author: GPAC team

This filter resamples raw audio.
It supports any sample format.

Options (expert):

sr (uint, default: 0): sample rate of output
mode (uint, default: fast): resampling mode
  * fast: linear interpolation
  * hq: windowed sinc
keep (bool, default: false): keep source rate when possible

Capabilities Bundle:
 Input StreamType=\"Audio\"
 Input CodecID=\"raw\"
 Output StreamType=\"Audio\"
 Output CodecID=\"raw\"

";

    #[test]
    fn test_parse_filter_list() {
        let text = "Supported filters:\ninspect: Inspect packets\nmp4dmx: ISOBMFF demuxer\n\n";
        let list = parse_filter_list(text);
        assert_eq!(
            list,
            vec![
                ("inspect".to_string(), "Inspect packets".to_string()),
                ("mp4dmx".to_string(), "ISOBMFF demuxer".to_string()),
            ]
        );
    }

    const CODECS_HELP: &str = "\
Codec names (I: raw input, O: raw output, D: decoder, E: encoder):

Supported codecs:

avc|h264|x264 IODE: MPEG-4 AVC|H264 Video (video/avc, video/h264)
aac DE: MPEG-4 AAC Audio (audio/aac)
raw: Raw media (none)
txt: Timed text (text/plain, txt)
not a codec line
";

    #[test]
    fn test_parse_codec_list() {
        let codecs = parse_codec_list(CODECS_HELP).unwrap();
        let names: Vec<_> = codecs.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["h264", "x264", "avc", "aac", "raw", "txt"]);

        let avc = &codecs[2];
        assert_eq!(avc.description, "MPEG-4 AVC|H264 Video");
        assert_eq!(avc.mime, "video/avc");
        assert_eq!(avc.variant_of, None);
        assert!(avc.capabilities.raw_input && avc.capabilities.encoder);

        assert_eq!(codecs[0].variant_of.as_deref(), Some("avc"));
        assert_eq!(codecs[0].capabilities, avc.capabilities);

        let aac = &codecs[3];
        assert!(aac.capabilities.decoder && !aac.capabilities.raw_input);
        assert_eq!(aac.mime, "audio/aac");

        assert_eq!(codecs[4].capabilities, CodecCapabilities::default());
        assert_eq!(codecs[4].mime, "none");
        assert_eq!(codecs[5].mime, "text/plain");
    }

    #[test]
    fn test_codec_list_requires_preamble() {
        assert!(matches!(
            parse_codec_list("aac DE: AAC (audio/aac)\n"),
            Err(CatalogError::HelpFormat(_))
        ));
    }

    #[test]
    fn test_parse_help_metadata_and_body() {
        let raw = parse_filter_help("resample", "Audio resampler", RESAMPLE_HELP).unwrap();
        assert_eq!(raw.metadata.get("version"), Some(&json!("1.0")));
        assert_eq!(raw.metadata.get("author"), Some(&json!("GPAC team")));
        assert_eq!(
            raw.metadata.get("body"),
            Some(&json!(
                "This filter resamples raw audio.\nIt supports any sample format.\n\n"
            ))
        );
    }

    #[test]
    fn test_parse_help_options_and_enums() {
        let raw = parse_filter_help("resample", "Audio resampler", RESAMPLE_HELP).unwrap();
        assert_eq!(raw.options.len(), 3);

        let sr = &raw.options["sr"];
        assert_eq!(sr.type_name, "uint");
        assert_eq!(sr.default, Some(json!(0)));

        let mode = &raw.options["mode"];
        assert_eq!(mode.default, Some(json!("fast")));
        let variants = mode.variants.as_ref().unwrap();
        assert_eq!(variants.get("hq").map(String::as_str), Some("windowed sinc"));

        assert_eq!(raw.options["keep"].default, Some(json!(false)));
    }

    #[test]
    fn test_parse_help_capabilities() {
        let raw = parse_filter_help("resample", "Audio resampler", RESAMPLE_HELP).unwrap();
        assert_eq!(raw.capabilities.input.stream_type, vec![StreamType::Audio]);
        assert_eq!(raw.capabilities.output.codec_id, vec!["raw".to_string()]);
    }

    #[test]
    fn test_help_without_options() {
        let text = "Filter x\n----\nRegister name: x\nVersion: 2\n\nBody line\nNo options\n";
        let raw = parse_filter_help("x", "X", text).unwrap();
        assert!(raw.options.is_empty());
        assert_eq!(raw.capabilities, Capabilities::default());
    }

    #[test]
    fn test_help_truncated_before_capabilities() {
        let text = "a\nb\nc\nVersion: 1\n\nBody\nOptions (expert):\n\nsz (uint): size\n";
        let raw = parse_filter_help("t", "T", text).unwrap();
        assert!(raw.options.contains_key("sz"));
        assert!(raw.capabilities.input.stream_type.is_empty());
    }

    #[test]
    fn test_parse_links() {
        let (sources, sinks) = parse_links("Sources: fin mp4dmx\nSinks: none\n").unwrap();
        assert_eq!(sources, vec!["fin".to_string(), "mp4dmx".to_string()]);
        assert!(sinks.is_empty());
        assert!(parse_links("Sources: fin\n").is_none());
    }
}
