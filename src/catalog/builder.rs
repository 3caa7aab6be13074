//! Catalog generation from the engine's own help output.
//!
//! For every filter listed by `-h filters`, runs `-hh <name>` for the
//! metadata, options and capability bundle, then `-h links <name>` for the
//! sources and sinks it can connect to. Filters whose help cannot be read
//! or whose option types are unknown are skipped with a warning.
//!
//! The codec catalog comes from a single `-h codecs` run.

use super::descriptor::FilterDescriptor;
use super::codec::CodecCatalog;
use super::help::{parse_codec_list, parse_filter_help, parse_filter_list, parse_links};
use super::FilterCatalog;
use crate::bridge::{ExecutionOutput, ExecutionRequest, ExecutionSession};
use crate::error::{BridgeError, CatalogError, Result, ResultExt};

/// Printed and error-stream text of one help invocation
struct HelpText {
    stdout: String,
    stderr: String,
}

pub struct CatalogBuilder<'s> {
    session: &'s ExecutionSession,
}

impl<'s> CatalogBuilder<'s> {
    pub fn new(session: &'s ExecutionSession) -> Self {
        Self { session }
    }

    pub fn build(&self) -> Result<FilterCatalog> {
        let listing = self.help(&["-h", "filters"]).context("Failed to list filters")?;
        let filters = parse_filter_list(&listing.stdout);
        if filters.is_empty() {
            return Err(CatalogError::HelpFormat("filter list is empty".into()).into());
        }
        tracing::info!("Building catalog for {} filters", filters.len());

        let mut descriptors = Vec::with_capacity(filters.len());
        let mut skipped = 0usize;
        for (name, description) in &filters {
            match self.describe(name, description) {
                Ok(desc) => descriptors.push(desc),
                Err(e) => {
                    tracing::warn!("Skipping filter '{}': {}", name, e);
                    skipped += 1;
                }
            }
        }

        let catalog = FilterCatalog::from_descriptors(descriptors)?;
        tracing::info!(
            "Catalog built with {} filters ({} skipped)",
            catalog.len(),
            skipped
        );
        Ok(catalog)
    }

    pub fn build_codecs(&self) -> Result<CodecCatalog> {
        let listing = self.help(&["-h", "codecs"]).context("Failed to list codecs")?;
        let codecs = parse_codec_list(&listing.stdout)?;
        if codecs.is_empty() {
            return Err(CatalogError::HelpFormat("codec list is empty".into()).into());
        }
        let catalog = CodecCatalog::from_descriptors(codecs);
        tracing::info!("Codec catalog built with {} entries", catalog.len());
        Ok(catalog)
    }

    fn describe(&self, name: &str, description: &str) -> Result<FilterDescriptor> {
        let help = self.help(&["-hh", name])?;
        let mut raw = parse_filter_help(name, description, &help.stdout)?;

        let links = self.help(&["-h", "links", name])?;
        match parse_links(&links.stderr).or_else(|| parse_links(&links.stdout)) {
            Some((sources, sinks)) => {
                raw.sources = sources;
                raw.sinks = sinks;
            }
            None => tracing::debug!("No link information for '{}'", name),
        }

        Ok(FilterDescriptor::resolve(raw)?)
    }

    fn help(&self, args: &[&str]) -> std::result::Result<HelpText, BridgeError> {
        match self.session.execute(ExecutionRequest::raw(args.iter().copied()))? {
            ExecutionOutput::Log {
                diagnostics,
                transcript,
                ..
            } => Ok(HelpText {
                stdout: strip_ansi(&transcript),
                stderr: strip_ansi(&diagnostics.join("\n")),
            }),
            _ => Ok(HelpText {
                stdout: String::new(),
                stderr: String::new(),
            }),
        }
    }
}

/// Remove terminal color sequences (`ESC [ ... m`)
fn strip_ansi(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\u{1b}' && chars.peek() == Some(&'[') {
            for c in chars.by_ref() {
                if c == 'm' {
                    break;
                }
            }
            continue;
        }
        out.push(c);
    }
    out
}
