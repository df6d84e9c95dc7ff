//! SVG minification.
//!
//! SVG images are minified in place before their hashes are reconciled,
//! so the published name covers the minified bytes. The pass drops what a
//! browser never renders:
//!
//! - the XML declaration, processing instructions, doctype and comments
//! - `<metadata>`, `<title>` and `<desc>` elements
//! - Inkscape/Sodipodi editor elements and attributes
//! - whitespace-only text between elements
//! - `width`/`height` on the root `<svg>` when it has a `viewBox`
//!
//! The output is a fixed point: minifying it again changes nothing, so a
//! second build leaves the file (and its hash) alone.

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::QName;
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SvgError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("Minified SVG is not UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

const EDITOR_PREFIXES: [&[u8]; 2] = [b"inkscape:", b"sodipodi:"];

fn is_editor_name(name: &[u8]) -> bool {
    EDITOR_PREFIXES.iter().any(|p| name.starts_with(p))
        || name == b"xmlns:inkscape"
        || name == b"xmlns:sodipodi"
}

fn is_dropped_element(name: &[u8]) -> bool {
    matches!(name, b"metadata" | b"title" | b"desc") || is_editor_name(name)
}

/// Copy of `start` without editor attributes, and without the root
/// dimensions when a `viewBox` carries the aspect ratio.
fn strip_attributes(start: &BytesStart, root: bool) -> Result<BytesStart<'static>, SvgError> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let attributes = start
        .attributes()
        .collect::<Result<Vec<_>, _>>()
        .map_err(quick_xml::Error::from)?;
    let has_view_box = attributes.iter().any(|a| a.key.as_ref() == b"viewBox");
    let drop_dimensions = root && name == "svg" && has_view_box;

    let mut out = BytesStart::new(name);
    for attribute in attributes {
        let key = attribute.key.as_ref();
        if is_editor_name(key) || (drop_dimensions && matches!(key, b"width" | b"height")) {
            continue;
        }
        out.push_attribute(attribute);
    }
    Ok(out.into_owned())
}

/// Minify an SVG document. Input that does not look like markup is
/// returned unchanged.
pub fn minify(data: &str) -> Result<String, SvgError> {
    if !data.trim_start().starts_with('<') {
        return Ok(data.to_string());
    }

    let mut reader = Reader::from_str(data);
    reader.config_mut().trim_text(true);
    let mut writer = Writer::new(Vec::with_capacity(data.len()));
    let mut depth = 0usize;

    loop {
        match reader.read_event()? {
            Event::Eof => break,
            Event::Decl(_) | Event::PI(_) | Event::DocType(_) | Event::Comment(_) => {}
            Event::Start(start) if is_dropped_element(start.name().as_ref()) => {
                let name = start.name().as_ref().to_vec();
                reader.read_to_end(QName(&name))?;
            }
            Event::Empty(start) if is_dropped_element(start.name().as_ref()) => {}
            Event::Start(start) => {
                writer.write_event(Event::Start(strip_attributes(&start, depth == 0)?))?;
                depth += 1;
            }
            Event::Empty(start) => {
                writer.write_event(Event::Empty(strip_attributes(&start, depth == 0)?))?;
            }
            Event::End(end) => {
                depth = depth.saturating_sub(1);
                writer.write_event(Event::End(end))?;
            }
            event => writer.write_event(event)?,
        }
    }

    Ok(String::from_utf8(writer.into_inner())?)
}

/// Minify one file in place. Returns whether it was rewritten.
pub fn minify_file(path: &Path) -> Result<bool, SvgError> {
    let content = fs::read_to_string(path)?;
    let minified = minify(&content)?;
    if minified == content {
        return Ok(false);
    }
    fs::write(path, minified)?;
    Ok(true)
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MinifyReport {
    pub minified: usize,
    pub unchanged: usize,
    pub failed: usize,
}

fn is_svg(path: &Path) -> bool {
    path.extension().is_some_and(|e| e.eq_ignore_ascii_case("svg"))
}

/// Minify every `.svg` among `files`; other files are ignored.
///
/// Failures are logged and counted; a file that cannot be minified is
/// published as it is.
pub fn minify_all<'a, I>(files: I) -> MinifyReport
where
    I: IntoIterator<Item = &'a PathBuf>,
{
    let svgs: Vec<&PathBuf> = files.into_iter().filter(|f| is_svg(f)).collect();
    let outcomes: Vec<Result<bool, SvgError>> = svgs
        .par_iter()
        .map(|path| {
            minify_file(path).inspect_err(|e| {
                tracing::warn!(file = %path.display(), error = %e, "svg minification failed");
            })
        })
        .collect();

    let mut report = MinifyReport::default();
    for outcome in outcomes {
        match outcome {
            Ok(true) => report.minified += 1,
            Ok(false) => report.unchanged += 1,
            Err(_) => report.failed += 1,
        }
    }
    tracing::debug!(
        minified = report.minified,
        unchanged = report.unchanged,
        failed = report.failed,
        "svgs minified"
    );
    report
}
