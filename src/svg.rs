//! In-place update of the stats card.
//!
//! The card is an SVG authored by hand; this module only swaps the text of
//! elements tagged with known `id`s. Everything else is streamed through
//! `xml-rs` untouched, so layout, styles and comments survive a refresh.

use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use tracing::{info, warn};
use xml::common::XmlVersion;
use xml::reader::{EventReader, ParserConfig, XmlEvent};
use xml::writer::{EmitterConfig, EventWriter, XmlEvent as WriterEvent};

use crate::stats::Stats;

#[derive(Debug, thiserror::Error)]
pub enum SvgError {
    #[error("Failed to parse SVG: {0}")]
    Parse(#[from] xml::reader::Error),
    #[error("Failed to serialize SVG: {0}")]
    Write(#[from] xml::writer::Error),
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("SVG {path} is missing element ids: {}", .missing.join(", "))]
    MissingIds { path: String, missing: Vec<String> },
}

/// Which ids were rewritten and which were not found.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UpdateSummary {
    pub updated: Vec<String>,
    pub missing: Vec<String>,
}

/// Leading-text state of the element currently being rewritten.
#[derive(Clone, Copy)]
enum Slot<'a> {
    Idle,
    Open(&'a str),
    Written,
}

/// Stream `source` to `sink`, replacing the leading text of the first element
/// carrying each id in `values`.
pub fn rewrite<R, W>(source: R, sink: W, values: &[(&str, String)]) -> Result<UpdateSummary, SvgError>
where
    R: Read,
    W: Write,
{
    let mut reader = EventReader::new_with_config(
        source,
        ParserConfig::new()
            .trim_whitespace(false)
            .whitespace_to_characters(true)
            .ignore_comments(false)
            .coalesce_characters(true),
    );
    let mut writer = EventWriter::new_with_config(
        sink,
        EmitterConfig::new()
            .perform_indent(false)
            .write_document_declaration(true)
            .pad_self_closing(false)
            .autopad_comments(false),
    );

    let mut updated: Vec<String> = Vec::new();
    let mut slot = Slot::Idle;
    let mut depth = 0usize;

    loop {
        let event = reader.next()?;
        if let XmlEvent::EndDocument = event {
            break;
        }

        if let XmlEvent::Characters(_) | XmlEvent::Whitespace(_) | XmlEvent::CData(_) = event {
            match slot {
                Slot::Open(value) => {
                    writer.write(WriterEvent::characters(value))?;
                    slot = Slot::Written;
                }
                Slot::Written => {}
                Slot::Idle if depth > 0 => {
                    if let Some(out) = event.as_writer_event() {
                        writer.write(out)?;
                    }
                }
                Slot::Idle => {}
            }
            continue;
        }

        if let Slot::Open(value) = slot {
            writer.write(WriterEvent::characters(value))?;
        }
        slot = Slot::Idle;

        match &event {
            XmlEvent::StartDocument { standalone, .. } => {
                writer.write(WriterEvent::StartDocument {
                    version: XmlVersion::Version10,
                    encoding: Some("UTF-8"),
                    standalone: *standalone,
                })?;
                continue;
            }
            XmlEvent::StartElement { attributes, .. } => {
                if depth == 0 {
                    if let Some(doctype) = reader.doctype() {
                        write_doctype(writer.inner_mut(), doctype)
                            .map_err(xml::writer::Error::from)?;
                    }
                }
                depth += 1;
                let id = attributes
                    .iter()
                    .find(|a| a.name.prefix.is_none() && a.name.local_name == "id")
                    .map(|a| a.value.as_str());
                if let Some((target, value)) = id.and_then(|id| {
                    values
                        .iter()
                        .find(|(target, _)| *target == id && !updated.iter().any(|u| u == id))
                }) {
                    updated.push(target.to_string());
                    slot = Slot::Open(value.as_str());
                }
            }
            XmlEvent::EndElement { .. } => depth = depth.saturating_sub(1),
            _ => {}
        }

        if let Some(out) = event.as_writer_event() {
            writer.write(out)?;
        }
    }

    let missing = values
        .iter()
        .filter(|(id, _)| !updated.iter().any(|u| u == id))
        .map(|(id, _)| id.to_string())
        .collect();

    Ok(UpdateSummary { updated, missing })
}

/// The parser keeps the DOCTYPE aside instead of emitting it as an event, so
/// it is copied to the sink verbatim ahead of the root element.
fn write_doctype<W: Write>(sink: &mut W, doctype: &str) -> std::io::Result<()> {
    let doctype = doctype.trim();
    if doctype.starts_with("<!") {
        write!(sink, "\n{doctype}\n")
    } else {
        write!(sink, "\n<!DOCTYPE {doctype}>\n")
    }
}

/// Rewrite the card at `path` with `stats`.
///
/// The document is fully transformed in memory before the file is
/// overwritten. Missing ids are logged and skipped unless `strict`.
pub fn update_svg(path: &Path, stats: &Stats, strict: bool) -> Result<UpdateSummary, SvgError> {
    let shown = path.display().to_string();
    let io_err = |source| SvgError::Io {
        path: shown.clone(),
        source,
    };

    let original = fs::read(path).map_err(io_err)?;
    let mut out = Vec::with_capacity(original.len() + 64);
    let summary = rewrite(original.as_slice(), &mut out, &stats.fields())?;

    if !summary.missing.is_empty() {
        if strict {
            return Err(SvgError::MissingIds {
                path: shown.clone(),
                missing: summary.missing,
            });
        }
        for id in &summary.missing {
            warn!(path = %shown, id = %id, "element id not found; skipping");
        }
    }

    fs::write(path, &out).map_err(io_err)?;
    info!(path = %shown, updated = summary.updated.len(), "updated card");

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::Churn;
    use pretty_assertions::assert_eq;

    const DECL: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

    fn run(input: &str, values: &[(&str, String)]) -> (String, UpdateSummary) {
        let mut out = Vec::new();
        let summary = rewrite(input.as_bytes(), &mut out, values).unwrap();
        (String::from_utf8(out).unwrap(), summary)
    }

    fn body(doc: &str) -> &str {
        let doc = doc.trim_start();
        let doc = match doc.strip_prefix("<?xml") {
            Some(rest) => &rest[rest.find("?>").map(|i| i + 2).unwrap_or(0)..],
            None => doc,
        };
        doc.trim()
    }

    const CARD: &str = r##"<?xml version='1.0' encoding='UTF-8'?>
<svg xmlns="http://www.w3.org/2000/svg" width="985px" height="530px">
<style>.value { fill: #a5d6ff; }</style>
<!-- stats -->
<text x="390" y="490" fill="#c9d1d9">
<tspan class="key">Repos</tspan>: <tspan class="value" id="repo_data">0</tspan>
<tspan class="key">Commits</tspan>: <tspan class="value" id="commit_data">0</tspan>
<tspan class="key">Lines of Code</tspan>: <tspan class="value" id="loc_data">0</tspan> ( <tspan class="addColor" id="loc_add">0</tspan>++, <tspan class="delColor" id="loc_del">0</tspan>-- )
</text>
</svg>
"##;

    #[test]
    fn replaces_only_tagged_text() {
        let stats = Stats {
            repos: 2,
            commits: 1600,
            churn: Churn {
                added: 12345,
                deleted: 120,
            },
        };
        let (out, summary) = run(CARD, &stats.fields());

        assert!(out.starts_with(DECL));
        assert_eq!(summary.missing, Vec::<String>::new());
        assert_eq!(summary.updated.len(), 5);

        let expected = body(CARD)
            .replace(r#"id="repo_data">0<"#, r#"id="repo_data">2<"#)
            .replace(r#"id="commit_data">0<"#, r#"id="commit_data">1,600<"#)
            .replace(r#"id="loc_data">0<"#, r#"id="loc_data">12,225<"#)
            .replace(r#"id="loc_add">0<"#, r#"id="loc_add">12,345<"#)
            .replace(r#"id="loc_del">0<"#, r#"id="loc_del">120<"#);
        assert_eq!(body(&out), expected);
    }

    #[test]
    fn untouched_document_round_trips() {
        let input = r#"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" width="10">
  <g class="row">
    <text x="1" y="2">hello</text>
    <rect width="5" height="5"/>
  </g>
  <!-- footer -->
</svg>"#;
        let (out, summary) = run(input, &Stats::default().fields());

        assert_eq!(summary.updated, Vec::<String>::new());
        assert_eq!(summary.missing.len(), 5);
        assert_eq!(body(&out), body(input));
    }

    #[test]
    fn doctype_survives_rewrite() {
        let doctype = r#"<!DOCTYPE svg PUBLIC "-//W3C//DTD SVG 1.1//EN" "http://www.w3.org/Graphics/SVG/1.1/DTD/svg11.dtd">"#;
        let input = format!(
            "<?xml version=\"1.0\"?>\n{doctype}\n<svg xmlns=\"http://www.w3.org/2000/svg\"><text id=\"repo_data\">0</text></svg>"
        );
        let (out, summary) = run(&input, &[("repo_data", "5".to_string())]);

        assert_eq!(summary.updated, vec!["repo_data"]);
        assert!(out.starts_with(DECL));
        let at_doctype = out.find(doctype).expect("doctype kept");
        let at_root = out.find("<svg").unwrap();
        assert!(at_doctype < at_root);
        assert_eq!(out.matches("<!DOCTYPE").count(), 1);
        assert_eq!(
            out[at_root..].trim(),
            r#"<svg xmlns="http://www.w3.org/2000/svg"><text id="repo_data">5</text></svg>"#
        );
    }

    #[test]
    fn matches_any_depth_and_element_type() {
        let input = r#"<svg xmlns="http://www.w3.org/2000/svg"><g><g><text><tspan id="repo_data">x</tspan></text></g></g><rect id="loc_add"/></svg>"#;
        let values = [("repo_data", "7".to_string()), ("loc_add", "9".to_string())];
        let (out, summary) = run(input, &values);

        assert_eq!(summary.updated, vec!["repo_data", "loc_add"]);
        assert!(out.contains(r#"<tspan id="repo_data">7</tspan>"#));
        assert!(out.contains(r#"<rect id="loc_add">9</rect>"#));
    }

    #[test]
    fn keeps_child_elements_after_leading_text() {
        let input = r#"<svg xmlns="http://www.w3.org/2000/svg"><text id="loc_data">old<tspan>unit</tspan> tail</text></svg>"#;
        let (out, _) = run(input, &[("loc_data", "-65".to_string())]);

        assert_eq!(
            body(&out),
            r#"<svg xmlns="http://www.w3.org/2000/svg"><text id="loc_data">-65<tspan>unit</tspan> tail</text></svg>"#
        );
    }

    #[test]
    fn inserts_text_when_element_starts_with_child() {
        let input = r#"<svg xmlns="http://www.w3.org/2000/svg"><text id="loc_del"><tspan>a</tspan></text></svg>"#;
        let (out, _) = run(input, &[("loc_del", "120".to_string())]);

        assert!(out.contains(r#"<text id="loc_del">120<tspan>a</tspan></text>"#));
    }

    #[test]
    fn only_first_duplicate_is_updated() {
        let input = r#"<svg xmlns="http://www.w3.org/2000/svg"><text id="repo_data">a</text><text id="repo_data">b</text></svg>"#;
        let (out, summary) = run(input, &[("repo_data", "3".to_string())]);

        assert_eq!(summary.updated, vec!["repo_data"]);
        assert!(out.contains(r#"<text id="repo_data">3</text><text id="repo_data">b</text>"#));
    }

    #[test]
    fn malformed_document_is_rejected() {
        let mut out = Vec::new();
        let err = rewrite(
            "<svg><text id=\"repo_data\">1</svg>".as_bytes(),
            &mut out,
            &[("repo_data", "2".to_string())],
        )
        .unwrap_err();
        assert!(matches!(err, SvgError::Parse(_)));
    }

    #[test]
    fn update_svg_writes_file_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("darkmode.svg");
        fs::write(&path, CARD).unwrap();

        let stats = Stats {
            repos: 2,
            commits: 160,
            churn: Churn {
                added: 55,
                deleted: 120,
            },
        };
        let summary = update_svg(&path, &stats, false).unwrap();
        assert!(summary.missing.is_empty());

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.starts_with(DECL));
        assert!(written.contains(r#"id="repo_data">2<"#));
        assert!(written.contains(r#"id="commit_data">160<"#));
        assert!(written.contains(r#"id="loc_data">-65<"#));
        assert!(written.contains(r#"id="loc_add">55<"#));
        assert!(written.contains(r#"id="loc_del">120<"#));
    }

    #[test]
    fn lenient_update_skips_missing_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("card.svg");
        fs::write(
            &path,
            r#"<svg xmlns="http://www.w3.org/2000/svg"><text id="repo_data">0</text></svg>"#,
        )
        .unwrap();

        let stats = Stats {
            repos: 4,
            ..Stats::default()
        };
        let summary = update_svg(&path, &stats, false).unwrap();

        assert_eq!(summary.updated, vec!["repo_data"]);
        assert_eq!(summary.missing.len(), 4);
        assert!(fs::read_to_string(&path).unwrap().contains(">4</text>"));
    }

    #[test]
    fn strict_update_leaves_file_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("card.svg");
        let original = r#"<svg xmlns="http://www.w3.org/2000/svg"><text id="repo_data">0</text></svg>"#;
        fs::write(&path, original).unwrap();

        let err = update_svg(&path, &Stats::default(), true).unwrap_err();
        assert!(matches!(err, SvgError::MissingIds { .. }));
        assert_eq!(fs::read_to_string(&path).unwrap(), original);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = update_svg(&dir.path().join("nope.svg"), &Stats::default(), false).unwrap_err();
        assert!(matches!(err, SvgError::Io { .. }));
    }
}
