// src/exec/sprite.rs

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};

use super::{Artifact, Collaborator, OpContext, OpFuture, OpScope};

/// Merges SVG icons into one hidden sprite of `<symbol>`s, one per icon,
/// with the icon's file stem as the symbol id.
#[derive(Debug, Clone)]
pub struct SvgSprite {
    file_name: String,
}

impl SvgSprite {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
        }
    }
}

fn view_box(root: &BytesStart<'_>) -> Result<Option<String>> {
    for attr in root.attributes() {
        let attr = attr?;
        if attr.key.local_name().as_ref() == b"viewBox" {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

fn ensure_svg_root(root: &BytesStart<'_>, artifact: &Artifact) -> Result<()> {
    if root.local_name().as_ref() != b"svg" {
        bail!("{} is not an SVG document", artifact.path.display());
    }
    Ok(())
}

/// One `<symbol>` holding the children of the icon's root `<svg>`, with the
/// root's `viewBox` carried over.
fn symbol_for(artifact: &Artifact) -> Result<String> {
    let text = String::from_utf8_lossy(&artifact.contents);
    let mut reader = Reader::from_str(&text);
    reader.config_mut().trim_text_start = false;
    reader.config_mut().trim_text_end = false;

    let mut inner = Writer::new(Vec::new());
    let mut root_view_box: Option<Option<String>> = None;
    let mut depth = 0usize;

    loop {
        let event = reader
            .read_event()
            .with_context(|| format!("parsing {}", artifact.path.display()))?;

        match event {
            Event::Start(e) if depth == 0 => {
                if root_view_box.is_some() {
                    bail!("{} has more than one root element", artifact.path.display());
                }
                ensure_svg_root(&e, artifact)?;
                root_view_box = Some(view_box(&e)?);
                depth = 1;
            }
            Event::Empty(e) if depth == 0 => {
                if root_view_box.is_some() {
                    bail!("{} has more than one root element", artifact.path.display());
                }
                ensure_svg_root(&e, artifact)?;
                root_view_box = Some(view_box(&e)?);
            }
            Event::End(_) if depth == 1 => {
                depth = 0;
            }
            Event::Text(t) if depth == 0 => {
                if !t.iter().all(u8::is_ascii_whitespace) {
                    bail!("{} is not an SVG document", artifact.path.display());
                }
            }
            Event::Eof => break,
            // Prolog, doctype and comments outside the root are dropped.
            _ if depth == 0 => {}
            Event::Start(e) => {
                depth += 1;
                inner.write_event(Event::Start(e))?;
            }
            Event::End(e) => {
                depth -= 1;
                inner.write_event(Event::End(e))?;
            }
            other => inner.write_event(other)?,
        }
    }

    let Some(view_box) = root_view_box else {
        bail!("{} is not an SVG document", artifact.path.display());
    };
    if depth != 0 {
        bail!("{} ends inside an element", artifact.path.display());
    }

    let id = artifact
        .path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let view_box = view_box
        .map(|vb| format!(r#" viewBox="{}""#, escape(vb.as_str())))
        .unwrap_or_default();
    let body = String::from_utf8(inner.into_inner())
        .with_context(|| format!("re-encoding {}", artifact.path.display()))?;

    Ok(format!(
        r#"<symbol id="{}"{view_box}>{}</symbol>"#,
        escape(id.as_str()),
        body.trim()
    ))
}

impl Collaborator for SvgSprite {
    fn name(&self) -> &str {
        "sprite"
    }

    fn scope(&self) -> OpScope {
        OpScope::PerSet
    }

    fn output_path(&self, _path: &Path) -> PathBuf {
        PathBuf::from(&self.file_name)
    }

    fn apply<'a>(&'a self, mut artifacts: Vec<Artifact>, _ctx: &'a OpContext) -> OpFuture<'a> {
        Box::pin(async move {
            if artifacts.is_empty() {
                return Ok(Vec::new());
            }
            artifacts.sort_by(|a, b| a.path.cmp(&b.path));

            let mut sprite = String::from(
                r#"<svg xmlns="http://www.w3.org/2000/svg" style="display:none">"#,
            );
            for artifact in &artifacts {
                sprite.push_str(&symbol_for(artifact)?);
            }
            sprite.push_str("</svg>");

            Ok(vec![Artifact::new(PathBuf::from(&self.file_name), sprite)])
        })
    }
}
