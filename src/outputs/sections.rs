//! Section-based renderer.
//!
//! Each section becomes an `emoji <b>title</b>` header followed by its entry
//! lines and a blank line. The budget is enforced on whole lines, so no tag
//! is ever cut. Once an entry does not fit, rendering stops and `...` marks
//! the cut. A header is never left without at least one of its entries.

use super::markup::{ELLIPSIS, escape_html};
use super::{Envelope, RenderOptions, assemble};
use crate::models::Section;
use tracing::debug;

/// Render `sections` plus the envelope into one message.
pub fn render_sections(
    sections: &[Section],
    envelope: &Envelope<'_>,
    options: &RenderOptions,
) -> String {
    let body = render_body(sections, options.body_budget);
    assemble(envelope, &body, options)
}

fn section_header(section: &Section) -> String {
    let title = format!("<b>{}</b>", escape_html(section.title.trim()));
    let emoji = section.emoji.trim();
    if emoji.is_empty() {
        title
    } else {
        format!("{} {title}", escape_html(emoji))
    }
}

fn render_body(sections: &[Section], budget: usize) -> String {
    let mut body = String::new();
    let mut used = 0usize;
    let mut truncated = false;

    'sections: for section in sections {
        let header = section_header(section);
        let header_len = header.chars().count() + 1;
        let mut block = vec![header];
        let mut block_len = header_len;

        for entry in &section.entries {
            let line = escape_html(entry);
            let line_len = line.chars().count() + 1;
            if used + block_len + line_len > budget {
                truncated = true;
                if block.len() > 1 {
                    flush(&mut body, &block);
                }
                break 'sections;
            }
            block.push(line);
            block_len += line_len;
        }

        if section.entries.is_empty() && used + block_len > budget {
            truncated = true;
            break;
        }

        flush(&mut body, &block);
        // Blank line between sections.
        used += block_len + 1;
    }

    let mut body = body.trim_end().to_string();
    if truncated {
        debug!(budget, "Section body truncated");
        if !body.is_empty() {
            body.push('\n');
        }
        body.push_str(ELLIPSIS);
    }
    body
}

fn flush(body: &mut String, block: &[String]) {
    for line in block {
        body.push_str(line);
        body.push('\n');
    }
    body.push('\n');
}
