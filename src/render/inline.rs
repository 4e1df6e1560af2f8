use std::{borrow::Cow, fs, path::Path};

use css_inline::{CSSInliner, InlineError};

use crate::error::EmailError;

use super::AssembledDocument;

static BUNDLED_STYLESHEET: &str = include_str!("../../assets/email.css");

/// Inlines the fixed stylesheet onto every matching element so the output no
/// longer relies on `<style>` blocks, which many mail clients strip. The
/// stylesheet is loaded once and held read-only for the process lifetime.
#[derive(Debug, Clone)]
pub struct StyleInliner {
    stylesheet: Cow<'static, str>,
}

impl StyleInliner {
    /// Use the stylesheet bundled with the crate.
    pub fn bundled() -> Self {
        Self {
            stylesheet: Cow::Borrowed(BUNDLED_STYLESHEET),
        }
    }

    /// Read a deployment-specific stylesheet from disk.
    pub fn from_path(path: &Path) -> Result<Self, EmailError> {
        let stylesheet = fs::read_to_string(path)?;
        Ok(Self {
            stylesheet: Cow::Owned(stylesheet),
        })
    }

    /// Flatten matching rules onto per-element `style` attributes, resolving
    /// conflicts by standard cascade order (specificity, then source order).
    /// Consumes the document: inlining is the last mutation stage, and image
    /// references must already be final when it runs.
    pub fn inline(&self, doc: AssembledDocument) -> Result<String, EmailError> {
        let inliner = CSSInliner::options()
            .inline_style_tags(true)
            .load_remote_stylesheets(false)
            .extra_css(Some(Cow::Borrowed(self.stylesheet.as_ref())))
            .build();

        let inlined = inliner.inline(doc.html()).map_err(|err| match err {
            InlineError::ParseError(message) => EmailError::stylesheet(message.to_string()),
            other => EmailError::markup(other.to_string()),
        })?;

        Ok(strip_document_wrapper(inlined))
    }
}

/// The inliner serializes a complete document. The pipeline works on
/// fragments, so peel the `<html><head></head><body>` shell back off before
/// the centering wrap.
fn strip_document_wrapper(html: String) -> String {
    let Some(start) = html.find("<body>") else {
        return html;
    };
    let Some(end) = html.rfind("</body>") else {
        return html;
    };
    let start = start + "<body>".len();
    if start > end {
        return html;
    }
    html[start..end].to_string()
}

/// Wrap inlined HTML in a fixed-width centering table. Mail clients with no
/// modern CSS layout support still render this consistently at 600px.
pub fn wrap_centered(inlined_html: &str) -> String {
    format!(
        "<table border=\"0\" cellspacing=\"0\" width=\"100%\"><tr><td></td><td width=\"600\">{inlined_html}</td><td></td></tr></table>"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(html: &str) -> AssembledDocument {
        AssembledDocument::new(html.to_string())
    }

    #[test]
    fn matching_rules_land_on_style_attributes() {
        let inliner = StyleInliner {
            stylesheet: Cow::Borrowed(".content { color: red; }"),
        };
        let html = inliner
            .inline(doc("<div class=\"content\">hi</div>"))
            .expect("inline");
        assert!(html.contains("style=\"color: red"));
    }

    #[test]
    fn inlining_is_idempotent() {
        let inliner = StyleInliner {
            stylesheet: Cow::Borrowed(".content { color: red; } p { margin: 0; }"),
        };
        let once = inliner
            .inline(doc("<div class=\"content\"><p>hi</p></div>"))
            .expect("first pass");
        let twice = inliner.inline(doc(&once)).expect("second pass");
        assert_eq!(once, twice);
    }

    #[test]
    fn existing_inline_styles_win_over_stylesheet() {
        let inliner = StyleInliner {
            stylesheet: Cow::Borrowed("p { color: red; }"),
        };
        let html = inliner
            .inline(doc("<p style=\"color: blue\">hi</p>"))
            .expect("inline");
        assert!(html.contains("color: blue"));
    }

    #[test]
    fn wrap_produces_fixed_width_centering_table() {
        let wrapped = wrap_centered("<p>body</p>");
        assert!(wrapped.starts_with("<table border=\"0\" cellspacing=\"0\" width=\"100%\">"));
        assert!(wrapped.contains("<td width=\"600\"><p>body</p></td>"));
        assert!(wrapped.ends_with("</table>"));
    }

    #[test]
    fn bundled_stylesheet_styles_the_chrome() {
        let inliner = StyleInliner::bundled();
        let html = inliner
            .inline(doc("<div class=\"email-header\">x</div>"))
            .expect("inline");
        assert!(html.contains("style="));
    }
}
