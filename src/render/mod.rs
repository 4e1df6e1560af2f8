//! Rendering pipeline: markdown conversion, chrome assembly, image-reference
//! resolution, and CSS inlining. Stages pass one owned [`AssembledDocument`]
//! along in order; no stage retains a reference after handing it to the next.

mod chrome;
mod images;
mod inline;
mod markdown;

use std::path::PathBuf;

use crate::error::EmailError;

pub use chrome::{Branding, assemble};
pub use images::{InlineImage, embed_inline_images, rewrite_for_preview};
pub use inline::{StyleInliner, wrap_centered};
pub use markdown::markdown_to_html;

/// Output mode for a render. Preview and send share the pipeline but diverge
/// at image-reference resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Local asset references become preview-route URLs.
    Preview,
    /// Every image is read, attached inline, and referenced by content-ID.
    Send,
}

/// Parsed-and-assembled HTML document, exclusively owned by the render call
/// that created it. Mutated in place by the image resolver, consumed by the
/// inliner.
#[derive(Debug, Clone)]
pub struct AssembledDocument {
    html: String,
}

impl AssembledDocument {
    pub(crate) fn new(html: String) -> Self {
        Self { html }
    }

    pub fn html(&self) -> &str {
        &self.html
    }

    pub(crate) fn replace(&mut self, html: String) {
        self.html = html;
    }
}

/// Orchestrates the full body-to-HTML transformation for both output modes.
pub struct EmailRenderer {
    branding: Branding,
    inliner: StyleInliner,
    asset_dir: PathBuf,
    preview_prefix: String,
}

impl EmailRenderer {
    pub fn new(
        branding: Branding,
        inliner: StyleInliner,
        asset_dir: PathBuf,
        preview_prefix: impl Into<String>,
    ) -> Self {
        Self {
            branding,
            inliner,
            asset_dir,
            preview_prefix: preview_prefix.into(),
        }
    }

    /// Render a markdown body in the given mode. Preview never produces
    /// attachments.
    pub fn render(
        &self,
        body_markdown: &str,
        mode: RenderMode,
    ) -> Result<(String, Vec<InlineImage>), EmailError> {
        let mut doc = self.assemble_body(body_markdown);
        let attachments = match mode {
            RenderMode::Preview => {
                rewrite_for_preview(&mut doc, &self.asset_dir, &self.preview_prefix)?;
                Vec::new()
            }
            RenderMode::Send => embed_inline_images(&mut doc)?,
        };
        let html = self.finish(doc)?;
        Ok((html, attachments))
    }

    /// Render a markdown body for draft preview: local asset references are
    /// rewritten to the preview route and nothing is attached.
    pub fn render_preview(&self, body_markdown: &str) -> Result<String, EmailError> {
        self.render(body_markdown, RenderMode::Preview)
            .map(|(html, _)| html)
    }

    /// Render a markdown body for live delivery, returning the final HTML and
    /// the inline attachments its content-ID references point at.
    pub fn render_for_send(
        &self,
        body_markdown: &str,
    ) -> Result<(String, Vec<InlineImage>), EmailError> {
        self.render(body_markdown, RenderMode::Send)
    }

    fn assemble_body(&self, body_markdown: &str) -> AssembledDocument {
        let fragment = markdown_to_html(body_markdown);
        assemble(&self.branding, &fragment)
    }

    // Image references must be final before inlining so `style` and
    // `cid:`/preview `src` attributes coexist on the same elements.
    fn finish(&self, doc: AssembledDocument) -> Result<String, EmailError> {
        let inlined = self.inliner.inline(doc)?;
        Ok(wrap_centered(&inlined))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renderer() -> EmailRenderer {
        EmailRenderer::new(
            Branding::new("<div class=\"email-header\"></div>", "<div class=\"footer\"></div>"),
            StyleInliner::bundled(),
            PathBuf::from("templates/email"),
            "email-draft",
        )
    }

    #[test]
    fn preview_preserves_content_through_every_stage() {
        let html = renderer()
            .render_preview("# Title\n\nSome **bold** text.")
            .expect("preview render");
        assert!(html.contains("Title"));
        assert!(html.contains("bold"));
        assert!(html.contains("width=\"600\""));
    }

    #[test]
    fn preview_rewrites_markdown_image_references() {
        let html = renderer()
            .render_preview("![logo](templates/email/logo.png)")
            .expect("preview render");
        assert!(html.contains("/email-draft/image/logo.png"));
    }

    #[test]
    fn send_mode_attaches_and_references_by_cid() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let asset = tmp.path().join("photo.png");
        std::fs::write(&asset, b"pixels").expect("write");

        let body = format!("![photo]({})", asset.display());
        let (html, attachments) = renderer().render_for_send(&body).expect("send render");

        assert_eq!(attachments.len(), 1);
        assert!(html.contains(&format!("cid:{}", attachments[0].content_id)));
        assert_eq!(attachments[0].data, b"pixels");
    }
}
