use std::{cell::RefCell, fs, path::Path, rc::Rc};

use lol_html::{RewriteStrSettings, element, errors::RewritingError, rewrite_str};
use uuid::Uuid;

use crate::error::EmailError;

use super::AssembledDocument;

/// Inline image part created in send mode. Owned by the outgoing message
/// until dispatch; referenced from the HTML body via `cid:{content_id}`.
#[derive(Debug, Clone)]
pub struct InlineImage {
    pub content_id: String,
    pub data: Vec<u8>,
    pub mime_type: String,
}

/// Rewrite local image references into the preview URL scheme. Only `src`
/// values under `asset_dir` are touched; external URLs pass through. The
/// rewritten path strips directory structure, so the preview route handler
/// serves every image by basename.
pub fn rewrite_for_preview(
    doc: &mut AssembledDocument,
    asset_dir: &Path,
    preview_prefix: &str,
) -> Result<(), EmailError> {
    let prefix = asset_dir.to_string_lossy().into_owned();
    let rewritten = rewrite_str(
        doc.html(),
        RewriteStrSettings {
            element_content_handlers: vec![element!("img", |el| {
                if let Some(src) = el.get_attribute("src") {
                    if src.starts_with(prefix.as_str()) {
                        let basename = basename_of(&src);
                        el.set_attribute("src", &format!("/{preview_prefix}/image/{basename}"))?;
                    }
                }
                Ok(())
            })],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(map_rewriting_error)?;

    doc.replace(rewritten);
    Ok(())
}

/// Extract every referenced image file and rewrite its `src` to a freshly
/// generated content-ID. Each image element is visited exactly once; a
/// missing or unreadable file aborts the whole send so no message goes out
/// with a broken inline asset.
pub fn embed_inline_images(doc: &mut AssembledDocument) -> Result<Vec<InlineImage>, EmailError> {
    let attachments: Rc<RefCell<Vec<InlineImage>>> = Rc::new(RefCell::new(Vec::new()));

    let rewritten = rewrite_str(
        doc.html(),
        RewriteStrSettings {
            element_content_handlers: vec![element!("img", {
                let attachments = Rc::clone(&attachments);
                move |el| {
                    let Some(src) = el.get_attribute("src") else {
                        return Ok(());
                    };
                    let data = fs::read(&src).map_err(|source| EmailError::AssetNotFound {
                        path: src.clone(),
                        source,
                    })?;
                    let content_id = Uuid::new_v4().simple().to_string();
                    let mime_type = mime_guess::from_path(&src)
                        .first_or_octet_stream()
                        .essence_str()
                        .to_string();
                    el.set_attribute("src", &format!("cid:{content_id}"))?;
                    attachments.borrow_mut().push(InlineImage {
                        content_id,
                        data,
                        mime_type,
                    });
                    Ok(())
                }
            })],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(map_rewriting_error)?;

    doc.replace(rewritten);
    let collected = std::mem::take(&mut *attachments.borrow_mut());
    Ok(collected)
}

fn basename_of(src: &str) -> &str {
    src.rsplit(['/', '\\']).next().unwrap_or(src)
}

fn map_rewriting_error(err: RewritingError) -> EmailError {
    match err {
        RewritingError::ContentHandlerError(inner) => match inner.downcast::<EmailError>() {
            Ok(email_err) => *email_err,
            Err(other) => EmailError::markup(other.to_string()),
        },
        other => EmailError::markup(other.to_string()),
    }
}
