//! Transactional email rendering and dispatch.
//!
//! Given a markdown body or a named template plus a recipient context,
//! missive produces a brand-consistent HTML email (header/footer chrome,
//! CSS inlined onto elements, images attached inline by content-ID) with a
//! plaintext counterpart, filters recipients against a suppression registry,
//! and dispatches the composed multipart message through an outbound
//! transport. A draft-preview mode shares the pipeline but rewrites image
//! references to a preview URL scheme instead of attaching files.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod render;
pub mod suppression;
pub mod telemetry;
pub mod template;

pub use dispatch::{EmailRequest, ExtraAttachment, Mailer, SendOutcome, SenderDefaults};
pub use error::EmailError;
pub use render::{
    AssembledDocument, Branding, EmailRenderer, InlineImage, RenderMode, StyleInliner,
};
pub use suppression::{InMemorySuppressionList, SuppressionList, filter_recipients};
pub use template::{Context, TemplateStore};
