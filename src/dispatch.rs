//! Message composition and dispatch: builds the multipart/related message
//! (plaintext base, HTML alternative, inline images keyed by content-ID,
//! extra attachments verbatim) and hands it to the transport. One outbound
//! send per invocation; no batching, no retry.

use std::sync::Arc;

use lettre::{
    Message, Transport,
    message::{Attachment, Mailbox, MultiPart, header::ContentType},
};
use tracing::{debug, info};

use crate::{
    error::EmailError,
    render::{EmailRenderer, InlineImage},
    suppression::{SuppressionList, filter_recipients},
    template::{Context, TemplateStore},
};

/// Non-template attachment added to the outgoing message as-is.
#[derive(Debug, Clone)]
pub struct ExtraAttachment {
    pub filename: String,
    pub data: Vec<u8>,
    pub mime_type: String,
}

/// Everything needed to render and dispatch one message. Constructed fresh
/// per call; recipients are finalized by the suppression filter and only
/// ever shrink afterwards.
#[derive(Debug, Clone)]
pub struct EmailRequest {
    pub template_name: String,
    pub to: Vec<String>,
    pub context: Context,
    pub from: Option<String>,
    pub reply_to: Vec<String>,
    pub subject: Option<String>,
    pub subject_template: Option<String>,
    pub body: Option<String>,
    pub attachments: Vec<ExtraAttachment>,
}

impl EmailRequest {
    pub fn new(template_name: impl Into<String>, to: Vec<String>) -> Self {
        Self {
            template_name: template_name.into(),
            to,
            context: Context::new(),
            from: None,
            reply_to: Vec::new(),
            subject: None,
            subject_template: None,
            body: None,
            attachments: Vec::new(),
        }
    }

    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    pub fn with_reply_to(mut self, reply_to: Vec<String>) -> Self {
        self.reply_to = reply_to;
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_subject_template(mut self, path: impl Into<String>) -> Self {
        self.subject_template = Some(path.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_attachments(mut self, attachments: Vec<ExtraAttachment>) -> Self {
        self.attachments = attachments;
        self
    }
}

/// Result of a send attempt that did not fail. An all-suppressed recipient
/// list is a defined no-op, distinct from an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Sent { recipients: Vec<String> },
    AllSuppressed,
}

/// Sender defaults applied when a request leaves them unset.
#[derive(Debug, Clone, Default)]
pub struct SenderDefaults {
    pub from: Option<String>,
    pub subject_prefix: Option<String>,
}

/// Renders and dispatches messages through a synchronous transport.
pub struct Mailer<T> {
    transport: T,
    templates: TemplateStore,
    renderer: EmailRenderer,
    suppression: Arc<dyn SuppressionList>,
    defaults: SenderDefaults,
}

impl<T> Mailer<T>
where
    T: Transport,
    T::Error: std::error::Error + Send + Sync + 'static,
{
    pub fn new(
        transport: T,
        templates: TemplateStore,
        renderer: EmailRenderer,
        suppression: Arc<dyn SuppressionList>,
        defaults: SenderDefaults,
    ) -> Self {
        Self {
            transport,
            templates,
            renderer,
            suppression,
            defaults,
        }
    }

    /// Render a markdown body through the preview pipeline without touching
    /// the transport.
    pub fn render_preview(&self, body_markdown: &str) -> Result<String, EmailError> {
        self.renderer.render_preview(body_markdown)
    }

    /// Filter recipients, resolve subject and body, render the HTML
    /// alternative with inline images, compose the multipart message, and
    /// perform exactly one transport send. Fatal errors abort before
    /// dispatch; no partial message ever goes out.
    pub fn send_message(&self, request: &EmailRequest) -> Result<SendOutcome, EmailError> {
        let recipients = filter_recipients(&request.to, self.suppression.as_ref());
        if recipients.is_empty() {
            debug!(
                target = "missive::dispatch",
                template = %request.template_name,
                "every candidate recipient is suppressed; skipping send"
            );
            return Ok(SendOutcome::AllSuppressed);
        }

        let subject = self.templates.resolve_subject(
            &request.template_name,
            request.subject_template.as_deref(),
            request.subject.as_deref(),
            self.defaults.subject_prefix.as_deref(),
            &request.context,
        )?;
        let body_text = self.templates.resolve_body(
            &request.template_name,
            request.body.as_deref(),
            &request.context,
        )?;

        let (html, inline_images) = self.renderer.render_for_send(&body_text)?;

        let from = request
            .from
            .as_deref()
            .or(self.defaults.from.as_deref())
            .ok_or_else(|| EmailError::configuration("no sender address configured"))?;

        let message = compose_message(
            &subject,
            &body_text,
            &html,
            from,
            &recipients,
            &request.reply_to,
            &inline_images,
            &request.attachments,
        )?;

        self.transport
            .send(&message)
            .map_err(|err| EmailError::Transport(Box::new(err)))?;

        info!(
            target = "missive::dispatch",
            template = %request.template_name,
            recipients = recipients.len(),
            inline_images = inline_images.len(),
            "message dispatched"
        );

        Ok(SendOutcome::Sent { recipients })
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, EmailError> {
    address.parse().map_err(|_| EmailError::Address {
        address: address.to_string(),
    })
}

fn parse_content_type(mime_type: &str) -> Result<ContentType, EmailError> {
    ContentType::parse(mime_type)
        .map_err(|err| EmailError::markup(format!("invalid MIME type `{mime_type}`: {err}")))
}

#[allow(clippy::too_many_arguments)]
fn compose_message(
    subject: &str,
    plaintext_body: &str,
    html_body: &str,
    from: &str,
    to: &[String],
    reply_to: &[String],
    inline_images: &[InlineImage],
    attachments: &[ExtraAttachment],
) -> Result<Message, EmailError> {
    let mut builder = Message::builder()
        .from(parse_mailbox(from)?)
        .subject(subject);
    for address in to {
        builder = builder.to(parse_mailbox(address)?);
    }
    for address in reply_to {
        builder = builder.reply_to(parse_mailbox(address)?);
    }

    // Related subtype keeps the inline images associated with the HTML
    // alternative that references them by content-ID.
    let mut related = MultiPart::related().multipart(MultiPart::alternative_plain_html(
        plaintext_body.to_string(),
        html_body.to_string(),
    ));
    for image in inline_images {
        related = related.singlepart(
            Attachment::new_inline(image.content_id.clone())
                .body(image.data.clone(), parse_content_type(&image.mime_type)?),
        );
    }

    let message = if attachments.is_empty() {
        builder.multipart(related)?
    } else {
        let mut mixed = MultiPart::mixed().multipart(related);
        for attachment in attachments {
            mixed = mixed.singlepart(
                Attachment::new(attachment.filename.clone()).body(
                    attachment.data.clone(),
                    parse_content_type(&attachment.mime_type)?,
                ),
            );
        }
        builder.multipart(mixed)?
    };

    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formatted(message: &Message) -> String {
        String::from_utf8_lossy(&message.formatted()).into_owned()
    }

    #[test]
    fn composes_related_multipart_with_plain_and_html() {
        let message = compose_message(
            "Subject",
            "plain body",
            "<p>html body</p>",
            "Sender <sender@example.org>",
            &["rcpt@example.org".to_string()],
            &[],
            &[],
            &[],
        )
        .expect("compose");

        let raw = formatted(&message);
        assert!(raw.contains("multipart/related"));
        assert!(raw.contains("multipart/alternative"));
        assert!(raw.contains("plain body"));
        assert!(raw.contains("html body"));
        assert!(raw.contains("Subject: Subject"));
    }

    #[test]
    fn inline_images_are_keyed_by_content_id() {
        let message = compose_message(
            "Subject",
            "plain",
            "<img src=\"cid:abc123\">",
            "sender@example.org",
            &["rcpt@example.org".to_string()],
            &[],
            &[InlineImage {
                content_id: "abc123".to_string(),
                data: b"pixels".to_vec(),
                mime_type: "image/png".to_string(),
            }],
            &[],
        )
        .expect("compose");

        let raw = formatted(&message);
        assert!(raw.contains("Content-ID: <abc123>"));
        assert!(raw.contains("image/png"));
    }

    #[test]
    fn extra_attachments_wrap_the_related_part_in_mixed() {
        let message = compose_message(
            "Subject",
            "plain",
            "<p>html</p>",
            "sender@example.org",
            &["rcpt@example.org".to_string()],
            &["replies@example.org".to_string()],
            &[],
            &[ExtraAttachment {
                filename: "agenda.txt".to_string(),
                data: b"1. welcome".to_vec(),
                mime_type: "text/plain".to_string(),
            }],
        )
        .expect("compose");

        let raw = formatted(&message);
        assert!(raw.contains("multipart/mixed"));
        assert!(raw.contains("multipart/related"));
        assert!(raw.contains("agenda.txt"));
        assert!(raw.contains("Reply-To: replies@example.org"));
    }

    #[test]
    fn invalid_recipient_address_is_rejected() {
        let err = compose_message(
            "Subject",
            "plain",
            "<p>html</p>",
            "sender@example.org",
            &["not an address".to_string()],
            &[],
            &[],
            &[],
        )
        .expect_err("invalid address");
        assert!(matches!(err, EmailError::Address { .. }));
    }
}
