use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failures surfaced by the rendering and dispatch pipeline. Every variant is
/// fatal for the send in progress: no partial message is ever handed to the
/// transport. An all-suppressed recipient list is not an error; see
/// [`crate::dispatch::SendOutcome`].
#[derive(Debug, Error)]
pub enum EmailError {
    #[error("template not found: {name}")]
    TemplateNotFound { name: String },
    #[error("template `{name}` failed to render: {message}")]
    TemplateSyntax { name: String, message: String },
    #[error("inline asset `{path}` could not be read")]
    AssetNotFound {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("stylesheet could not be parsed: {message}")]
    Stylesheet { message: String },
    #[error("markup processing failed: {message}")]
    Markup { message: String },
    #[error("invalid mailbox address `{address}`")]
    Address { address: String },
    #[error("message composition failed: {0}")]
    Compose(#[from] lettre::error::Error),
    #[error("transport failure: {0}")]
    Transport(#[source] BoxError),
    #[error("configuration error: {message}")]
    Configuration { message: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl EmailError {
    pub fn template_not_found(name: impl Into<String>) -> Self {
        Self::TemplateNotFound { name: name.into() }
    }

    pub fn template_syntax(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TemplateSyntax {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn stylesheet(message: impl Into<String>) -> Self {
        Self::Stylesheet {
            message: message.into(),
        }
    }

    pub fn markup(message: impl Into<String>) -> Self {
        Self::Markup {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}
