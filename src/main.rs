use std::{
    collections::HashSet,
    fs,
    path::PathBuf,
    process,
    sync::Arc,
};

use clap::{Args, Parser, Subcommand, ValueHint};
use lettre::{
    SmtpTransport, Transport,
    address::Envelope,
    transport::file::FileTransport,
};
use missive::{
    Branding, Context, EmailError, EmailRequest, InMemorySuppressionList, Mailer, SendOutcome,
    SenderDefaults, StyleInliner, SuppressionList, TemplateStore,
    config::{self, Settings},
    render::EmailRenderer,
    telemetry,
};
use thiserror::Error;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

/// Command-line arguments for the missive binary.
#[derive(Debug, Parser)]
#[command(name = "missive", version, about = "Transactional email rendering and dispatch")]
struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "MISSIVE_CONFIG_FILE", value_name = "PATH")]
    config_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Render and send a templated message to a batch of recipients.
    Send(Box<SendArgs>),
    /// Render a markdown body through the draft-preview pipeline to stdout.
    Preview(PreviewArgs),
}

#[derive(Debug, Args)]
struct SendArgs {
    /// Template name; resolves `email/{name}/subject.txt` and
    /// `email/{name}/body.txt` unless overridden.
    #[arg(long, value_name = "NAME")]
    template: String,

    /// Newline-delimited recipient list (`#` comments allowed).
    #[arg(long, value_name = "PATH", value_hint = ValueHint::FilePath)]
    recipients: PathBuf,

    /// JSON object merged into the template context.
    #[arg(long, value_name = "JSON")]
    context: Option<String>,

    /// Explicit subject line, used verbatim.
    #[arg(long, value_name = "SUBJECT")]
    subject: Option<String>,

    /// Template path rendered for the subject instead of the default.
    #[arg(long = "subject-template", value_name = "PATH")]
    subject_template: Option<String>,

    /// File whose contents are rendered as the body template string.
    #[arg(long = "body-file", value_name = "PATH", value_hint = ValueHint::FilePath)]
    body_file: Option<PathBuf>,

    /// Sender address; falls back to the configured default.
    #[arg(long, value_name = "ADDRESS")]
    from: Option<String>,

    /// Reply-To address; may be given multiple times.
    #[arg(long = "reply-to", value_name = "ADDRESS")]
    reply_to: Vec<String>,

    /// Extra attachment; may be given multiple times.
    #[arg(long, value_name = "PATH", value_hint = ValueHint::FilePath)]
    attach: Vec<PathBuf>,

    /// Abort the whole batch on the first failing recipient instead of
    /// logging and continuing.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    abort_on_error: bool,
}

#[derive(Debug, Args)]
struct PreviewArgs {
    /// Markdown file to render.
    #[arg(value_name = "PATH", value_hint = ValueHint::FilePath)]
    input: PathBuf,
}

fn main() {
    if let Err(error) = run() {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &EmailError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

fn run() -> Result<(), EmailError> {
    let cli_args = CliArgs::parse();
    let settings = config::load(cli_args.config_file.as_ref())?;

    telemetry::init(&settings.logging)?;

    match cli_args.command {
        Command::Send(args) => run_send(settings, *args),
        Command::Preview(args) => run_preview(settings, args),
    }
}

fn run_send(settings: Settings, args: SendArgs) -> Result<(), EmailError> {
    let transport = build_transport(&settings)?;
    let mailer = build_mailer(&settings, transport)?;

    let recipients = read_recipient_lines(&args.recipients)?;
    let context = parse_context(args.context.as_deref())?;
    let body = args
        .body_file
        .as_ref()
        .map(|path| fs::read_to_string(path))
        .transpose()?;
    let attachments = load_attachments(&args.attach)?;

    // Dedupe set scoped to this batch invocation only.
    let mut seen: HashSet<String> = HashSet::new();
    let mut sent = 0usize;
    let mut suppressed = 0usize;
    let mut failed = 0usize;

    for recipient in recipients {
        if !seen.insert(recipient.to_ascii_lowercase()) {
            info!(
                target = "missive::batch",
                address = %recipient,
                "skipping duplicate recipient"
            );
            continue;
        }

        let mut request = EmailRequest::new(&args.template, vec![recipient.clone()])
            .with_context(context.clone())
            .with_reply_to(args.reply_to.clone())
            .with_attachments(attachments.clone());
        if let Some(from) = &args.from {
            request = request.with_from(from.clone());
        }
        if let Some(subject) = &args.subject {
            request = request.with_subject(subject.clone());
        }
        if let Some(path) = &args.subject_template {
            request = request.with_subject_template(path.clone());
        }
        if let Some(text) = &body {
            request = request.with_body(text.clone());
        }

        match mailer.send_message(&request) {
            Ok(SendOutcome::Sent { .. }) => {
                sent += 1;
                info!(target = "missive::batch", address = %recipient, "sent");
            }
            Ok(SendOutcome::AllSuppressed) => {
                suppressed += 1;
                info!(target = "missive::batch", address = %recipient, "suppressed");
            }
            Err(err) if args.abort_on_error => {
                error!(
                    target = "missive::batch",
                    address = %recipient,
                    error = %err,
                    "send failed; aborting batch"
                );
                return Err(err);
            }
            Err(err) => {
                failed += 1;
                warn!(
                    target = "missive::batch",
                    address = %recipient,
                    error = %err,
                    "send failed; continuing"
                );
            }
        }
    }

    info!(
        target = "missive::batch",
        sent, suppressed, failed, "batch complete"
    );
    Ok(())
}

fn run_preview(settings: Settings, args: PreviewArgs) -> Result<(), EmailError> {
    let renderer = build_renderer(&settings)?;
    let markdown = fs::read_to_string(&args.input)?;
    let html = renderer.render_preview(&markdown)?;
    println!("{html}");
    Ok(())
}

fn build_mailer(
    settings: &Settings,
    transport: CliTransport,
) -> Result<Mailer<CliTransport>, EmailError> {
    let templates = TemplateStore::from_dir(&settings.assets.template_dir)?;
    let renderer = build_renderer(settings)?;
    let suppression: Arc<dyn SuppressionList> = match &settings.suppression.path {
        Some(path) => Arc::new(InMemorySuppressionList::from_path(path)?),
        None => Arc::new(InMemorySuppressionList::default()),
    };
    let defaults = SenderDefaults {
        from: settings.mail.default_from.clone(),
        subject_prefix: settings.mail.subject_prefix.clone(),
    };

    Ok(Mailer::new(
        transport, templates, renderer, suppression, defaults,
    ))
}

fn build_renderer(settings: &Settings) -> Result<EmailRenderer, EmailError> {
    let branding = match (&settings.assets.header_file, &settings.assets.footer_file) {
        (Some(header), Some(footer)) => {
            Branding::new(fs::read_to_string(header)?, fs::read_to_string(footer)?)
        }
        (None, None) => Branding::for_asset_dir(&settings.assets.asset_dir),
        _ => {
            return Err(EmailError::configuration(
                "header_file and footer_file must be set together",
            ));
        }
    };
    let inliner = match &settings.assets.stylesheet {
        Some(path) => StyleInliner::from_path(path)?,
        None => StyleInliner::bundled(),
    };

    Ok(EmailRenderer::new(
        branding,
        inliner,
        settings.assets.asset_dir.clone(),
        settings.assets.preview_prefix.clone(),
    ))
}

#[derive(Debug, Error)]
enum CliTransportError {
    #[error(transparent)]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error(transparent)]
    File(#[from] lettre::transport::file::Error),
}

/// Outbound transport selected from the configured URL: SMTP for delivery,
/// file for local development.
enum CliTransport {
    Smtp(SmtpTransport),
    File(FileTransport),
}

impl Transport for CliTransport {
    type Ok = ();
    type Error = CliTransportError;

    fn send_raw(&self, envelope: &Envelope, email: &[u8]) -> Result<Self::Ok, Self::Error> {
        match self {
            Self::Smtp(transport) => {
                transport.send_raw(envelope, email)?;
            }
            Self::File(transport) => {
                transport.send_raw(envelope, email)?;
            }
        }
        Ok(())
    }
}

fn build_transport(settings: &Settings) -> Result<CliTransport, EmailError> {
    let url = settings.mail.transport_url.as_deref().ok_or_else(|| {
        EmailError::configuration("mail.transport_url is not configured")
    })?;

    if let Some(dir) = url.strip_prefix("file://") {
        return Ok(CliTransport::File(FileTransport::new(dir)));
    }

    let transport = SmtpTransport::from_url(url)
        .map_err(|err| EmailError::configuration(format!("invalid transport url: {err}")))?
        .build();
    Ok(CliTransport::Smtp(transport))
}

fn read_recipient_lines(path: &PathBuf) -> Result<Vec<String>, EmailError> {
    let contents = fs::read_to_string(path)?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

fn parse_context(raw: Option<&str>) -> Result<Context, EmailError> {
    let Some(raw) = raw else {
        return Ok(Context::new());
    };
    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|err| EmailError::configuration(format!("invalid context JSON: {err}")))?;
    Context::from_value(value)
        .map_err(|err| EmailError::configuration(format!("context must be a JSON object: {err}")))
}

fn load_attachments(paths: &[PathBuf]) -> Result<Vec<missive::ExtraAttachment>, EmailError> {
    paths
        .iter()
        .map(|path| {
            let data = fs::read(path)?;
            let filename = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "attachment".to_string());
            let mime_type = mime_guess::from_path(path)
                .first_or_octet_stream()
                .essence_str()
                .to_string();
            Ok(missive::ExtraAttachment {
                filename,
                data,
                mime_type,
            })
        })
        .collect()
}
