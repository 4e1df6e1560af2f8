//! Template and content resolution: decides the final subject line and body
//! text from several optional override inputs, with an explicit fallback
//! order. Backed by a directory of Tera templates; named lookups follow the
//! `email/{name}/subject.txt` / `email/{name}/body.txt` convention.

use std::path::Path;

use tera::Tera;

use crate::error::EmailError;

pub use tera::Context;

/// Runtime template store. Loaded once from the template directory; template
/// names are paths relative to that directory.
pub struct TemplateStore {
    tera: Tera,
}

impl TemplateStore {
    pub fn from_dir(dir: &Path) -> Result<Self, EmailError> {
        let glob = format!("{}/**/*", dir.display());
        let tera = Tera::new(&glob)
            .map_err(|err| EmailError::template_syntax(glob.clone(), describe(&err)))?;
        Ok(Self { tera })
    }

    fn has(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|known| known == name)
    }

    fn render_named(&self, name: &str, context: &Context) -> Result<String, EmailError> {
        self.tera
            .render(name, context)
            .map_err(|err| map_render_error(name, &err))
    }

    /// Resolve the subject line. Precedence, each branch short-circuiting:
    /// explicit subject string, then an override template path, then the
    /// default `email/{template_name}/subject.txt`. The result is collapsed
    /// to a single line and trimmed; `subject_prefix` is prepended when set.
    pub fn resolve_subject(
        &self,
        template_name: &str,
        subject_template: Option<&str>,
        subject: Option<&str>,
        subject_prefix: Option<&str>,
        context: &Context,
    ) -> Result<String, EmailError> {
        let raw = match (subject, subject_template) {
            (Some(explicit), _) => explicit.to_string(),
            (None, Some(path)) => self.render_named(path, context)?,
            (None, None) => {
                let name = format!("email/{template_name}/subject.txt");
                self.render_named(&name, context)?
            }
        };

        let collapsed = collapse_to_single_line(&raw);
        Ok(match subject_prefix {
            Some(prefix) => format!("{prefix} {collapsed}"),
            None => collapsed,
        })
    }

    /// Resolve the body text. An explicit body is treated as a standalone
    /// template string rendered with the context (so embedded template syntax
    /// still works). Otherwise the template name is tried as a direct path
    /// first, then as `email/{template_name}/body.txt` — an ordered list of
    /// lookup attempts, first existing template wins.
    pub fn resolve_body(
        &self,
        template_name: &str,
        body: Option<&str>,
        context: &Context,
    ) -> Result<String, EmailError> {
        if let Some(text) = body {
            return Tera::one_off(text, context, false)
                .map_err(|err| map_render_error("<inline body>", &err));
        }

        let fallback = format!("email/{template_name}/body.txt");
        let attempts = [template_name, fallback.as_str()];
        match attempts.iter().find(|name| self.has(name)) {
            Some(name) => self.render_named(name, context),
            None => Err(EmailError::template_not_found(fallback)),
        }
    }
}

/// Join internal newlines with single spaces and trim surrounding
/// whitespace: subjects must be one physical line.
fn collapse_to_single_line(subject: &str) -> String {
    subject
        .lines()
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

fn map_render_error(name: &str, err: &tera::Error) -> EmailError {
    match &err.kind {
        tera::ErrorKind::TemplateNotFound(missing) => EmailError::template_not_found(missing),
        _ => EmailError::template_syntax(name, describe(err)),
    }
}

fn describe(err: &tera::Error) -> String {
    use std::error::Error as _;

    let mut messages = vec![err.to_string()];
    let mut current = err.source();
    while let Some(inner) = current {
        messages.push(inner.to_string());
        current = inner.source();
    }
    messages.join(": ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn store_with(files: &[(&str, &str)]) -> (TempDir, TemplateStore) {
        let tmp = tempfile::tempdir().expect("tempdir");
        for (name, contents) in files {
            let path = tmp.path().join(name);
            fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
            fs::write(&path, contents).expect("write template");
        }
        let store = TemplateStore::from_dir(tmp.path()).expect("template store");
        (tmp, store)
    }

    #[test]
    fn explicit_subject_wins_over_templates() {
        let (_tmp, store) = store_with(&[
            ("email/welcome/subject.txt", "Default subject"),
            ("alt-subject.txt", "Alt subject"),
        ]);
        let subject = store
            .resolve_subject(
                "welcome",
                Some("alt-subject.txt"),
                Some("Explicit"),
                None,
                &Context::new(),
            )
            .expect("subject");
        assert_eq!(subject, "Explicit");
    }

    #[test]
    fn subject_template_override_beats_default_path() {
        let (_tmp, store) = store_with(&[
            ("email/welcome/subject.txt", "Default subject"),
            ("alt-subject.txt", "Alt {{ name }}"),
        ]);
        let mut context = Context::new();
        context.insert("name", "subject");
        let subject = store
            .resolve_subject("welcome", Some("alt-subject.txt"), None, None, &context)
            .expect("subject");
        assert_eq!(subject, "Alt subject");
    }

    #[test]
    fn default_subject_path_is_used_last() {
        let (_tmp, store) = store_with(&[("email/welcome/subject.txt", "Hello {{ name }}")]);
        let mut context = Context::new();
        context.insert("name", "World");
        let subject = store
            .resolve_subject("welcome", None, None, None, &context)
            .expect("subject");
        assert_eq!(subject, "Hello World");
    }

    #[test]
    fn subject_collapses_newlines_and_applies_prefix() {
        let (_tmp, store) = store_with(&[]);
        let subject = store
            .resolve_subject("welcome", None, Some("Hello\nWorld"), None, &Context::new())
            .expect("subject");
        assert_eq!(subject, "Hello World");

        let prefixed = store
            .resolve_subject(
                "welcome",
                None,
                Some("Hello\nWorld"),
                Some("[PBA]"),
                &Context::new(),
            )
            .expect("subject");
        assert_eq!(prefixed, "[PBA] Hello World");
    }

    #[test]
    fn missing_subject_template_is_fatal() {
        let (_tmp, store) = store_with(&[]);
        let err = store
            .resolve_subject("welcome", None, None, None, &Context::new())
            .expect_err("missing template");
        assert!(matches!(err, EmailError::TemplateNotFound { .. }));
    }

    #[test]
    fn inline_body_renders_as_template_string() {
        let (_tmp, store) = store_with(&[]);
        let mut context = Context::new();
        context.insert("first_name", "Ada");
        let body = store
            .resolve_body("welcome", Some("Hi {{ first_name }}!"), &context)
            .expect("body");
        assert_eq!(body, "Hi Ada!");
    }

    #[test]
    fn direct_template_path_beats_namespaced_fallback() {
        let (_tmp, store) = store_with(&[
            ("welcome", "direct body"),
            ("email/welcome/body.txt", "namespaced body"),
        ]);
        let body = store
            .resolve_body("welcome", None, &Context::new())
            .expect("body");
        assert_eq!(body, "direct body");
    }

    #[test]
    fn namespaced_body_path_is_the_fallback() {
        let (_tmp, store) = store_with(&[("email/welcome/body.txt", "namespaced body")]);
        let body = store
            .resolve_body("welcome", None, &Context::new())
            .expect("body");
        assert_eq!(body, "namespaced body");
    }

    #[test]
    fn unresolvable_body_reports_template_not_found() {
        let (_tmp, store) = store_with(&[]);
        let err = store
            .resolve_body("welcome", None, &Context::new())
            .expect_err("no body template");
        assert!(matches!(
            err,
            EmailError::TemplateNotFound { ref name } if name == "email/welcome/body.txt"
        ));
    }

    #[test]
    fn invalid_template_syntax_is_fatal() {
        let (_tmp, store) = store_with(&[]);
        let err = store
            .resolve_body("welcome", Some("{{ unclosed"), &Context::new())
            .expect_err("syntax error");
        assert!(matches!(err, EmailError::TemplateSyntax { .. }));
    }
}
