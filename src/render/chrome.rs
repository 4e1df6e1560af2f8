use std::path::Path;

use super::AssembledDocument;

/// Branding chrome wrapped around every message body. Injected at
/// construction time so deployments can swap header/footer markup without
/// touching pipeline logic.
#[derive(Debug, Clone)]
pub struct Branding {
    header_html: String,
    footer_html: String,
}

impl Branding {
    pub fn new(header_html: impl Into<String>, footer_html: impl Into<String>) -> Self {
        Self {
            header_html: header_html.into(),
            footer_html: footer_html.into(),
        }
    }

    /// Built-in chrome referencing logo and social-icon assets under
    /// `asset_dir`. Deployments normally replace this with their own markup
    /// via configuration.
    pub fn for_asset_dir(asset_dir: &Path) -> Self {
        let dir = asset_dir.display();
        let header = format!(
            r#"<div class="email-header">
  <a href="https://example.org/" aria-label="Example Org Home">
    <img class="email-header-img" alt="Example Org" src="{dir}/header-img.png">
  </a>
</div>"#
        );
        let footer = format!(
            r#"<div class="footer">
  <table style="text-align: center; color: white; font-family: sans-serif;">
    <tr>
      <td style="width: 50%; padding: .5em;">
        <img style="padding: 1em;" class="email-header-img" alt="Example Org" src="{dir}/footer-img.png">
        <p>Example Org tagline.</p>
        <span>
          <a style="text-decoration: none; color: white;" href="mailto:info@example.org">info@example.org</a>
        </span>
      </td>
      <td style="width: 50%; padding: .5em;">
        <b>Find us on Social Media</b><br>
        <a class="social-icon" aria-label="Example Org on Mastodon" href="https://example.org/social">
          <img class="footer-icon" src="{dir}/social-logo-24.png">
        </a>
      </td>
    </tr>
    <tr>
      <td colspan="2">
        <p>Want to stop receiving these emails? Manage your profile <a href="https://example.org/profile/">here</a>.</p>
      </td>
    </tr>
  </table>
</div>"#
        );
        Self::new(header, footer)
    }

    pub fn header_html(&self) -> &str {
        &self.header_html
    }

    pub fn footer_html(&self) -> &str {
        &self.footer_html
    }
}

/// Wrap a rendered body fragment with the branding chrome, in fixed order:
/// header, content wrapper, footer. Malformed fragments are embedded as-is;
/// the downstream rewriting stages tolerate unclosed markup.
pub fn assemble(branding: &Branding, content_fragment: &str) -> AssembledDocument {
    let mut html = String::with_capacity(
        branding.header_html.len() + content_fragment.len() + branding.footer_html.len() + 32,
    );
    html.push_str(&branding.header_html);
    html.push_str("<div class=\"content\">");
    html.push_str(content_fragment);
    html.push_str("</div>");
    html.push_str(&branding.footer_html);
    AssembledDocument::new(html)
}
