use comrak::options::Options;

fn conversion_options() -> Options<'static> {
    Options::default()
}

/// Convert markdown into an HTML fragment. Pure and deterministic; malformed
/// markdown degrades to near-literal HTML rather than failing, so this stage
/// has no error path.
pub fn markdown_to_html(markdown: &str) -> String {
    comrak::markdown_to_html(markdown, &conversion_options())
}
