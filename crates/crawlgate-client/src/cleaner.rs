use std::sync::Arc;

use crawlgate_core::{AppError, CrawlOptions, CrawlOutput};
use htmd::HtmlToMarkdown;

use crate::filter::PruningFilter;

/// HTML-to-Markdown converter using htmd.
///
/// Strips non-content elements (script, style, nav, etc.) before the
/// pruning filter ever sees the document.
pub struct HtmdCleaner {
    converter: Arc<HtmlToMarkdown>,
}

impl Clone for HtmdCleaner {
    fn clone(&self) -> Self {
        Self {
            converter: Arc::clone(&self.converter),
        }
    }
}

impl HtmdCleaner {
    pub fn new() -> Self {
        let converter = HtmlToMarkdown::builder()
            .skip_tags(vec![
                "script", "style", "nav", "footer", "header", "aside", "noscript", "iframe", "svg",
                "form",
            ])
            .build();

        Self {
            converter: Arc::new(converter),
        }
    }

    pub fn convert(&self, html: &str) -> Result<String, AppError> {
        self.converter
            .convert(html)
            .map_err(|e| AppError::CleanerError(e.to_string()))
    }

    /// Convert `html` and run the result through the pruning filter.
    pub fn render(&self, html: &str, options: &CrawlOptions) -> Result<CrawlOutput, AppError> {
        let raw_markdown = self.convert(html)?;
        let markdown = PruningFilter::from_options(options).apply(&raw_markdown);
        Ok(CrawlOutput {
            markdown,
            raw_markdown,
        })
    }
}

impl Default for HtmdCleaner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_html_to_markdown() {
        let md = HtmdCleaner::new()
            .convert("<h1>Hello</h1><p>World</p>")
            .unwrap();
        assert!(md.contains("Hello"));
        assert!(md.contains("World"));
    }

    #[test]
    fn test_strips_script_and_nav() {
        let html = "<nav><a href=\"/\">Home</a></nav><p>Content</p><script>alert('xss')</script>";
        let md = HtmdCleaner::new().convert(html).unwrap();
        assert!(md.contains("Content"));
        assert!(!md.contains("alert"));
        assert!(!md.contains("Home"));
    }

    #[test]
    fn test_render_keeps_raw_and_filtered() {
        let html = "<h1>Docs</h1>\
            <p><a href=\"/a\">One</a> <a href=\"/b\">Two</a> <a href=\"/c\">Three</a></p>\
            <p>This paragraph explains the topic in plain words and has no links at all.</p>";
        let options = CrawlOptions::default();
        let output = HtmdCleaner::new().render(html, &options).unwrap();

        assert!(output.raw_markdown.contains("[Two]"));
        assert!(!output.markdown.contains("[Two]"));
        assert!(output.markdown.contains("plain words"));
        assert!(output.markdown.contains("Docs"));
    }

    #[test]
    fn test_render_zero_threshold_matches_raw_text() {
        let html = "<p><a href=\"/a\">Only a link</a></p>";
        let options = CrawlOptions::default().with_filter_threshold(0.0);
        let output = HtmdCleaner::new().render(html, &options).unwrap();
        assert!(output.markdown.contains("Only a link"));
    }
}
