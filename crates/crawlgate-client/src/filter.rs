//! Block-level pruning of converted Markdown.
//!
//! The document is split into blocks (paragraphs, list groups, fenced code)
//! on blank lines. Each text block gets a score in `[0, 1]`:
//!
//! ```text
//! score = 0.7 * text_density + 0.3 * length_factor
//! text_density  = 1 - link_words / words
//! length_factor = min(1, ln(1 + words) / ln(1 + 20))
//! ```
//!
//! Navigation bars and link farms score low, real prose scores high.
//! Headings survive only if some block under them survives.

use crawlgate_core::CrawlOptions;

const DENSITY_WEIGHT: f64 = 0.7;
const LENGTH_WEIGHT: f64 = 0.3;
/// Word count at which a block gets the full length bonus.
const FULL_LENGTH_WORDS: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PruningFilter {
    threshold: f64,
    min_words: usize,
}

#[derive(Debug, PartialEq)]
enum Block<'a> {
    Heading(&'a str),
    Code(&'a str),
    Text(&'a str),
}

impl PruningFilter {
    pub fn new(threshold: f64, min_words: usize) -> Self {
        Self {
            threshold: threshold.clamp(0.0, 1.0),
            min_words,
        }
    }

    pub fn from_options(options: &CrawlOptions) -> Self {
        Self::new(options.filter_threshold, options.min_word_threshold)
    }

    /// Return `markdown` with low-value blocks removed.
    pub fn apply(&self, markdown: &str) -> String {
        let blocks = split_blocks(markdown);
        let keep: Vec<bool> = blocks.iter().map(|b| self.keeps(b)).collect();

        let mut out: Vec<&str> = Vec::new();
        for (i, block) in blocks.iter().enumerate() {
            match block {
                Block::Heading(text) => {
                    if section_has_content(&blocks, &keep, i) {
                        out.push(*text);
                    }
                }
                Block::Code(text) | Block::Text(text) => {
                    if keep[i] {
                        out.push(*text);
                    }
                }
            }
        }

        out.join("\n\n")
    }

    fn keeps(&self, block: &Block<'_>) -> bool {
        match block {
            Block::Heading(_) => false,
            Block::Code(_) => true,
            Block::Text(text) => {
                let (words, link_words) = count_words(text);
                if words == 0 || words < self.min_words {
                    return false;
                }
                score(words, link_words) >= self.threshold
            }
        }
    }
}

/// True if a kept non-heading block follows `heading` before the next heading
/// of the same or higher level.
fn section_has_content(blocks: &[Block<'_>], keep: &[bool], heading: usize) -> bool {
    let level = match blocks[heading] {
        Block::Heading(text) => heading_level(text),
        _ => return false,
    };
    for (block, kept) in blocks.iter().zip(keep).skip(heading + 1) {
        match block {
            Block::Heading(text) if heading_level(text) <= level => return false,
            Block::Heading(_) => {}
            _ if *kept => return true,
            _ => {}
        }
    }
    false
}

fn heading_level(text: &str) -> usize {
    text.chars().take_while(|c| *c == '#').count()
}

fn score(words: usize, link_words: usize) -> f64 {
    let density = 1.0 - (link_words.min(words) as f64 / words as f64);
    let length = ((1.0 + words as f64).ln() / (1.0 + FULL_LENGTH_WORDS).ln()).min(1.0);
    DENSITY_WEIGHT * density + LENGTH_WEIGHT * length
}

fn split_blocks(markdown: &str) -> Vec<Block<'_>> {
    let mut blocks = Vec::new();
    let mut start: Option<usize> = None;
    let mut in_fence = false;
    let mut offset = 0;

    for line in markdown.split_inclusive('\n') {
        let trimmed = line.trim();
        let line_start = offset;
        offset += line.len();

        // A fence is its own block even when text touches it on either side.
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            if in_fence {
                in_fence = false;
                if let Some(s) = start.take() {
                    blocks.push(Block::Code(markdown[s..offset].trim()));
                }
                continue;
            }
            if let Some(s) = start.take() {
                blocks.push(classify(&markdown[s..line_start]));
            }
            in_fence = true;
            start = Some(line_start);
            continue;
        }
        if in_fence {
            continue;
        }

        if trimmed.is_empty() {
            if let Some(s) = start.take() {
                blocks.push(classify(&markdown[s..line_start]));
            }
            continue;
        }

        // A heading line always stands alone.
        if trimmed.starts_with('#') {
            if let Some(s) = start.take() {
                blocks.push(classify(&markdown[s..line_start]));
            }
            blocks.push(Block::Heading(trimmed));
            continue;
        }

        start.get_or_insert(line_start);
    }

    if let Some(s) = start {
        blocks.push(classify(&markdown[s..]));
    }

    blocks
}

fn classify(raw: &str) -> Block<'_> {
    let text = raw.trim();
    if text.starts_with("```") || text.starts_with("~~~") {
        Block::Code(text)
    } else {
        Block::Text(text)
    }
}

/// Count words in a block and how many of them sit inside link or image text.
fn count_words(text: &str) -> (usize, usize) {
    let mut plain = String::with_capacity(text.len());
    let mut link_words = 0;
    let mut rest = text;

    while let Some(open) = rest.find('[') {
        plain.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match parse_link(after) {
            Some((label, consumed)) => {
                link_words += label.split_whitespace().count();
                plain.push(' ');
                plain.push_str(label);
                plain.push(' ');
                rest = &after[consumed..];
            }
            None => {
                plain.push('[');
                rest = after;
            }
        }
    }
    plain.push_str(rest);

    let words = plain
        .split_whitespace()
        .filter(|w| w.chars().any(char::is_alphanumeric))
        .count();
    (words, link_words)
}

/// Parse `label](target)` after an opening bracket. Returns the label and
/// the number of bytes consumed.
fn parse_link(s: &str) -> Option<(&str, usize)> {
    let close = s.find("](")?;
    let label = &s[..close];
    if label.contains('[') {
        return None;
    }
    let target_end = s[close + 2..].find(')')?;
    Some((label, close + 2 + target_end + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "\
# Example Domain

- [Home](/) - [About](/about) - [Contact](/contact)

This domain is for use in illustrative examples in documents. You may use this
domain in literature without prior coordination or asking for permission.

## Links

[More information...](https://www.iana.org/domains/example)
";

    #[test]
    fn test_nav_is_pruned_and_prose_kept() {
        let out = PruningFilter::new(0.48, 0).apply(PAGE);
        assert!(out.starts_with("# Example Domain"));
        assert!(out.contains("illustrative examples"));
        assert!(!out.contains("[Contact]"));
        assert!(!out.contains("More information"));
        assert!(!out.contains("## Links"));
    }

    #[test]
    fn test_zero_threshold_keeps_all_text() {
        let out = PruningFilter::new(0.0, 0).apply(PAGE);
        assert!(out.contains("[Contact]"));
        assert!(out.contains("More information"));
        assert!(out.contains("## Links"));
    }

    #[test]
    fn test_min_words_drops_short_blocks() {
        let md = "Short line.\n\nThis paragraph has quite a few more words than the first one does.";
        let out = PruningFilter::new(0.0, 5).apply(md);
        assert!(!out.contains("Short line."));
        assert!(out.contains("quite a few more words"));
    }

    #[test]
    fn test_heading_without_content_is_dropped() {
        let md = "# Title\n\n## Empty\n\n- [a](/a) - [b](/b)\n\n## Full\n\nA real sentence with enough words to count as content here.";
        let out = PruningFilter::new(0.48, 0).apply(md);
        assert!(out.contains("# Title"));
        assert!(!out.contains("## Empty"));
        assert!(out.contains("## Full"));
    }

    #[test]
    fn test_code_fences_are_kept_whole() {
        let md = "Some intro text for the snippet below.\n\n```rust\nfn main() {\n\n    println!(\"hi\");\n}\n```";
        let out = PruningFilter::new(0.9, 50).apply(md);
        assert!(out.contains("println!"));
        assert!(out.contains("fn main()"));
    }

    #[test]
    fn test_fence_touching_text_stays_whole() {
        let md = "- [Docs](/docs) - [API](/api)\n```sh\ncurl localhost:8000/health\n```\n[Next](/next)";
        let blocks = split_blocks(md);
        assert_eq!(
            blocks,
            vec![
                Block::Text("- [Docs](/docs) - [API](/api)"),
                Block::Code("```sh\ncurl localhost:8000/health\n```"),
                Block::Text("[Next](/next)"),
            ]
        );

        let out = PruningFilter::new(0.48, 0).apply(md);
        assert_eq!(out, "```sh\ncurl localhost:8000/health\n```");
    }

    #[test]
    fn test_count_words_splits_link_text() {
        let (words, links) = count_words("Read the [full report](https://x.test/r) today");
        assert_eq!(words, 5);
        assert_eq!(links, 2);

        let (words, links) = count_words("not [a link] at all");
        assert_eq!(words, 5);
        assert_eq!(links, 0);
    }

    #[test]
    fn test_score_bounds() {
        assert!(score(30, 0) > 0.99);
        assert!(score(3, 3) < 0.2);
        assert!((0.0..=1.0).contains(&score(1, 0)));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(PruningFilter::new(0.48, 0).apply(""), "");
    }
}
