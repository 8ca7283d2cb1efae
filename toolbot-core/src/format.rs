// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Reply formatting
//!
//! Turns a model reply written in the platform grammar into display markup:
//!
//! ```text
//! ### Platform Name
//! - Link: https://example.com
//! - Free to Use: Yes
//! - Note: Short description.
//! ```
//!
//! Each line is classified on its own, then fed to a two-state renderer
//! (`OutsideBlock` / `InBlock`). Lines that fit no rule take the fallback branch and
//! are rendered escaped, so any input produces output.

use serde::{Deserialize, Serialize};

use crate::sanitization::{escape_html, http_url};

const BLOCK_OPEN: &str = r#"<div class="platform" style="margin-top: 12px;">"#;
const BLOCK_CLOSE: &str = "</div>";
const LINE_BREAK: &str = "<br>";

/// Labels recognized inside a platform block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldLabel {
    Link,
    FreeToUse,
    Note,
}

impl FieldLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldLabel::Link => "Link",
            FieldLabel::FreeToUse => "Free to Use",
            FieldLabel::Note => "Note",
        }
    }

    fn parse(label: &str) -> Option<Self> {
        [FieldLabel::Link, FieldLabel::FreeToUse, FieldLabel::Note]
            .into_iter()
            .find(|known| known.as_str().eq_ignore_ascii_case(label))
    }
}

/// One classified reply line, borrowing from the input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line<'a> {
    Blank,
    Heading(&'a str),
    Field { label: FieldLabel, value: &'a str },
    Other(&'a str),
}

/// Structured view of one suggestion block
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformEntry {
    pub name: String,
    /// Only set when the `Link` value is an http(s) URL
    pub link: Option<String>,
    pub free_to_use: Option<String>,
    pub note: Option<String>,
}

impl PlatformEntry {
    fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    fn set(&mut self, label: FieldLabel, value: &str) {
        match label {
            FieldLabel::Link => self.link = link_target(value).map(str::to_string),
            FieldLabel::FreeToUse => self.free_to_use = Some(value.to_string()),
            FieldLabel::Note => self.note = Some(value.to_string()),
        }
    }
}

pub fn classify(line: &str) -> Line<'_> {
    let line = line.trim();
    if line.is_empty() {
        return Line::Blank;
    }
    if let Some(name) = classify_heading(line) {
        return Line::Heading(name);
    }
    if let Some((label, value)) = classify_field(line) {
        return Line::Field { label, value };
    }
    Line::Other(line)
}

/// `### Name` or `### **Name**`
fn classify_heading(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("###")?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let name = strip_bold(rest.trim());
    (!name.is_empty()).then_some(name)
}

/// `- Label: value`, also `* Label: value`, `- **Label:** value` and `- **Label**: value`
fn classify_field(line: &str) -> Option<(FieldLabel, &str)> {
    let rest = line
        .strip_prefix('-')
        .or_else(|| line.strip_prefix('*'))?
        .trim_start();
    let (label, value) = rest.split_once(':')?;

    let label = FieldLabel::parse(label.trim().trim_matches('*').trim())?;
    let value = value.strip_prefix("**").unwrap_or(value).trim();
    if value.is_empty() {
        return None;
    }
    Some((label, value))
}

fn strip_bold(text: &str) -> &str {
    text.strip_prefix("**")
        .and_then(|inner| inner.strip_suffix("**"))
        .map(str::trim)
        .unwrap_or(text)
}

/// URL of a `Link` value: either the bare value or the target of `[text](url)`
fn link_target(value: &str) -> Option<&str> {
    let candidate = markdown_link_target(value).unwrap_or(value);
    http_url(candidate)
}

fn markdown_link_target(value: &str) -> Option<&str> {
    let rest = value.strip_prefix('[')?;
    let (_, target) = rest.split_once("](")?;
    let end = target.find(')')?;
    Some(&target[..end])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    OutsideBlock,
    InBlock,
}

struct Renderer {
    state: State,
    out: Vec<String>,
}

impl Renderer {
    fn new() -> Self {
        Self {
            state: State::OutsideBlock,
            out: Vec::new(),
        }
    }

    fn feed(&mut self, line: Line<'_>) {
        match line {
            Line::Blank => self.out.push(LINE_BREAK.to_string()),
            Line::Heading(name) => {
                self.close_block();
                self.out.push(BLOCK_OPEN.to_string());
                self.out.push(format!(
                    r#"<div class="platform-name"><strong>• {}</strong></div>"#,
                    escape_html(name)
                ));
                self.state = State::InBlock;
            }
            Line::Field { label, value } => {
                self.out.push(format!(
                    r#"<div class="platform-field" style="margin-left: 20px;"><strong>{}:</strong> {}</div>"#,
                    label.as_str(),
                    render_value(label, value)
                ));
            }
            Line::Other(text) => {
                self.close_block();
                self.out.push(format!("<div>{}</div>", escape_html(text)));
            }
        }
    }

    fn close_block(&mut self) {
        if self.state == State::InBlock {
            self.out.push(BLOCK_CLOSE.to_string());
            self.state = State::OutsideBlock;
        }
    }

    fn finish(mut self) -> String {
        self.close_block();
        self.out.join("\n")
    }
}

fn render_value(label: FieldLabel, value: &str) -> String {
    if label == FieldLabel::Link {
        if let Some(url) = link_target(value) {
            let url = escape_html(url);
            return format!(
                r#"<a href="{url}" target="_blank" rel="noopener noreferrer">{url}</a>"#
            );
        }
    }
    escape_html(value)
}

/// Render a model reply as markup. Never fails; empty input gives an empty string.
pub fn format_reply(raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        return String::new();
    }

    let mut renderer = Renderer::new();
    for line in raw.lines() {
        renderer.feed(classify(line));
    }
    renderer.finish()
}

/// Extract the platform entries a reply describes, using the same line rules as
/// `format_reply`. Fields outside any block are ignored.
pub fn parse_entries(raw: &str) -> Vec<PlatformEntry> {
    let mut entries = Vec::new();
    let mut current: Option<PlatformEntry> = None;

    for line in raw.lines() {
        match classify(line) {
            Line::Heading(name) => {
                entries.extend(current.take());
                current = Some(PlatformEntry::named(name));
            }
            Line::Field { label, value } => {
                if let Some(entry) = current.as_mut() {
                    entry.set(label, value);
                }
            }
            Line::Other(_) => entries.extend(current.take()),
            Line::Blank => {}
        }
    }

    entries.extend(current);
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const WELL_FORMED: &str =
        "### Foo\n- Link: https://x.com\n- Free to Use: Yes\n- Note: Great tool.";

    fn position(haystack: &str, needle: &str) -> usize {
        haystack
            .find(needle)
            .unwrap_or_else(|| panic!("{:?} not found in {:?}", needle, haystack))
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify("   "), Line::Blank);
        assert_eq!(classify("### Foo "), Line::Heading("Foo"));
        assert_eq!(classify("### **Foo Bar**"), Line::Heading("Foo Bar"));
        assert_eq!(
            classify("- Link: https://x.com"),
            Line::Field {
                label: FieldLabel::Link,
                value: "https://x.com"
            }
        );
        assert_eq!(
            classify("* **Free to use:** Yes, with limits"),
            Line::Field {
                label: FieldLabel::FreeToUse,
                value: "Yes, with limits"
            }
        );
        assert_eq!(
            classify("- **Note**: Handy."),
            Line::Field {
                label: FieldLabel::Note,
                value: "Handy."
            }
        );

        assert_eq!(classify("###Foo"), Line::Other("###Foo"));
        assert_eq!(classify("### "), Line::Other("###"));
        assert_eq!(classify("###  **  **"), Line::Other("###  **  **"));
        assert_eq!(classify("- Note:"), Line::Other("- Note:"));
        assert_eq!(classify("- Price: $5"), Line::Other("- Price: $5"));
        assert_eq!(classify("Here are some tools"), Line::Other("Here are some tools"));
    }

    #[test]
    fn test_well_formed_reply() {
        let html = format_reply(WELL_FORMED);

        let heading = position(&html, "<strong>• Foo</strong>");
        let link = position(
            &html,
            r#"<a href="https://x.com" target="_blank" rel="noopener noreferrer">https://x.com</a>"#,
        );
        let free = position(&html, "<strong>Free to Use:</strong> Yes</div>");
        let note = position(&html, "<strong>Note:</strong> Great tool.</div>");

        assert!(heading < link && link < free && free < note);
        assert!(html.starts_with(BLOCK_OPEN));
        assert!(html.ends_with(BLOCK_CLOSE));
    }

    #[test]
    fn test_blocks_close_between_platforms() {
        let reply = "Intro text\n\n### A\n- Note: first\n\n### B\n- Note: second\nRepeat as needed.";
        let html = format_reply(reply);
        let lines: Vec<&str> = html.lines().collect();

        assert_eq!(
            lines,
            vec![
                "<div>Intro text</div>",
                LINE_BREAK,
                BLOCK_OPEN,
                r#"<div class="platform-name"><strong>• A</strong></div>"#,
                r#"<div class="platform-field" style="margin-left: 20px;"><strong>Note:</strong> first</div>"#,
                LINE_BREAK,
                BLOCK_CLOSE,
                BLOCK_OPEN,
                r#"<div class="platform-name"><strong>• B</strong></div>"#,
                r#"<div class="platform-field" style="margin-left: 20px;"><strong>Note:</strong> second</div>"#,
                BLOCK_CLOSE,
                "<div>Repeat as needed.</div>",
            ]
        );
    }

    #[test]
    fn test_blank_lines_not_collapsed() {
        let html = format_reply("a\n\n\nb");
        assert_eq!(html, "<div>a</div>\n<br>\n<br>\n<div>b</div>");
    }

    #[test]
    fn test_markdown_link() {
        let html = format_reply("### Foo\n- Link: [Foo site](https://foo.example/path)");
        assert!(html.contains(
            r#"<a href="https://foo.example/path" target="_blank" rel="noopener noreferrer">https://foo.example/path</a>"#
        ));
    }

    #[test]
    fn test_non_url_link_is_text() {
        let html = format_reply("### Foo\n- Link: javascript:alert(1)");
        assert!(!html.contains("<a "));
        assert!(html.contains("<strong>Link:</strong> javascript:alert(1)</div>"));
    }

    #[test]
    fn test_url_only_linked_for_link_label() {
        let html = format_reply("### Foo\n- Note: https://x.com");
        assert!(!html.contains("<a "));
    }

    #[test]
    fn test_script_is_escaped() {
        let html = format_reply(
            "<script>alert('x')</script>\n### <img src=x onerror=alert(1)>\n- Note: <b>bold</b>\n- Link: https://x.com/\"onmouseover=\"alert(1)",
        );

        assert!(!html.contains("<script"));
        assert!(!html.contains("<img"));
        assert!(!html.contains("<b>"));
        assert!(html.contains("&lt;script&gt;alert(&#x27;x&#x27;)&lt;/script&gt;"));
        assert!(html.contains("&lt;img src=x onerror=alert(1)&gt;"));
        assert!(!html.contains("\"onmouseover"));
    }

    #[test]
    fn test_empty_and_whitespace() {
        assert_eq!(format_reply(""), "");
        assert_eq!(format_reply("  \n\t \r\n "), "");
    }

    #[test]
    fn test_crlf_input() {
        let html = format_reply("### Foo\r\n- Free to Use: No\r\n");
        assert!(html.contains("<strong>• Foo</strong>"));
        assert!(html.contains("<strong>Free to Use:</strong> No</div>"));
        assert!(!html.contains('\r'));
    }

    #[test]
    fn test_parse_entries() {
        let reply = "Sure!\n### Foo\n- Link: https://x.com\n- Free to Use: Yes\n- Note: Great tool.\n\n### Bar\n- Link: not a url\n- Note: Meh.\n- Orphan line";
        let entries = parse_entries(reply);

        assert_eq!(
            entries,
            vec![
                PlatformEntry {
                    name: "Foo".to_string(),
                    link: Some("https://x.com".to_string()),
                    free_to_use: Some("Yes".to_string()),
                    note: Some("Great tool.".to_string()),
                },
                PlatformEntry {
                    name: "Bar".to_string(),
                    link: None,
                    free_to_use: None,
                    note: Some("Meh.".to_string()),
                },
            ]
        );
        assert!(parse_entries("").is_empty());
        assert!(parse_entries("- Note: no heading").is_empty());
    }

    proptest! {
        #[test]
        fn prop_never_emits_raw_markup(input in "\\PC*") {
            let html = format_reply(&input);
            // Every '<' in the output belongs to a structural tag we emit
            for (i, _) in html.match_indices('<') {
                let tail = &html[i..];
                prop_assert!(
                    ["<div", "</div>", "<strong>", "</strong>", "<br>", "<a href=\"", "</a>"]
                        .iter()
                        .any(|tag| tail.starts_with(tag)),
                    "unexpected markup at {}: {:?}", i, tail
                );
            }
        }

        #[test]
        fn prop_lines_with_grammar_noise(lines in prop::collection::vec(
            prop_oneof![
                Just("### ".to_string()),
                Just("- Link: ".to_string()),
                Just("* **Note:** ".to_string()),
                Just(String::new()),
                "[<>&\"' a-z:/\\[\\]()*#-]{0,24}",
            ],
            0..20,
        )) {
            let reply = lines.join("\n");
            let html = format_reply(&reply);
            prop_assert_eq!(
                html.matches(BLOCK_OPEN).count(),
                html.matches("<div class=\"platform-name\">").count()
            );
            let _ = parse_entries(&reply);
        }
    }
}
