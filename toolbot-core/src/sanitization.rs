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

//! Output sanitization for rendered markup
//!
//! Protects against:
//! - XSS via model or user controlled text
//! - Script URLs smuggled into `href` attributes

use url::Url;

/// Escape text for use in element content or a double-quoted attribute.
///
/// Escapes HTML entities and removes control characters.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            '&' => out.push_str("&amp;"),
            c if c.is_control() && c != '\n' && c != '\t' => {}
            c => out.push(c),
        }
    }
    out
}

/// Returns the candidate unchanged when it is a usable `http`/`https` URL.
///
/// Rejects whitespace, control characters, other schemes and host-less URLs.
pub fn http_url(candidate: &str) -> Option<&str> {
    if candidate.is_empty()
        || candidate
            .chars()
            .any(|c| c.is_whitespace() || c.is_control())
    {
        return None;
    }

    let parsed = Url::parse(candidate).ok()?;
    let has_host = parsed.host_str().is_some_and(|host| !host.is_empty());

    match parsed.scheme() {
        "http" | "https" if has_host => Some(candidate),
        _ => None,
    }
}
