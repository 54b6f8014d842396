// Copyright 2026 Mapreviews Contributors
// SPDX-License-Identifier: Apache-2.0

//! JavaScript snippets behind the default DOM operations of
//! [`RenderContext`](super::RenderContext).
//!
//! Every snippet is an expression. Results go through `JSON.stringify` so
//! `null` survives the trip back from the page.

use super::{ElementRef, Requirement};

/// Escape a value for inclusion in a single-quoted JS string literal.
pub fn sanitize_js_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 8);
    for ch in s.chars() {
        match ch {
            '\\' => result.push_str("\\\\"),
            '\'' => result.push_str("\\'"),
            '"' => result.push_str("\\\""),
            '`' => result.push_str("\\`"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            '\0' => {}
            '<' => result.push_str("\\x3c"),
            '>' => result.push_str("\\x3e"),
            _ => result.push(ch),
        }
    }
    result
}

/// Wrap an expression so its value comes back as a JSON string.
pub fn json_wrapped(expr: &str) -> String {
    format!("(() => {{ const v = ({expr}); return JSON.stringify(v === undefined ? null : v); }})()")
}

fn element(el: &ElementRef) -> String {
    format!(
        "document.querySelectorAll('{}')[{}]",
        sanitize_js_string(&el.selector),
        el.index
    )
}

pub fn count(selector: &str) -> String {
    format!(
        "document.querySelectorAll('{}').length",
        sanitize_js_string(selector)
    )
}

/// JS predicate over `el`: rendered with a non-zero box.
const VISIBLE: &str = "el.offsetParent !== null && el.getBoundingClientRect().height > 0";

/// Index of the first element matching `selector` that satisfies `require`
/// and, when given, contains `text` in its text or aria-label. `-1` if none.
pub fn find(selector: &str, require: Requirement, text: Option<&str>) -> String {
    let needle = match text {
        Some(t) => format!("'{}'", sanitize_js_string(t)),
        None => "null".to_string(),
    };
    let check = match require {
        Requirement::Present => "true",
        Requirement::Visible => VISIBLE,
        Requirement::Scrollable => "el.scrollHeight > el.clientHeight",
    };
    format!(
        r#"(() => {{
  const els = document.querySelectorAll('{sel}');
  const needle = {needle};
  for (let i = 0; i < els.length; i++) {{
    const el = els[i];
    if (needle !== null) {{
      const hay = (el.textContent || '') + ' ' + (el.getAttribute('aria-label') || '');
      if (!hay.includes(needle)) continue;
    }}
    if ({check}) return i;
  }}
  return -1;
}})()"#,
        sel = sanitize_js_string(selector),
    )
}

pub fn click(el: &ElementRef) -> String {
    format!(
        "(() => {{ const el = {}; if (!el) return false; el.click(); return true; }})()",
        element(el)
    )
}

pub fn scroll_to_bottom(el: &ElementRef) -> String {
    format!(
        "(() => {{ const el = {}; if (!el) return false; el.scrollTop = el.scrollHeight; return true; }})()",
        element(el)
    )
}

pub fn scroll_by(el: &ElementRef, delta: i64) -> String {
    format!(
        "(() => {{ const el = {}; if (!el) return false; el.scrollBy(0, {delta}); return true; }})()",
        element(el)
    )
}

pub fn outer_html_all(selector: &str) -> String {
    format!(
        "Array.from(document.querySelectorAll('{}')).map(e => e.outerHTML)",
        sanitize_js_string(selector)
    )
}

pub fn text_of(selector: &str) -> String {
    format!(
        "(() => {{ const el = document.querySelector('{}'); return el ? (el.textContent || '').trim() : null; }})()",
        sanitize_js_string(selector)
    )
}

pub fn attribute_of(selector: &str, attribute: &str) -> String {
    format!(
        "(() => {{ const el = document.querySelector('{}'); return el ? el.getAttribute('{}') : null; }})()",
        sanitize_js_string(selector),
        sanitize_js_string(attribute)
    )
}

/// Click every visible `buttons` match inside every `scope` match; returns
/// clicks. Hidden controls belong to collapsed sections and stay untouched.
pub fn expand_truncated(scope: &str, buttons: &str) -> String {
    format!(
        r#"(() => {{
  let clicked = 0;
  document.querySelectorAll('{scope}').forEach(node => {{
    node.querySelectorAll('{buttons}').forEach(el => {{
      if (!({visible})) return;
      try {{ el.click(); clicked++; }} catch (e) {{}}
    }});
  }});
  return clicked;
}})()"#,
        scope = sanitize_js_string(scope),
        buttons = sanitize_js_string(buttons),
        visible = VISIBLE,
    )
}

/// Injected before any document loads to hide the automation flag.
pub const HIDE_WEBDRIVER: &str = r#"
Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
window.chrome = window.chrome || { runtime: {} };
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_quotes_and_tags() {
        assert_eq!(sanitize_js_string("a'b"), "a\\'b");
        assert_eq!(sanitize_js_string("</script>"), "\\x3c/script\\x3e");
        assert_eq!(sanitize_js_string("x\0y"), "xy");
    }

    #[test]
    fn test_selectors_are_escaped() {
        let s = count(r#"button[aria-label*="クチコミ"]"#);
        assert_eq!(
            s,
            r#"document.querySelectorAll('button[aria-label*=\"クチコミ\"]').length"#
        );
    }

    #[test]
    fn test_find_embeds_requirement() {
        let s = find("div.m6QErb", Requirement::Scrollable, None);
        assert!(s.contains("el.scrollHeight > el.clientHeight"));
        assert!(s.contains("const needle = null;"));

        let s = find("button", Requirement::Visible, Some("It's"));
        assert!(s.contains("const needle = 'It\\'s';"));
        assert!(s.contains("offsetParent"));
    }

    #[test]
    fn test_element_addressing() {
        let el = ElementRef::new("div.m6QErb", 2);
        assert!(scroll_by(&el, 800).contains("document.querySelectorAll('div.m6QErb')[2]"));
        assert!(scroll_by(&el, 800).contains("scrollBy(0, 800)"));
    }

    #[test]
    fn test_expand_skips_hidden_buttons() {
        let s = expand_truncated("div[data-review-id]", "button.w8nwRe");
        let guard = format!("if (!({VISIBLE})) return;");
        let guard_at = s.find(&guard).unwrap();
        let click_at = s.find("el.click()").unwrap();
        assert!(guard_at < click_at);
        assert!(s.contains("querySelectorAll('button.w8nwRe')"));
    }
}
