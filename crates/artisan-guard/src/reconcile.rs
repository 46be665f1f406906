//! Element reconciliation
//!
//! Behavior code that looks up an element by id throws on first run when the
//! markup never defined that id. Reconciliation finds every literal id
//! lookup in the behavior surface and appends a hidden placeholder element
//! to the markup for each id the markup lacks.

use indexmap::IndexSet;
use once_cell::sync::Lazy;
use regex::Regex;

/// Attribute carried by every placeholder element
pub const PLACEHOLDER_ATTRIBUTE: &str = "data-artisan-placeholder";

static ID_LOOKUP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"getElementById\(\s*['"`]([A-Za-z_][\w:.-]*)['"`]\s*\)|querySelector(?:All)?\(\s*['"`]#([A-Za-z_][\w-]*)['"`]\s*\)"#,
    )
    .expect("id lookup pattern is valid")
});

static MARKUP_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\sid\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>"']+))"#).expect("markup id pattern is valid")
});

static BODY_CLOSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</body\s*>").expect("body close pattern is valid"));

/// Result of [`reconcile_elements`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// Markup with placeholders appended
    pub markup: String,
    /// Ids that received a placeholder, in first-lookup order
    pub added_ids: Vec<String>,
}

/// Ids looked up by literal in behavior code, in first-seen order
#[must_use]
pub fn referenced_ids(behavior: &str) -> IndexSet<String> {
    ID_LOOKUP
        .captures_iter(behavior)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Ids defined by the markup
#[must_use]
pub fn defined_ids(markup: &str) -> IndexSet<String> {
    MARKUP_ID
        .captures_iter(markup)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Append placeholder elements for ids the markup does not define
#[must_use]
pub fn reconcile_elements(markup: &str, behavior: &str) -> Reconciliation {
    let defined = defined_ids(markup);
    let added_ids: Vec<String> = referenced_ids(behavior)
        .into_iter()
        .filter(|id| !defined.contains(id))
        .collect();

    if added_ids.is_empty() {
        return Reconciliation {
            markup: markup.to_string(),
            added_ids,
        };
    }

    let placeholders: String = added_ids
        .iter()
        .map(|id| format!("<div id=\"{id}\" {PLACEHOLDER_ATTRIBUTE}=\"true\" hidden></div>\n"))
        .collect();

    let markup = match BODY_CLOSE.find(markup) {
        Some(close) => format!(
            "{}{}{}",
            &markup[..close.start()],
            placeholders,
            &markup[close.start()..]
        ),
        None if markup.is_empty() || markup.ends_with('\n') => format!("{markup}{placeholders}"),
        None => format!("{markup}\n{placeholders}"),
    };

    tracing::debug!(added = ?added_ids, "appended placeholder elements");
    Reconciliation { markup, added_ids }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn finds_lookups_in_order_without_duplicates() {
        let js = r##"
            const a = document.getElementById('display');
            const b = document.querySelector("#keys");
            const c = document.getElementById(`display`);
            const d = document.getElementById('cell-' + i);
        "##;
        let ids: Vec<_> = referenced_ids(js).into_iter().collect();
        assert_eq!(ids, vec!["display".to_string(), "keys".to_string()]);
    }

    #[test]
    fn parses_markup_ids_in_all_quote_styles() {
        let ids = defined_ids(r#"<div id="a"></div><p id='b'></p><span id=c></span><i data-id="z"></i>"#);
        let ids: Vec<_> = ids.into_iter().collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn appends_missing_ids_before_body_close() {
        let markup = "<body>\n<div id=\"display\"></div>\n</body>";
        let js = "document.getElementById('display'); document.getElementById('history');";
        let out = reconcile_elements(markup, js);
        assert_eq!(out.added_ids, vec!["history".to_string()]);
        assert_eq!(
            out.markup,
            "<body>\n<div id=\"display\"></div>\n<div id=\"history\" data-artisan-placeholder=\"true\" hidden></div>\n</body>"
        );
    }

    #[test]
    fn appends_at_end_without_body() {
        let out = reconcile_elements("<div></div>", "document.getElementById('out')");
        assert!(out.markup.ends_with("<div id=\"out\" data-artisan-placeholder=\"true\" hidden></div>\n"));
        assert!(out.markup.starts_with("<div></div>\n"));
    }

    #[test]
    fn no_change_when_all_defined() {
        let markup = "<div id=\"out\"></div>";
        let out = reconcile_elements(markup, "document.getElementById('out')");
        assert!(out.added_ids.is_empty());
        assert_eq!(out.markup, markup);
    }

    #[test]
    fn reconciliation_is_stable() {
        let js = "document.getElementById('a'); document.querySelector('#b');";
        let once = reconcile_elements("", js);
        let twice = reconcile_elements(&once.markup, js);
        assert!(twice.added_ids.is_empty());
        assert_eq!(twice.markup, once.markup);
    }
}
