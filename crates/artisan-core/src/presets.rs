//! Archetype presets
//!
//! A small static table of well-known artifact shapes. Each preset adds a
//! paragraph to the generation prompt and a short checklist the artifact's
//! self-check routine is expected to cover. Tags the model invents that do
//! not match a preset resolve to `None`.

use serde::Serialize;

/// A named generation-prompt template
#[derive(Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchetypePreset {
    /// Canonical tag
    pub id: &'static str,
    /// Intent category the preset belongs to
    pub category: &'static str,
    /// Alternative tags that resolve to this preset
    #[serde(skip)]
    pub aliases: &'static [&'static str],
    /// Paragraph appended to the generation prompt
    pub prompt_addendum: &'static str,
    /// What the self-check routine must verify
    pub self_test_checklist: &'static [&'static str],
}

/// Built-in presets
pub static PRESETS: &[ArchetypePreset] = &[
    ArchetypePreset {
        id: "calculator",
        category: "utilities",
        aliases: &["calc", "arithmetic"],
        prompt_addendum: "Build a keypad-driven calculator. Evaluate expressions only through \
            window.__safeEvaluate(expression); never use eval or the Function constructor. \
            Show 'Error' in the display when evaluation throws.",
        self_test_checklist: &[
            "2+2 evaluates to 4",
            "(2+3)*4 evaluates to 20",
            "division by zero shows an error instead of Infinity",
        ],
    },
    ArchetypePreset {
        id: "todo-list",
        category: "productivity",
        aliases: &["todo", "task-list", "checklist"],
        prompt_addendum: "Build a task list with add, toggle-complete and delete. Persist \
            items in localStorage under a single key and render from that state.",
        self_test_checklist: &[
            "adding an item increases the item count",
            "toggling marks an item complete",
            "deleting removes the item",
        ],
    },
    ArchetypePreset {
        id: "timer",
        category: "utilities",
        aliases: &["stopwatch", "countdown", "pomodoro"],
        prompt_addendum: "Build a timer with start, pause and reset controls. Drive ticks \
            with setInterval(function, ms) and clear the interval on pause and reset.",
        self_test_checklist: &[
            "reset returns the display to the initial value",
            "start then pause leaves no running interval",
        ],
    },
    ArchetypePreset {
        id: "unit-converter",
        category: "utilities",
        aliases: &["converter"],
        prompt_addendum: "Build a unit converter with a value input and from/to selectors. \
            Keep conversion factors in a plain lookup table.",
        self_test_checklist: &[
            "converting to the same unit returns the input",
            "a known conversion matches its expected value",
        ],
    },
    ArchetypePreset {
        id: "quiz",
        category: "education",
        aliases: &["flashcards", "trivia"],
        prompt_addendum: "Build a quiz that shows one question at a time, records answers \
            and shows a score at the end. Keep questions in a JS array.",
        self_test_checklist: &[
            "answering correctly increments the score",
            "the final screen shows the total",
        ],
    },
    ArchetypePreset {
        id: "game",
        category: "games",
        aliases: &["arcade", "puzzle"],
        prompt_addendum: "Build a small self-contained game on a canvas or DOM grid with a \
            visible score and a restart control. Use requestAnimationFrame for animation.",
        self_test_checklist: &[
            "restart resets the score to zero",
            "the game state initializes without errors",
        ],
    },
    ArchetypePreset {
        id: "chart",
        category: "visualization",
        aliases: &["graph", "plot", "dashboard"],
        prompt_addendum: "Render charts with inline SVG built via createElementNS; do not load \
            external charting libraries. Include axis labels and a legend.",
        self_test_checklist: &[
            "the chart renders one mark per data point",
            "empty data shows an empty-state message",
        ],
    },
];

fn normalize_tag(tag: &str) -> String {
    tag.trim()
        .to_ascii_lowercase()
        .chars()
        .map(|c| if c == '_' || c.is_whitespace() { '-' } else { c })
        .collect()
}

/// Resolve an archetype tag against the preset table
///
/// Matching ignores case and treats `_` and spaces as `-`. Unknown tags
/// resolve to `None`.
#[must_use]
pub fn resolve_preset(tag: &str) -> Option<&'static ArchetypePreset> {
    let tag = normalize_tag(tag);
    if tag.is_empty() {
        return None;
    }
    PRESETS
        .iter()
        .find(|p| p.id == tag || p.aliases.contains(&tag.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_ids_and_aliases() {
        assert_eq!(resolve_preset("calculator").map(|p| p.id), Some("calculator"));
        assert_eq!(resolve_preset("Todo_List").map(|p| p.id), Some("todo-list"));
        assert_eq!(resolve_preset(" stopwatch ").map(|p| p.id), Some("timer"));
        assert_eq!(resolve_preset("Task List").map(|p| p.id), Some("todo-list"));
    }

    #[test]
    fn unknown_tags_resolve_to_none() {
        assert!(resolve_preset("spreadsheet").is_none());
        assert!(resolve_preset("").is_none());
    }

    #[test]
    fn ids_are_unique_and_checklists_present() {
        let mut ids: Vec<_> = PRESETS.iter().map(|p| p.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), PRESETS.len());
        assert!(PRESETS.iter().all(|p| !p.self_test_checklist.is_empty()));
    }

    #[test]
    fn addenda_pass_the_scanner() {
        for preset in PRESETS {
            let issues = artisan_guard::scanner::scan_source(
                artisan_artifact::Surface::Behavior,
                preset.prompt_addendum,
            );
            assert!(issues.is_empty(), "{} addendum trips {issues:?}", preset.id);
        }
    }
}
