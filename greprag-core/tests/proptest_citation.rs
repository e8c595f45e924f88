//! Property-based tests for citation extraction using proptest.

use proptest::prelude::*;

use greprag_core::citation::{CitationParser, CitationSet};

fn words() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z ]{0,30}".prop_map(|s| s.trim().to_string())
}

fn unicode_words() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop::sample::select(vec!["café", "naïve", "日本語", "Ünïcödé", "straße", "résumé"]),
        1..6,
    )
    .prop_map(|parts| parts.join(" "))
}

// --- Flat dialect ---

proptest! {
    #[test]
    fn flat_line_yields_its_content(
        name in "[a-z]{1,8}",
        line in 1u32..100_000,
        content in words(),
    ) {
        let raw = format!("docs/{name}.txt:{line}:{content}");
        let citations = CitationParser::default().parse(&raw);
        prop_assert_eq!(citations.len(), 1);
        prop_assert_eq!(&citations[0].location, &format!("{name}.txt"));
        prop_assert_eq!(&citations[0].text, &content);
    }

    #[test]
    fn unicode_content_is_preserved(name in "[a-z]{1,8}", content in unicode_words()) {
        let raw = format!("docs/{name}.md-4-{content}");
        let citations = CitationParser::default().parse(&raw);
        prop_assert_eq!(citations.len(), 1);
        prop_assert_eq!(&citations[0].text, &content);
    }

    #[test]
    fn location_is_last_path_segment(
        dirs in prop::collection::vec("[a-z]{1,6}", 0..5),
        name in "[a-z]{1,8}",
    ) {
        let mut path = String::from("docs/");
        for dir in &dirs {
            path.push_str(dir);
            path.push('/');
        }
        let raw = format!("{path}{name}.pdf:7:page text");
        let citations = CitationParser::default().parse(&raw);
        prop_assert_eq!(citations.len(), 1);
        prop_assert_eq!(&citations[0].location, &format!("{name}.pdf"));
    }
}

// --- Grouped dialect ---

proptest! {
    #[test]
    fn grouped_block_joins_lines(
        name in "[a-z]{1,8}",
        lines in prop::collection::vec(words(), 1..8),
    ) {
        let mut raw = format!("docs/{name}.md\n");
        for (i, line) in lines.iter().enumerate() {
            let sep = if i % 2 == 0 { ':' } else { '-' };
            raw.push_str(&format!("{}{sep}{line}\n", i + 1));
        }
        let citations = CitationParser::default().parse(&raw);
        prop_assert_eq!(citations.len(), 1);
        prop_assert_eq!(&citations[0].location, &format!("{name}.md"));
        prop_assert_eq!(&citations[0].text, &lines.join(" "));
    }

    #[test]
    fn separators_split_blocks(
        names in prop::collection::vec("[a-z]{1,8}", 1..6),
    ) {
        let raw = names
            .iter()
            .map(|name| format!("docs/{name}.txt:1:about {name}"))
            .collect::<Vec<_>>()
            .join("\n--\n");
        let citations = CitationParser::default().parse(&raw);
        prop_assert_eq!(citations.len(), names.len());
    }
}

// --- Robustness ---

proptest! {
    #[test]
    fn arbitrary_input_never_yields_empty_text(raw in any::<String>()) {
        for citation in CitationParser::default().parse(&raw) {
            prop_assert!(!citation.text.is_empty());
        }
    }

    #[test]
    fn parsing_is_deterministic(raw in "[a-z/.:0-9\\- \n]{0,200}") {
        let parser = CitationParser::default();
        prop_assert_eq!(parser.parse(&raw), parser.parse(&raw));
    }

    #[test]
    fn merging_twice_adds_nothing(
        names in prop::collection::vec("[a-z]{1,8}", 0..10),
    ) {
        let raw = names
            .iter()
            .map(|name| format!("docs/{name}.txt:1:about {name}"))
            .collect::<Vec<_>>()
            .join("\n--\n");
        let citations = CitationParser::default().parse(&raw);
        let mut set = CitationSet::new();
        let first = set.merge(citations.clone());
        let second = set.merge(citations);
        prop_assert_eq!(first, set.len());
        prop_assert_eq!(second, 0);
    }
}
