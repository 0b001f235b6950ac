use proptest::prelude::*;
use research_core::{
    MIN_ABSTRACT_WORDS, MIN_KEY_INSIGHTS, MIN_SOURCES, MIN_TOOLS_USED, enhance, has_leakage,
    normalize, parse, synthesize_sources,
};

proptest! {
    #[test]
    fn parse_is_total(raw in ".{0,400}", topic in "[A-Za-z][A-Za-z0-9 ]{0,30}") {
        let report = parse(&raw, &topic);
        prop_assert!(!report.has_empty_field());
        prop_assert!(report.abstract_text.split_whitespace().count() >= MIN_ABSTRACT_WORDS);
        prop_assert!(report.sources.len() >= MIN_SOURCES);
        prop_assert!(report.tools_used.len() >= MIN_TOOLS_USED);
        prop_assert!(report.key_insights.len() >= MIN_KEY_INSIGHTS);
    }

    #[test]
    fn enhancement_is_idempotent(raw in ".{0,400}", topic in "[A-Za-z][A-Za-z0-9 ]{0,30}") {
        let once = parse(&raw, &topic);
        let twice = enhance(once.clone(), &topic);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn normalized_findings_never_leak(
        prefix in "[a-z ]{0,40}",
        topic in "[A-Za-z][A-Za-z0-9 ]{0,30}",
    ) {
        let raw = format!(
            r#"{prefix} {{"topic":"t","abstract":"a","detailed_findings":"{{\"topic\": \"t\"}} {}"}}"#,
            "padding ".repeat(60)
        );
        let report = normalize(&raw, &topic);
        prop_assert!(!has_leakage(&report.detailed_findings));
    }

    #[test]
    fn normalize_never_leaks_for_arbitrary_input(
        raw in prop_oneof![
            ".{0,400}",
            r#"[{}":, a-z_]{0,300}"#,
            "[a-z ]{0,40}".prop_map(|prefix| format!(
                r#"{prefix} {{"detailed_findings": "{{\"abstract\": 1}}"}}"#
            )),
        ],
        topic in "[A-Za-z][A-Za-z0-9 ]{0,30}",
    ) {
        let report = normalize(&raw, &topic);
        prop_assert!(!has_leakage(&report.detailed_findings));
        prop_assert!(!report.has_empty_field());
    }

    #[test]
    fn binary_input_is_handled_like_text(
        bytes in prop::collection::vec(any::<u8>(), 0..400),
        topic in "[A-Za-z][A-Za-z0-9 ]{0,30}",
    ) {
        let raw = String::from_utf8_lossy(&bytes);
        let parsed = parse(&raw, &topic);
        prop_assert!(!parsed.has_empty_field());
        prop_assert!(parsed.sources.len() >= MIN_SOURCES);

        let normalized = normalize(&raw, &topic);
        prop_assert!(!normalized.has_empty_field());
        prop_assert!(!has_leakage(&normalized.detailed_findings));
    }

    #[test]
    fn synthesized_sources_are_bounded_and_unique(
        topic in "[A-Za-z][A-Za-z0-9 ]{0,30}",
        count in 0usize..20,
    ) {
        let sources = synthesize_sources(&topic, count);
        prop_assert!(sources.len() <= count);
        let mut deduped = sources.clone();
        deduped.sort();
        deduped.dedup();
        prop_assert_eq!(deduped.len(), sources.len());
    }
}
