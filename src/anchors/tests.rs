use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::*;
use crate::dom::{ANNOTATION_ATTR, LINE_WRAPPER_ATTR};
use crate::model::{AnchorColors, AnchorKind};

fn engine(catalog: CatalogIndex) -> AnchorEngine {
    AnchorEngine::new(Arc::new(catalog), EngineConfig::default()).expect("engine builds")
}

fn contact_catalog() -> CatalogIndex {
    CatalogIndex::default()
        .with_person("42", "Jan Kowalski")
        .with_email("jan.kowalski@example.com", "42")
        .with_phone("583471234", "42")
}

#[test]
fn contact_details_in_one_line_link_to_the_same_person() {
    let engine = engine(contact_catalog());
    let mut doc = Document::parse_html(
        "<body><p>Kontakt: jan.kowalski@example.com, tel. 58 347 12 34</p></body>",
    );

    let anchors = engine.find_anchors(&mut doc);
    assert!(anchors.dropped.is_empty());
    assert_eq!(anchors.linked.len(), 2);

    let email = &anchors.linked[0];
    assert_eq!(email.kind, AnchorKind::Email);
    assert_eq!(email.value, "jan.kowalski@example.com");
    assert_eq!(email.per_id.as_deref(), Some("42"));
    assert_eq!(email.name.as_deref(), Some("Jan Kowalski"));
    assert_eq!(email.source, "det:text");
    assert_eq!(email.score, Some(1.0));

    let phone = &anchors.linked[1];
    assert_eq!(phone.kind, AnchorKind::Phone);
    assert_eq!(phone.value, "583471234");
    assert_eq!(phone.per_id.as_deref(), Some("42"));
    assert_eq!(doc.text_content(phone.trigger_node, ""), "58 347 12 34");

    let html = doc.to_html();
    assert!(html.contains(r#"data-annot="email""#));
    assert!(html.contains(r#"data-annot="phone""#));
}

#[test]
fn unit_label_in_block_is_matched_deterministically() {
    let catalog = CatalogIndex::default().with_unit("dziekanat wydzialu x", "7", "Dziekanat Wydziału X");
    let engine = engine(catalog);
    let mut doc = Document::parse_html("<body><div><p>Dziekanat Wydziału X</p></div></body>");

    let anchors = engine.find_anchors(&mut doc);
    assert!(anchors.dropped.is_empty());
    assert_eq!(anchors.linked.len(), 1);

    let unit = &anchors.linked[0];
    assert_eq!(unit.kind, AnchorKind::Unit);
    assert_eq!(unit.per_id.as_deref(), Some("7"));
    assert_eq!(unit.score, None);
    assert_eq!(unit.source, "det:label");
    assert_eq!(unit.value, "Dziekanat Wydziału X");
    assert_eq!(doc.attr(unit.node, ANNOTATION_ATTR), Some("unit"));
}

#[test]
fn close_block_text_is_matched_fuzzily_with_a_rounded_score() {
    let catalog = CatalogIndex::default().with_procedure(
        "wniosek o przyznanie stypendium rektora dla najlepszych studentow uczelni",
        "3",
        "Stypendium rektora",
    );
    let config = EngineConfig {
        similarity: Similarity::Jaccard,
        ..EngineConfig::default()
    };
    let engine = AnchorEngine::new(Arc::new(catalog), config).expect("engine builds");
    let mut doc = Document::parse_html(
        "<body><p>Stypendium rektora: wniosek o przyznanie dla najlepszych studentów uczelni PG</p></body>",
    );

    let anchors = engine.find_anchors(&mut doc);
    assert_eq!(anchors.linked.len(), 1);

    let procedure = &anchors.linked[0];
    assert_eq!(procedure.kind, AnchorKind::Procedure);
    assert_eq!(procedure.per_id.as_deref(), Some("3"));
    assert_eq!(procedure.name.as_deref(), Some("Stypendium rektora"));
    assert_eq!(procedure.score, Some(0.9));
    assert_eq!(procedure.source, "fuzz:alias");
    assert!(doc.is_element(procedure.node, "p"));
    assert_eq!(procedure.node, procedure.trigger_node);
}

#[test]
fn blocks_with_deterministic_hits_get_no_fuzzy_attempt() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let catalog = CatalogIndex::default()
        .with_unit("dziekanat wydzialu x", "7", "Dziekanat Wydziału X")
        .with_procedure("dziekanski urlop wniosek", "5", "Urlop dziekański")
        .with_acronyms("5", &["UD"]);
    let config = EngineConfig::default().with_acronym_policy(move |_: &str, _: &str| {
        counter.fetch_add(1, Ordering::SeqCst);
        true
    });
    let engine = AnchorEngine::new(Arc::new(catalog), config).expect("engine builds");
    let mut doc = Document::parse_html(
        "<body><p>Dziekanat Wydziału X: wniosek o urlop dziekański</p>\
         <p>Wniosek o urlop dziekański</p></body>",
    );

    let anchors = engine.find_anchors(&mut doc);
    let summary: Vec<(AnchorKind, &str)> = anchors
        .linked
        .iter()
        .map(|anchor| (anchor.kind, anchor.source.as_str()))
        .collect();
    assert_eq!(
        summary,
        vec![
            (AnchorKind::Unit, "det:label"),
            (AnchorKind::Procedure, "fuzz:alias+acron"),
        ]
    );
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn nested_blocks_each_get_their_own_fuzzy_attempt() {
    let catalog = CatalogIndex::default()
        .with_procedure("wniosek o urlop dziekanski", "5", "Urlop dziekański")
        .with_unit("biuro karier", "8", "Biuro Karier");
    let engine = engine(catalog);
    let mut doc = Document::parse_html(
        "<body><div>Dziekański urlop, wniosek o<p>Karier biuro</p></div></body>",
    );

    let anchors = engine.find_anchors(&mut doc);
    let summary: Vec<(AnchorKind, &str, Option<&str>)> = anchors
        .linked
        .iter()
        .map(|anchor| (anchor.kind, anchor.source.as_str(), anchor.per_id.as_deref()))
        .collect();
    assert_eq!(
        summary,
        vec![
            (AnchorKind::Procedure, "fuzz:alias", Some("5")),
            (AnchorKind::Unit, "fuzz:label", Some("8")),
        ]
    );
    assert!(doc.is_element(anchors.linked[0].node, "div"));
    assert!(doc.is_element(anchors.linked[1].node, "p"));
    assert_eq!(anchors.linked[1].score, Some(1.0));
}

#[test]
fn procedure_wins_when_both_kinds_clear_the_threshold() {
    let catalog = CatalogIndex::default()
        .with_procedure("praktyki wniosek", "4", "Praktyki studenckie")
        .with_unit("karier biuro", "8", "Biuro Karier");
    let engine = engine(catalog);
    let mut doc = Document::parse_html("<body><p>Biuro karier: wniosek o praktyki</p></body>");

    let anchors = engine.find_anchors(&mut doc);
    assert_eq!(anchors.linked.len(), 1);
    assert!(anchors.dropped.is_empty());

    let procedure = &anchors.linked[0];
    assert_eq!(procedure.kind, AnchorKind::Procedure);
    assert_eq!(procedure.per_id.as_deref(), Some("4"));
    assert_eq!(procedure.source, "fuzz:alias");
    assert_eq!(procedure.score, Some(1.0));
}

#[test]
fn near_miss_alias_clears_the_default_threshold() {
    let catalog = CatalogIndex::default().with_procedure("wniosek o urlopami", "6", "Urlop");
    let engine = engine(catalog);
    let mut doc = Document::parse_html("<body><p>wniosek o urlop</p></body>");

    let anchors = engine.find_anchors(&mut doc);
    assert_eq!(anchors.linked.len(), 1);
    assert_eq!(anchors.linked[0].per_id.as_deref(), Some("6"));
    assert_eq!(anchors.linked[0].score, Some(0.909));
}

#[test]
fn failing_acronym_policy_blocks_the_procedure_match() {
    let catalog = CatalogIndex::default()
        .with_procedure("indywidualna organizacja studiow", "9", "IOS")
        .with_acronyms("9", &["IOS"]);
    let config = EngineConfig::default().with_acronym_policy(|_: &str, _: &str| false);
    let engine = AnchorEngine::new(Arc::new(catalog), config).expect("engine builds");
    let mut doc = Document::parse_html("<body><p>Organizacja studiów indywidualna</p></body>");

    let anchors = engine.find_anchors(&mut doc);
    assert!(anchors.linked.is_empty());
    assert!(anchors.dropped.is_empty());
}

#[test]
fn permissive_default_policy_accepts_gated_procedures() {
    let catalog = CatalogIndex::default()
        .with_procedure("indywidualna organizacja studiow", "9", "IOS")
        .with_acronyms("9", &["IOS"]);
    let engine = engine(catalog);
    let mut doc = Document::parse_html("<body><p>Organizacja studiów indywidualna</p></body>");

    let anchors = engine.find_anchors(&mut doc);
    assert_eq!(anchors.linked.len(), 1);
    assert_eq!(anchors.linked[0].source, "fuzz:alias+acron");
    assert_eq!(anchors.linked[0].score, Some(1.0));
}

#[test]
fn every_candidate_is_either_linked_or_dropped() {
    let engine = engine(contact_catalog());
    let mut doc = Document::parse_html(
        "<body><ul><li>jan.kowalski@example.com</li>\
         <li>nieznany@example.com</li>\
         <li>tel. 601 234 567</li>\
         <li><a href=\"mailto:Inny@Example.com\">napisz</a></li></ul></body>",
    );

    let anchors = engine.find_anchors(&mut doc);
    assert_eq!(anchors.linked.len() + anchors.dropped.len(), 4);
    assert!(anchors.linked.iter().all(|anchor| anchor.per_id.is_some()));
    assert!(anchors.dropped.iter().all(|anchor| anchor.per_id.is_none() && anchor.name.is_none()));
    assert!(anchors.dropped.iter().all(|anchor| anchor.source.ends_with("|unlinked")));

    let dropped: Vec<&str> = anchors.dropped.iter().map(|anchor| anchor.source.as_str()).collect();
    assert_eq!(
        dropped,
        vec!["det:mailto|unlinked", "det:text|unlinked", "det:text|unlinked"]
    );

    let fallback = engine.config().palette.colors_for(None);
    assert!(anchors.dropped.iter().all(|anchor| anchor.colors.as_ref() == Some(&fallback)));
}

#[test]
fn colors_are_stable_per_identifier_across_documents() {
    let engine = engine(contact_catalog());
    let mut first = Document::parse_html("<body><p>jan.kowalski@example.com</p></body>");
    let mut second = Document::parse_html("<body><p>tel. 58 347 12 34</p></body>");

    let first = engine.find_anchors(&mut first);
    let second = engine.find_anchors(&mut second);
    let expected: AnchorColors = ColorPalette::default().colors_for(Some("42"));

    assert_eq!(first.linked[0].colors.as_ref(), Some(&expected));
    assert_eq!(second.linked[0].colors.as_ref(), Some(&expected));
    assert_ne!(expected, ColorPalette::default().colors_for(None));
}

#[test]
fn person_name_anchor_is_widened_to_its_line() {
    let engine = engine(contact_catalog());
    let mut doc = Document::parse_html(
        "<body><p>dr inż. Jan Kowalski<br>tel. 58 347 12 34</p></body>",
    );

    let anchors = engine.find_anchors(&mut doc);
    let person = anchors
        .linked
        .iter()
        .find(|anchor| anchor.kind == AnchorKind::PersonName)
        .expect("person name anchor");

    assert_eq!(person.value, "jan kowalski");
    assert_eq!(person.source, "det:name_regex");
    assert_eq!(person.score, None);
    assert_eq!(doc.attr(person.node, LINE_WRAPPER_ATTR), Some("person_name"));
    assert_eq!(doc.text_content(person.node, " "), "dr inż. Jan Kowalski");
    assert_eq!(doc.text_content(person.trigger_node, ""), "Jan Kowalski");
    assert!(doc.ancestors(person.trigger_node).any(|node| node == person.node));
}

#[test]
fn contact_links_are_not_detected_again_as_text() {
    let engine = engine(contact_catalog());
    let mut doc = Document::parse_html(
        "<body><p><a href=\"mailto:jan.kowalski@example.com\">jan.kowalski@example.com</a>\
         <a href=\"tel:+48%2058%20347%2012%2034\">58 347 12 34</a></p>\
         <script>var contact = \"jan.kowalski@example.com\";</script></body>",
    );

    let anchors = engine.find_anchors(&mut doc);
    let sources: Vec<(AnchorKind, &str)> = anchors
        .linked
        .iter()
        .map(|anchor| (anchor.kind, anchor.source.as_str()))
        .collect();
    assert_eq!(
        sources,
        vec![
            (AnchorKind::Email, "det:mailto"),
            (AnchorKind::Phone, "det:telhref"),
        ]
    );
    assert!(anchors.linked.iter().all(|anchor| doc.is_element(anchor.node, "a")));
    assert!(!doc.to_html().contains(r#"data-annot="email""#));
}

#[test]
fn empty_catalog_still_reports_unlinked_contacts() {
    let engine = engine(CatalogIndex::default());
    let mut doc = Document::parse_html("<body><p>biuro@example.com</p></body>");

    let anchors = engine.find_anchors(&mut doc);
    assert!(anchors.linked.is_empty());
    assert_eq!(anchors.dropped.len(), 1);
    assert_eq!(anchors.dropped[0].value, "biuro@example.com");
}

#[test]
fn threshold_outside_unit_interval_is_rejected() {
    let config = EngineConfig {
        fuzzy_threshold: 1.5,
        ..EngineConfig::default()
    };
    let result = AnchorEngine::new(Arc::new(CatalogIndex::default()), config);
    assert!(result.is_err());
}
