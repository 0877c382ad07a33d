//! Binding store file format tests

use proptest::prelude::*;
use serverwatch::models::ReportId;
use serverwatch::storage::BindingStore;
use std::collections::BTreeMap;
use tempfile::TempDir;

fn identity() -> impl Strategy<Value = String> {
    "[A-Za-z0-9]([A-Za-z0-9 #:_.-]{0,20}[A-Za-z0-9])?"
}

proptest! {
    #[test]
    fn parse_never_panics(content in "\\PC*") {
        let store = BindingStore::parse("embeds.txt", &content);
        prop_assert!(store.len() <= content.lines().count());
    }

    #[test]
    fn rendered_bindings_parse_back(
        bindings in prop::collection::btree_map(identity(), any::<u64>(), 0..16)
    ) {
        let mut store = BindingStore::empty("embeds.txt");
        for (name, id) in &bindings {
            store.upsert(name.clone(), ReportId(*id));
        }

        let parsed = BindingStore::parse("embeds.txt", &store.render());
        prop_assert!(parsed.warnings().is_empty());

        let restored: BTreeMap<String, u64> = parsed
            .iter()
            .map(|(name, id)| (name.to_string(), id.0))
            .collect();
        prop_assert_eq!(restored, bindings);
    }
}

#[test]
fn test_file_survives_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("embeds.txt");

    let mut store = BindingStore::load(&path).unwrap();
    store.upsert("EU: Public #1", ReportId(1_234_567_890_123_456_789));
    store.upsert("Alpha", ReportId(500));
    store.persist().unwrap();

    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "Alpha:500\nEU: Public #1:1234567890123456789\n"
    );

    let mut reloaded = BindingStore::load(&path).unwrap();
    assert_eq!(reloaded.get("EU: Public #1"), Some(ReportId(1_234_567_890_123_456_789)));

    reloaded.remove("Alpha");
    reloaded.persist().unwrap();
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "EU: Public #1:1234567890123456789\n"
    );
}

#[test]
fn test_hand_edited_file_is_tolerated() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("embeds.txt");
    std::fs::write(&path, "  Alpha:500  \r\n\n# comment\nBravo:600\nAlpha:700\n").unwrap();

    let store = BindingStore::load(&path).unwrap();

    assert_eq!(store.get("Alpha"), Some(ReportId(700)));
    assert_eq!(store.get("Bravo"), Some(ReportId(600)));
    assert_eq!(store.len(), 2);
    // one malformed line and one duplicate
    assert_eq!(store.warnings().len(), 2);
}

#[test]
fn test_unreadable_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("embeds.txt");
    std::fs::create_dir(&path).unwrap();

    assert!(BindingStore::load(&path).is_err());
}
