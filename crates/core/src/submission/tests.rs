use super::*;

fn store_with(ids: &[&str]) -> SubmissionStore {
    let mut store = SubmissionStore::new();
    for id in ids {
        store
            .add(id, vec![Source::new("main.c", format!("int {id};"))])
            .unwrap();
    }
    store
}

#[test]
fn ids_drop_the_trailing_extension_only() {
    assert_eq!(strip_extension("alice.zip"), "alice");
    assert_eq!(strip_extension("bob.tar.gz"), "bob.tar");
    assert_eq!(strip_extension("carol"), "carol");
    assert_eq!(strip_extension(".hidden"), ".hidden");
}

#[test]
fn duplicate_ids_are_rejected() {
    let mut store = store_with(&["alice.zip"]);
    let err = store.add("alice.rar", Vec::new()).unwrap_err();
    assert!(matches!(err, Error::DuplicateSubmission(id) if id == "alice"));
    assert_eq!(store.len(), 1);
}

#[test]
fn indices_follow_insertion_order() {
    let store = store_with(&["b", "a", "c"]);
    let ids: Vec<_> = store.iter().map(|s| (s.index(), s.id().to_string())).collect();
    assert_eq!(
        ids,
        vec![
            (0, "b".to_string()),
            (1, "a".to_string()),
            (2, "c".to_string())
        ]
    );
    assert_eq!(store.by_id("a").map(Submission::index), Some(1));
}

#[test]
fn typed_accessors_report_missing_and_mistyped_keys() {
    let mut store = store_with(&["a"]);
    let sub = store.get_mut(0).unwrap();
    sub.insert("size", Value::Size(12));
    sub.insert("row", Value::Row(vec![0.0, 0.5]));

    assert_eq!(sub.size("size").unwrap(), 12);
    assert!(matches!(sub.text("size"), Err(MetricError::WrongType { .. })));
    assert!(matches!(sub.text("nope"), Err(MetricError::MissingKey(_))));
    assert_eq!(sub.distance_to("row", 1).unwrap(), 0.5);
    assert!(matches!(
        sub.distance_to("row", 7),
        Err(MetricError::MissingColumn { index: 7, .. })
    ));
}

#[test]
fn annotations_round_trip_through_json() {
    let mut note = Annotation::new("reviewer", Label::NotCopy);
    note.target = Some("bob".to_string());
    note.commentary = Some("shared skeleton".to_string());
    let json = serde_json::to_string(&note).unwrap();
    assert!(json.contains("\"not-copy\""));
    let back: Annotation = serde_json::from_str(&json).unwrap();
    assert_eq!(back, note);
}

#[test]
fn code_concatenates_sources_in_order() {
    let mut store = SubmissionStore::new();
    store
        .add(
            "x",
            vec![Source::new("a.c", "int a;"), Source::new("b.c", "int b;")],
        )
        .unwrap();
    assert_eq!(store.get(0).unwrap().code(), "int a;int b;");
}
