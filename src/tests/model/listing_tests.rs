    use super::*;
    use serde_json::json;

    fn paths(listing: &RemoteListing) -> Vec<String> {
        listing
            .entries()
            .iter()
            .map(|e| e.path.to_string())
            .collect()
    }

    #[test]
    fn from_value_flattens_nested_levels() {
        let listing = RemoteListing::from_value(json!({
            "README.md": {"file": true},
            "src": {
                "main.rs": {"file": "uploads/abc"},
                "util": {"io.rs": {"file": {"size": 3, "blake3": "ff"}}}
            }
        }))
        .expect("parse listing");

        assert_eq!(paths(&listing), ["README.md", "src/main.rs", "src/util/io.rs"]);
        assert_eq!(listing.entries()[0].marker, LeafMarker::default());
        assert_eq!(listing.entries()[1].marker.key.as_deref(), Some("uploads/abc"));
        assert_eq!(listing.entries()[2].marker.size, Some(3));
        assert_eq!(listing.entries()[2].marker.blake3.as_deref(), Some("ff"));
    }

    #[test]
    fn empty_object_is_an_empty_listing() {
        let listing = RemoteListing::from_value(json!({})).expect("parse listing");
        assert!(listing.is_empty());
    }

    #[test]
    fn from_value_rejects_malformed_shapes() {
        let cases = [
            json!([]),
            json!({"a": 1}),
            json!({"a": {"file": true, "extra": 1}}),
            json!({"a": {"file": false}}),
            json!({"a": {"file": {"unknown": 1}}}),
        ];
        for case in cases {
            match RemoteListing::from_value(case.clone()) {
                Err(ValidationError::MalformedListing { .. }) => {}
                other => panic!("{}: expected MalformedListing, got {:?}", case, other),
            }
        }
    }

    #[test]
    fn from_value_rejects_reserved_names() {
        let err = RemoteListing::from_value(json!({"..": {"file": true}})).unwrap_err();
        assert!(matches!(err, ValidationError::ReservedSegment { .. }), "{:?}", err);
    }

    #[test]
    fn slash_in_a_name_does_not_alias_a_nested_path() {
        let nested = json!({"a/b": {"file": true}, "a": {"b": {"file": true}}});
        let err = RemoteListing::from_value(nested.clone()).unwrap_err();
        assert!(
            matches!(err, ValidationError::SeparatorInSegment { ref segment, .. } if segment == "a/b"),
            "{:?}",
            err
        );

        let body = serde_json::to_vec(&json!({"tree": nested})).expect("encode");
        let err = ListResponse::decode(&body).unwrap_err();
        assert!(
            matches!(
                err,
                crate::Error::Validation(ValidationError::SeparatorInSegment { .. })
            ),
            "{:?}",
            err
        );
    }

    fn nested_body(depth: usize) -> String {
        let mut body = String::from(r#"{"tree":"#);
        for _ in 0..depth {
            body.push_str(r#"{"d":"#);
        }
        body.push_str(r#"{"leaf.txt":{"file":true}}"#);
        for _ in 0..depth {
            body.push('}');
        }
        body.push('}');
        body
    }

    #[test]
    fn decode_accepts_listings_deeper_than_the_json_nesting_limit() {
        let depth = 3000;
        let listing = ListResponse::decode(nested_body(depth).as_bytes()).expect("decode");
        assert_eq!(listing.entries().len(), 1);
        let path = &listing.entries()[0].path;
        assert_eq!(path.depth(), depth + 1);
        assert_eq!(path.name(), "leaf.txt");
        assert!(path.parent_segments().iter().all(|s| s == "d"));

        let truncated = nested_body(300);
        let err = ListResponse::decode(&truncated.as_bytes()[..truncated.len() - 5]).unwrap_err();
        assert!(
            matches!(err, crate::Error::Network(NetworkError::Decode(_))),
            "{:?}",
            err
        );
    }

    #[test]
    fn decode_reports_where_the_shape_breaks() {
        let err = ListResponse::decode(br#"{"tree": {"src": {"lib.rs": 7}}}"#).unwrap_err();
        match err {
            crate::Error::Validation(ValidationError::MalformedListing { path, .. }) => {
                assert_eq!(path, "src/lib.rs");
            }
            other => panic!("expected MalformedListing, got {:?}", other),
        }

        let err = ListResponse::decode(br#"{"tree": {"a": {"file": true, "x": {}}}}"#)
            .unwrap_err();
        assert!(
            matches!(
                err,
                crate::Error::Validation(ValidationError::MalformedListing { .. })
            ),
            "{:?}",
            err
        );

        let listing = ListResponse::decode(br#"{"version": 2, "tree": {"a": {"file": "k"}}}"#)
            .expect("decode with extra envelope fields");
        assert_eq!(paths(&listing), ["a"]);
    }

    #[test]
    fn to_value_nests_and_reparses() {
        let entries = vec![
            ListingEntry {
                path: RepoPath::parse("a/b.txt").expect("parse"),
                marker: LeafMarker {
                    size: Some(1),
                    ..LeafMarker::default()
                },
            },
            ListingEntry {
                path: RepoPath::parse("c.txt").expect("parse"),
                marker: LeafMarker::default(),
            },
        ];
        let listing = RemoteListing::new(entries);
        let value = listing.to_value().expect("render");
        assert_eq!(
            value,
            json!({"a": {"b.txt": {"file": {"size": 1}}}, "c.txt": {"file": {}}})
        );
        assert_eq!(RemoteListing::from_value(value).expect("reparse"), listing);
    }

    #[test]
    fn to_value_detects_conflicts() {
        let leaf = |raw: &str| ListingEntry {
            path: RepoPath::parse(raw).expect("parse"),
            marker: LeafMarker::default(),
        };

        let conflict = RemoteListing::new(vec![leaf("a"), leaf("a/b")]).to_value();
        assert_eq!(
            conflict,
            Err(ValidationError::ConflictingNodeKind {
                path: RepoPath::parse("a").expect("parse")
            })
        );

        let duplicate = RemoteListing::new(vec![leaf("x/y"), leaf("x/y")]).to_value();
        assert!(matches!(duplicate, Err(ValidationError::DuplicatePath { .. })));
    }

    #[test]
    fn decode_separates_json_errors_from_shape_errors() {
        let listing = ListResponse::decode(br#"{"tree": {"a.txt": {"file": true}}}"#)
            .expect("decode");
        assert_eq!(paths(&listing), ["a.txt"]);

        let err = ListResponse::decode(b"not json").unwrap_err();
        assert!(
            matches!(err, crate::Error::Network(NetworkError::Decode(_))),
            "{:?}",
            err
        );

        let err = ListResponse::decode(br#"{"files": {}}"#).unwrap_err();
        assert!(
            matches!(
                err,
                crate::Error::Validation(ValidationError::MalformedListing { .. })
            ),
            "{:?}",
            err
        );
    }

    #[test]
    fn list_response_serializes_nested_tree() {
        let body = ListResponse {
            tree: RemoteListing::new(vec![ListingEntry {
                path: RepoPath::parse("d/e").expect("parse"),
                marker: LeafMarker::default(),
            }]),
        };
        let value = serde_json::to_value(&body).expect("serialize");
        assert_eq!(value, json!({"tree": {"d": {"e": {"file": {}}}}}));

        let back: ListResponse = serde_json::from_value(value).expect("deserialize");
        assert_eq!(back.tree, body.tree);
    }
