    use super::*;
    use crate::model::{BatchHandle, BlobSource, LeafMarker, ListingEntry, LocalBlob};

    fn repo() -> RepoRef {
        RepoRef::new("alice", "notes")
    }

    fn p(raw: &str) -> RepoPath {
        RepoPath::parse(raw).expect("parse path")
    }

    fn local(batch: &BatchHandle, raw: &str) -> (RepoPath, LeafRef) {
        let path = p(raw);
        let blob = LocalBlob::new(
            path.name(),
            BlobSource::Memory(raw.as_bytes().into()),
            batch.clone(),
        );
        (path, LeafRef::LocalBlob(blob))
    }

    fn remote(raw: &str) -> (RepoPath, LeafRef) {
        let path = p(raw);
        let object = RemoteObject {
            owner_id: "alice".to_string(),
            repo_id: "notes".to_string(),
            path: path.clone(),
            digest: None,
        };
        (path, LeafRef::RemoteObject(object))
    }

    fn permutations<T: Clone>(items: &[T]) -> Vec<Vec<T>> {
        if items.len() <= 1 {
            return vec![items.to_vec()];
        }
        let mut out = Vec::new();
        for i in 0..items.len() {
            let mut rest = items.to_vec();
            let head = rest.remove(i);
            for mut tail in permutations(&rest) {
                tail.insert(0, head.clone());
                out.push(tail);
            }
        }
        out
    }

    #[test]
    fn builds_nested_directories() {
        let batch = BatchHandle::new();
        let tree = build(
            repo(),
            Origin::Local,
            ["a/b/c.txt", "a/d.txt", "e.txt"].map(|raw| local(&batch, raw)),
        )
        .expect("build");

        assert!(matches!(tree.get(&p("a")), Some(TreeNode::Directory(_))));
        assert!(matches!(tree.get(&p("a/b")), Some(TreeNode::Directory(_))));
        assert!(tree.leaf(&p("a/b/c.txt")).is_some());
        assert!(tree.leaf(&p("a")).is_none());
        assert!(tree.get(&p("a/d.txt/x")).is_none());
        assert_eq!(tree.root().children.len(), 2);
        assert_eq!(tree.origin(), Origin::Local);
        assert_eq!(tree.owner_id(), "alice");
        assert_eq!(tree.repo_id(), "notes");
    }

    #[test]
    fn empty_input_builds_empty_tree() {
        let tree = build(repo(), Origin::Remote, Vec::<(RepoPath, LeafRef)>::new()).expect("build");
        assert!(tree.is_empty());
        assert_eq!(tree, RepositoryTree::empty(repo(), Origin::Remote));
    }

    #[test]
    fn shape_does_not_depend_on_entry_order() {
        let entries = vec![
            remote("a/b/c.txt"),
            remote("a/b/d.txt"),
            remote("a/e.txt"),
            remote("f.txt"),
        ];
        let expected = build(repo(), Origin::Remote, entries.clone()).expect("build");
        for order in permutations(&entries) {
            let tree = build(repo(), Origin::Remote, order).expect("build permutation");
            assert_eq!(tree, expected);
        }
    }

    #[test]
    fn file_directory_conflict_detected_in_any_order() {
        let entries = vec![remote("a"), remote("a/b.txt"), remote("c.txt")];
        for order in permutations(&entries) {
            let err = build(repo(), Origin::Remote, order.clone()).unwrap_err();
            assert_eq!(
                err,
                ValidationError::ConflictingNodeKind { path: p("a") },
                "order: {:?}",
                order.iter().map(|(path, _)| path.to_string()).collect::<Vec<_>>()
            );
        }
    }

    #[test]
    fn deep_conflict_reports_the_colliding_prefix() {
        let err = build(
            repo(),
            Origin::Remote,
            vec![remote("x/y"), remote("x/y/z/w.txt")],
        )
        .unwrap_err();
        assert_eq!(err, ValidationError::ConflictingNodeKind { path: p("x/y") });
    }

    #[test]
    fn duplicate_paths_are_rejected() {
        let err = build(repo(), Origin::Remote, vec![remote("a/b"), remote("a/b")]).unwrap_err();
        assert_eq!(err, ValidationError::DuplicatePath { path: p("a/b") });
    }

    #[test]
    fn leaves_must_match_tree_origin() {
        let batch = BatchHandle::new();
        let err = build(
            repo(),
            Origin::Remote,
            vec![remote("a.txt"), local(&batch, "b.txt")],
        )
        .unwrap_err();
        assert_eq!(err, ValidationError::MixedOrigin { path: p("b.txt") });

        let mut builder = TreeBuilder::new(repo(), Origin::Local);
        let (path, leaf) = remote("c.txt");
        assert!(builder.insert(path, leaf).is_err());
        assert!(builder.finish().is_empty());
    }

    #[test]
    fn from_listing_carries_identity_and_digest() {
        let listing = RemoteListing::new(vec![ListingEntry {
            path: p("docs/a.md"),
            marker: LeafMarker {
                blake3: Some("abc".to_string()),
                ..LeafMarker::default()
            },
        }]);
        let tree = from_listing(&repo(), listing).expect("from listing");
        assert_eq!(tree.origin(), Origin::Remote);
        match tree.leaf(&p("docs/a.md")) {
            Some(LeafRef::RemoteObject(object)) => {
                assert_eq!(object.owner_id, "alice");
                assert_eq!(object.repo_id, "notes");
                assert_eq!(object.path, p("docs/a.md"));
                assert_eq!(object.digest.as_deref(), Some("abc"));
            }
            other => panic!("expected remote object, got {:?}", other),
        }
    }
