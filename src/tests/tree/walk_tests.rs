    use super::*;
    use crate::model::{Origin, RemoteObject, RepoRef};
    use crate::tree::build;

    fn tree(paths: &[&str]) -> RepositoryTree {
        let entries = paths.iter().map(|raw| {
            let path = RepoPath::parse(raw).expect("parse path");
            let leaf = LeafRef::RemoteObject(RemoteObject {
                owner_id: "o".to_string(),
                repo_id: "r".to_string(),
                path: path.clone(),
                digest: None,
            });
            (path, leaf)
        });
        build(RepoRef::new("o", "r"), Origin::Remote, entries).expect("build")
    }

    #[test]
    fn walk_is_preorder_in_name_order() {
        let tree = tree(&["b.txt", "a/z.txt", "a/c/d.txt", "a.txt"]);
        let visited: Vec<String> = tree.walk().map(|e| e.path.to_string()).collect();
        assert_eq!(visited, ["a", "a/c", "a/c/d.txt", "a/z.txt", "a.txt", "b.txt"]);
    }

    #[test]
    fn leaf_paths_equal_input_set() {
        let input = ["x/y/z", "x/w", "v", "x/y/u"];
        let tree = tree(&input);
        let expected: BTreeSet<RepoPath> = input
            .iter()
            .map(|raw| RepoPath::parse(raw).expect("parse"))
            .collect();
        assert_eq!(tree.leaf_paths(), expected);
        assert_eq!(tree.leaves().count(), input.len());
    }

    #[test]
    fn stats_count_files_and_directories() {
        let tree = tree(&["a/b/c", "a/d", "e"]);
        assert_eq!(tree.stats(), TreeStats { files: 3, dirs: 2 });
        assert_eq!(
            RepositoryTree::empty(RepoRef::new("o", "r"), Origin::Local).stats(),
            TreeStats::default()
        );
    }

    #[test]
    fn render_indents_by_depth() {
        let tree = tree(&["src/main.rs", "README.md"]);
        assert_eq!(tree.render(), "README.md\nsrc/\n  main.rs\n");
    }

    #[test]
    fn walk_handles_deep_trees() {
        let deep: Vec<String> = (0..256).map(|i| format!("d{}", i)).collect();
        let raw = format!("{}/leaf", deep.join("/"));
        let tree = tree(&[raw.as_str()]);
        assert_eq!(tree.stats(), TreeStats { files: 1, dirs: 256 });
    }

    fn chain(depth: usize) -> (RepositoryTree, RepoPath) {
        let mut segments = vec!["d".to_string(); depth];
        segments.push("leaf".to_string());
        let leaf = RepoPath::from_segments(segments).expect("path");
        (tree(&[leaf.to_string().as_str()]), leaf)
    }

    #[test]
    fn very_deep_trees_clone_compare_and_drop() {
        let depth = 20_000;
        let (deep, leaf) = chain(depth);
        assert_eq!(
            deep.stats(),
            TreeStats {
                files: 1,
                dirs: depth as u64
            }
        );

        let copy = deep.clone();
        assert!(copy == deep);
        assert!(copy.leaf(&leaf).is_some());
        drop(copy);

        let (shallower, _) = chain(depth - 1);
        assert!(shallower != deep);
        drop(shallower);
        drop(deep);
    }

    #[test]
    fn walk_visits_every_level_of_a_deep_chain() {
        let depth = 3000;
        let (deep, leaf) = chain(depth);

        let mut visited = 0;
        let mut last = None;
        for entry in deep.walk() {
            visited += 1;
            assert_eq!(entry.path.depth(), visited);
            last = Some(entry.path);
        }
        assert_eq!(visited, depth + 1);
        assert_eq!(last, Some(leaf));
    }

    #[test]
    fn clone_and_equality_follow_structure() {
        let original = tree(&["a/b/c", "a/d", "e"]);
        let copy = original.clone();
        assert_eq!(copy, original);
        assert_eq!(copy.render(), original.render());
        assert_ne!(tree(&["a/b/c", "a/d", "f"]), original);
        assert_ne!(tree(&["a/b/c", "a/d"]), original);
        assert_ne!(tree(&["a/b", "a/d", "e"]), original);
    }
