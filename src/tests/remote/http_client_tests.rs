    use super::*;

    fn store(base_url: &str) -> HttpRemoteStore {
        HttpRemoteStore::new(RemoteConfig {
            base_url: base_url.to_string(),
            owner_id: "alice".to_string(),
            retries: 3,
        })
        .expect("build client")
    }

    #[test]
    fn url_appends_route_and_repo() {
        let repo = RepoRef::new("alice", "notes");
        let url = store("http://127.0.0.1:9000")
            .url("list-upload", &repo)
            .expect("url");
        assert_eq!(url.as_str(), "http://127.0.0.1:9000/repo/list-upload/alice/notes");

        let url = store("http://host/api/").url("upload", &repo).expect("url");
        assert_eq!(url.as_str(), "http://host/api/repo/upload/alice/notes");
    }

    #[test]
    fn url_escapes_ids() {
        let repo = RepoRef::new("a b", "x/y");
        let url = store("http://host").url("upload", &repo).expect("url");
        assert_eq!(url.as_str(), "http://host/repo/upload/a%20b/x%2Fy");
    }

    #[test]
    fn invalid_base_url_is_a_transport_error() {
        let repo = RepoRef::new("alice", "notes");
        let err = store("not a url").url("upload", &repo).unwrap_err();
        assert!(
            matches!(err, Error::Network(NetworkError::Transport(_))),
            "{:?}",
            err
        );
    }

    #[test]
    fn with_retries_retries_transient_failures() {
        let mut calls = 0;
        let out = with_retries("test", 3, || {
            calls += 1;
            if calls < 3 {
                Err(NetworkError::Status {
                    status: 503,
                    message: "busy".to_string(),
                }
                .into())
            } else {
                Ok(calls)
            }
        })
        .expect("eventually succeeds");
        assert_eq!(out, 3);
    }

    #[test]
    fn with_retries_gives_up_after_attempts() {
        let mut calls = 0;
        let err = with_retries("test", 2, || -> Result<()> {
            calls += 1;
            Err(NetworkError::Transport("down".to_string()).into())
        })
        .unwrap_err();
        assert_eq!(calls, 2);
        assert!(matches!(err, Error::Network(NetworkError::Transport(_))));
    }

    #[test]
    fn with_retries_does_not_retry_client_errors() {
        let mut calls = 0;
        let err = with_retries("test", 5, || -> Result<()> {
            calls += 1;
            Err(NetworkError::Status {
                status: 404,
                message: "missing".to_string(),
            }
            .into())
        })
        .unwrap_err();
        assert_eq!(calls, 1);
        match err {
            Error::Network(err) => assert!(err.is_not_found()),
            other => panic!("expected network error, got {:?}", other),
        }
    }

    #[test]
    fn unreachable_host_is_a_transport_error() {
        let remote = HttpRemoteStore::new(RemoteConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            owner_id: "alice".to_string(),
            retries: 1,
        })
        .expect("build client");
        let err = remote.list_tree(&RepoRef::new("alice", "notes")).unwrap_err();
        assert!(
            matches!(err, Error::Network(NetworkError::Transport(_))),
            "{:?}",
            err
        );
    }
