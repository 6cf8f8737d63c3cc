use std::collections::BTreeMap;

use repotree::model::{LeafRef, ListResponse, Origin, RemoteObject, RepoPath, RepoRef};
use repotree::tree::TreeBuilder;

use super::*;

pub(super) async fn healthz() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

pub(super) async fn list_upload(
    State(state): State<Arc<AppState>>,
    Path((owner, repo)): Path<(String, String)>,
) -> std::result::Result<Json<ListResponse>, Response> {
    validate_repo(&owner, &repo)?;
    let _read = state.content_lock.read().await;

    let root = files_dir(&state, &owner, &repo);
    if !root.is_dir() {
        return Err(not_found());
    }
    let tree = scan_listing(&root).map_err(internal_error)?;
    Ok(Json(ListResponse { tree }))
}

pub(super) async fn upload(
    State(state): State<Arc<AppState>>,
    Path((owner, repo)): Path<(String, String)>,
    mut multipart: Multipart,
) -> std::result::Result<StatusCode, Response> {
    validate_repo(&owner, &repo)?;

    // A repeated path keeps the last part.
    let mut files: BTreeMap<RepoPath, axum::body::Bytes> = BTreeMap::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(anyhow::anyhow!("{}", e)))?
    {
        if field.name() != Some("files") {
            continue;
        }
        let name = field
            .file_name()
            .ok_or_else(|| bad_request(anyhow::anyhow!("upload part has no file name")))?
            .to_string();
        let path = RepoPath::parse(&name).map_err(|e| bad_request(anyhow::anyhow!("{}", e)))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| bad_request(anyhow::anyhow!("{}", e)))?;
        files.insert(path, bytes);
    }
    if files.is_empty() {
        return Err(bad_request(anyhow::anyhow!("upload contains no files")));
    }

    // Reject batches that would need a name to be both a file and a directory.
    let repo_ref = RepoRef::new(owner.clone(), repo.clone());
    let mut shape = TreeBuilder::new(repo_ref.clone(), Origin::Remote);
    for path in files.keys() {
        let leaf = LeafRef::RemoteObject(RemoteObject {
            owner_id: owner.clone(),
            repo_id: repo.clone(),
            path: path.clone(),
            digest: None,
        });
        shape
            .insert(path.clone(), leaf)
            .map_err(|e| bad_request(anyhow::anyhow!("{}", e)))?;
    }

    let files: Vec<_> = files.into_iter().collect();
    let _write = state.content_lock.write().await;
    replace_content(&state, &owner, &repo, &files).map_err(internal_error)?;
    tracing::info!(repo = %repo_ref, files = files.len(), "stored upload");
    Ok(StatusCode::CREATED)
}

#[derive(Debug, serde::Deserialize)]
pub(super) struct FileQuery {
    #[serde(rename = "filePath")]
    file_path: String,
}

pub(super) async fn get_uploaded_file(
    State(state): State<Arc<AppState>>,
    Path((owner, repo)): Path<(String, String)>,
    Query(q): Query<FileQuery>,
) -> std::result::Result<Response, Response> {
    validate_repo(&owner, &repo)?;
    let path = RepoPath::parse(&q.file_path).map_err(|e| bad_request(anyhow::anyhow!("{}", e)))?;
    let _read = state.content_lock.read().await;

    let target = object_path(&files_dir(&state, &owner, &repo), &path);
    if !target.is_file() {
        return Err(not_found());
    }
    let bytes = std::fs::read(&target)
        .with_context(|| format!("read {}", target.display()))
        .map_err(internal_error)?;
    Ok((
        [(header::CONTENT_TYPE, "application/octet-stream")],
        axum::body::Bytes::from(bytes),
    )
        .into_response())
}
