use super::*;

/// Owner and repository ids become directory names.
pub(super) fn validate_id(kind: &str, id: &str) -> Result<()> {
    if id.is_empty() {
        anyhow::bail!("{} id is empty", kind);
    }
    if id == "." || id == ".." {
        anyhow::bail!("{} id {:?} is reserved", kind, id);
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        anyhow::bail!("{} id {:?} has invalid characters", kind, id);
    }
    Ok(())
}

pub(super) fn validate_repo(owner: &str, repo: &str) -> std::result::Result<(), Response> {
    validate_id("owner", owner).map_err(bad_request)?;
    validate_id("repo", repo).map_err(bad_request)?;
    Ok(())
}
