//! Path validation.

use anyhow::{Context, Result};
use groupspace_types::GroupPath;

pub fn check_path(community: &str, path: &str) -> Result<()> {
    let parsed = GroupPath::parse(community, path)
        .with_context(|| format!("'{}' is not a valid group path in '{}'", path, community))?;
    println!("{}", parsed);
    Ok(())
}
