// JSON seed files for the in-memory catalog

use crate::catalog::InMemoryCatalog;
use crate::error::{DiscoveryError, Result};
use crate::types::{CatalogEntry, ServerId};
use chrono::Utc;
use serde::Deserialize;
use std::path::Path;

/// One catalog entry in a JSON seed file. Only `name` and `slug` are
/// required; everything else defaults to empty.
#[derive(Debug, Deserialize)]
pub struct SeedServer {
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub npm_package: Option<String>,
    #[serde(default)]
    pub install_command: Option<String>,
    #[serde(default)]
    pub docs_url: Option<String>,
    #[serde(default)]
    pub github_url: Option<String>,
    #[serde(default)]
    pub homepage_url: Option<String>,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

/// Load a JSON array of [`SeedServer`] into the catalog. Returns the
/// number of entries loaded.
pub fn load_file(catalog: &InMemoryCatalog, path: &Path) -> Result<usize> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        DiscoveryError::dependency(format!("failed to read seed file {}: {}", path.display(), e))
    })?;
    let servers: Vec<SeedServer> = serde_json::from_str(&raw).map_err(|e| {
        DiscoveryError::validation(format!("seed file is not a JSON array of servers: {}", e))
    })?;

    let count = servers.len();
    for seed in servers {
        load_one(catalog, seed);
    }
    Ok(count)
}

fn load_one(catalog: &InMemoryCatalog, seed: SeedServer) {
    let install_command = seed.install_command.unwrap_or_else(|| match &seed.npm_package {
        Some(package) => format!("npm install -g {}", package),
        None => format!("npx {}", seed.slug),
    });

    let now = Utc::now();
    let id = catalog.insert_entry(CatalogEntry {
        id: ServerId::new(),
        slug: seed.slug,
        name: seed.name,
        description: seed.description,
        category: seed.category,
        npm_package: seed.npm_package,
        install_command,
        docs_url: seed.docs_url,
        github_url: seed.github_url,
        homepage_url: seed.homepage_url,
        description_embedding: None,
        is_verified: false,
        created_at: now,
        updated_at: now,
    });

    for capability in seed.capabilities {
        catalog.add_capability(id, &capability, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogStore;
    use crate::types::Identifier;

    #[tokio::test]
    async fn test_minimal_seed_entry_gets_install_command() {
        let catalog = InMemoryCatalog::new();
        load_one(
            &catalog,
            serde_json::from_str(r#"{ "name": "Postgres MCP", "slug": "postgres-mcp" }"#).unwrap(),
        );

        let entry = catalog
            .get_by_identifier(&Identifier::parse("postgres-mcp"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.install_command, "npx postgres-mcp");
    }

    #[tokio::test]
    async fn test_capabilities_attached_on_load() {
        let catalog = InMemoryCatalog::new();
        load_one(
            &catalog,
            serde_json::from_str(
                r#"{
                    "name": "Supabase",
                    "slug": "supabase-mcp-server",
                    "npm_package": "@supabase/mcp",
                    "capabilities": ["auth", "realtime"]
                }"#,
            )
            .unwrap(),
        );

        let entry = catalog
            .get_by_identifier(&Identifier::parse("supabase-mcp-server"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.install_command, "npm install -g @supabase/mcp");

        let caps = catalog.capabilities_for(entry.id).await.unwrap();
        assert_eq!(caps.len(), 2);
    }

    #[test]
    fn test_missing_file_reports_dependency_error() {
        let catalog = InMemoryCatalog::new();
        let err = load_file(&catalog, Path::new("/nonexistent/servers.json")).unwrap_err();
        assert!(matches!(err, DiscoveryError::Dependency(_)));
    }
}
