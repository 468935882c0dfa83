//! Initialize a new xentity project

use anyhow::Result;
use std::fs;
use std::path::Path;
use xentity_core::config::{ENTITY_TYPES_DIR, PROJECT_FILE};

/// Run the init command
pub async fn run(path: &str, name: Option<&str>) -> Result<()> {
    let project_dir = Path::new(path);

    // Create directory if it doesn't exist
    if !project_dir.exists() {
        fs::create_dir_all(project_dir)?;
    }

    // Get absolute path for deriving name
    let abs_path = project_dir.canonicalize()?;

    // Derive project name from directory name if not provided
    let project_name = match name {
        Some(n) => n.to_string(),
        None => abs_path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow::anyhow!("Could not determine project name from path"))?,
    };

    // Check if already initialized
    if project_dir.join(PROJECT_FILE).exists() {
        anyhow::bail!(
            "Directory '{}' already contains a {}",
            project_dir.display(),
            PROJECT_FILE
        );
    }

    tracing::info!("Creating new xentity project: {}", project_name);

    // Create directory structure
    fs::create_dir_all(project_dir.join(ENTITY_TYPES_DIR))?;
    fs::create_dir_all(project_dir.join("data"))?;

    // Create xentity.yaml
    let config = format!(
        r#"# xentity project configuration
name: {project_name}
version: "0.1.0"

# Expression dialect for entity types that do not set one: simple | jsonpath
default_dialect: simple

vars:
  environment: development
"#
    );
    fs::write(project_dir.join(PROJECT_FILE), config)?;

    // Create example entity type
    let example_type = r#"# Example external entity type
id: movie
label: Movie

# Fields in addition to the base fields id, uuid, title and annotation
fields:
  released:
    type: datetime
    datetime_type: date
  rating:
    type: integer
  genres:
    type: entity_reference
    cardinality: -1
  source:
    type: string

field_mapper:
  # Mappings starting with this prefix are constants
  constant_prefix: "+"
  field_mappings:
    id:
      value: uuid
    uuid:
      value: uuid
    title:
      value: title
    released:
      value: dates/released
    rating:
      value: stats/rating
    genres:
      target_id: "genres/*/id"
    source:
      value: "+sample data"

storage:
  type: file
  path: data/movies.json
  id_key: uuid
"#;
    fs::write(
        project_dir.join(ENTITY_TYPES_DIR).join("movie.yaml"),
        example_type,
    )?;

    // Create sample raw data
    let sample_data = r#"[
  {
    "uuid": "5b0c7f6e-8f2a-4c43-9a0e-0d2a4f2b7a01",
    "title": "Alien",
    "dates": {"released": "1979-05-25T00:00:00Z"},
    "stats": {"rating": "8"},
    "genres": [{"id": "scifi"}, {"id": "horror"}]
  },
  {
    "uuid": "8d51a1c2-3f4e-4b6a-8c7d-1e2f3a4b5c02",
    "title": "Heat",
    "dates": {"released": "1995-12-15"},
    "stats": {"rating": 8},
    "genres": [{"id": "crime"}]
  },
  {
    "uuid": "c3e9b7d4-6a5f-4e8b-9d0c-2f1e3a4b5c03",
    "title": "Arrival",
    "dates": {"released": "11/11/2016"},
    "genres": []
  }
]
"#;
    fs::write(project_dir.join("data/movies.json"), sample_data)?;

    tracing::info!(
        "✓ Created project '{}' at {}",
        project_name,
        abs_path.display()
    );
    tracing::info!("");
    tracing::info!("Next steps:");
    if path != "." {
        tracing::info!("  cd {}", project_dir.display());
    }
    tracing::info!("  xentity validate                       # Check field mappings");
    tracing::info!("  xentity extract --entity-type movie    # Map stored records");

    Ok(())
}
