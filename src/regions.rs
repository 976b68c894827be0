//! Region registry.
//!
//! A region is a named historical area, optionally mapped to modern
//! countries for map rendering. Only the name and context are used when
//! sampling; `countries` is carried through for the presentation layer.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// One entry of the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    /// Region name used in prompts and the output `region` column.
    #[serde(alias = "name")]
    pub region: String,

    /// Modern countries the region maps onto.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub countries: Vec<String>,

    /// Extra disambiguating text appended after the name in the prompt.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub context: String,
}

impl Region {
    pub fn named(name: &str) -> Self {
        Self {
            region: name.to_string(),
            countries: Vec::new(),
            context: String::new(),
        }
    }

    /// Filesystem-safe form of the name, e.g. "Test Region" -> "test-region".
    pub fn slug(&self) -> String {
        let mut slug = String::new();
        for c in self.region.chars() {
            if c.is_ascii_alphanumeric() {
                slug.push(c.to_ascii_lowercase());
            } else if !slug.ends_with('-') {
                slug.push('-');
            }
        }
        slug.trim_matches('-').to_string()
    }

    /// Directory name for this region's raw replies: the slug, or
    /// `region-<index>` when the name has no ASCII letters or digits.
    pub fn dir_name(&self, index: usize) -> String {
        let slug = self.slug();
        if slug.is_empty() {
            format!("region-{}", index)
        } else {
            slug
        }
    }
}

/// Load a JSON registry: a list of `{region, countries, context?}` objects.
pub fn load_registry(path: &Path) -> Result<Vec<Region>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read region registry: {}", path.display()))?;

    let regions: Vec<Region> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse region registry: {}", path.display()))?;

    check_regions(&regions)?;
    Ok(regions)
}

/// Reject empty or duplicate region names, and names that share a raw
/// reply directory.
pub fn check_regions(regions: &[Region]) -> Result<()> {
    let mut seen = HashSet::new();
    let mut dirs: HashMap<String, &str> = HashMap::new();

    for (index, region) in regions.iter().enumerate() {
        let name = region.region.trim();
        if name.is_empty() {
            bail!("Region registry contains an entry with an empty name");
        }
        if !seen.insert(name.to_lowercase()) {
            bail!("Region '{}' is listed more than once", name);
        }
        if let Some(other) = dirs.insert(region.dir_name(index), name) {
            bail!(
                "Regions '{}' and '{}' map to the same directory name '{}'",
                other,
                name,
                region.dir_name(index)
            );
        }
    }

    Ok(())
}
