//! Material slots and collision-id naming
//!
//! Collision materials follow the `col_*` convention: the part after the
//! prefix is the collision id consumed downstream. Editors that deduplicate
//! names append a separator and a three-digit counter (`col_a.001`), and the
//! consolidation passes strip those counters back off.

use crate::errors::PipelineError;
use crate::mesh::Mesh;
use tracing::info;

/// A named material slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Material {
    pub name: String,
}

impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Prefix that marks a material as a collision id.
pub const COLLISION_PREFIX: &str = "col_";

/// True when the name is a collision id.
pub fn is_collision_name(name: &str) -> bool {
    name.starts_with(COLLISION_PREFIX)
}

/// How a collision material name parses under the counter convention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollisionName {
    /// No trailing counter; the name is its own canonical form.
    Canonical(String),
    /// Ends in a three-digit counter; `canonical` drops the counter and the
    /// character before it.
    Suffixed { canonical: String, index: u32 },
}

/// Split a collision material name into canonical name and counter.
///
/// A name carries a counter when its last three characters are ASCII digits;
/// the canonical form drops those plus the separator character before them,
/// so `col_a.001` and `col_a_001` both yield `col_a`. A name whose canonical
/// form no longer starts with `col_` (such as `col_123`) has no collision
/// identity left to merge into and is rejected.
pub fn parse_collision_name(name: &str) -> Result<CollisionName, PipelineError> {
    let chars: Vec<char> = name.chars().collect();
    let n = chars.len();
    if n < 4 || !chars[n - 3..].iter().all(|c| c.is_ascii_digit()) {
        return Ok(CollisionName::Canonical(name.to_string()));
    }
    let canonical: String = chars[..n - 4].iter().collect();
    if !is_collision_name(&canonical) {
        return Err(PipelineError::AmbiguousMaterial(name.to_string()));
    }
    let mut index = 0u32;
    for c in &chars[n - 3..] {
        index = index * 10 + (*c as u32 - '0' as u32);
    }
    Ok(CollisionName::Suffixed { canonical, index })
}

impl Mesh {
    /// Rename every material that carries no `col_` marker anywhere in its
    /// name to `default_name`, numbering repeats within this mesh
    /// (`default`, `default.001`, ...) so slot names stay unique.
    pub fn enforce_collision_ids(&mut self, default_name: &str) {
        for slot in 0..self.materials.len() {
            let name = self.materials[slot].name.clone();
            if name.contains(COLLISION_PREFIX) {
                continue;
            }
            let mut renamed = default_name.to_string();
            let mut counter = 0u32;
            while self.materials.iter().any(|m| m.name == renamed) {
                counter += 1;
                renamed = format!("{}.{:03}", default_name, counter);
            }
            info!("Renaming material {:?} to {:?}", name, renamed);
            self.materials[slot].name = renamed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_names_are_canonical() {
        assert_eq!(
            parse_collision_name("col_a").unwrap(),
            CollisionName::Canonical("col_a".to_string())
        );
        // Too short for a counter to hide in.
        assert_eq!(
            parse_collision_name("col_1").unwrap(),
            CollisionName::Canonical("col_1".to_string())
        );
        assert_eq!(
            parse_collision_name("col_").unwrap(),
            CollisionName::Canonical("col_".to_string())
        );
    }

    #[test]
    fn counters_strip_with_their_separator() {
        assert_eq!(
            parse_collision_name("col_a.001").unwrap(),
            CollisionName::Suffixed { canonical: "col_a".to_string(), index: 1 }
        );
        assert_eq!(
            parse_collision_name("col_a_042").unwrap(),
            CollisionName::Suffixed { canonical: "col_a".to_string(), index: 42 }
        );
        // The character before the digits is dropped whatever it is.
        assert_eq!(
            parse_collision_name("col_ab999").unwrap(),
            CollisionName::Suffixed { canonical: "col_a".to_string(), index: 999 }
        );
    }

    #[test]
    fn counter_that_consumes_the_id_is_rejected() {
        assert!(matches!(
            parse_collision_name("col_123"),
            Err(PipelineError::AmbiguousMaterial(_))
        ));
    }

    #[test]
    fn default_ids_number_repeats() {
        let mut mesh = Mesh::default();
        mesh.materials.push(Material::new("wood"));
        mesh.materials.push(Material::new("stone"));
        mesh.materials.push(Material::new("my_col_x"));
        mesh.enforce_collision_ids("col_2f");
        let names: Vec<&str> = mesh.materials.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["col_2f", "col_2f.001", "my_col_x"]);
    }
}
