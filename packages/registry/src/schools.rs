//! School directory loading and validation.
//!
//! School coordinates come straight from the directory and are taken as
//! authoritative, so no geocoding happens here.

use std::collections::{BTreeMap, BTreeSet};

use layoff_map_models::School;

use crate::RegistryError;

/// Validated schools ordered by `(year, ncessch)`.
#[derive(Debug, Clone, PartialEq)]
pub struct SchoolRegistry {
    schools: Vec<School>,
}

impl SchoolRegistry {
    /// Checks `(year, ncessch)` uniqueness.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateSchool`] on the first repeated key.
    pub fn load<I, S>(records: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = S>,
        S: Into<School>,
    {
        let mut by_key: BTreeMap<(i32, String), School> = BTreeMap::new();

        for record in records {
            let school: School = record.into();
            let key = (school.year, school.ncessch.clone());
            if by_key.contains_key(&key) {
                return Err(RegistryError::DuplicateSchool {
                    year: school.year,
                    ncessch: school.ncessch,
                });
            }
            by_key.insert(key, school);
        }

        let missing = by_key.values().filter(|s| s.coordinate.is_none()).count();
        if missing > 0 {
            log::warn!("{missing} school-years have no coordinates");
        }
        log::info!("Loaded {} school-years", by_key.len());

        Ok(Self {
            schools: by_key.into_values().collect(),
        })
    }

    #[must_use]
    pub fn schools(&self) -> &[School] {
        &self.schools
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.schools.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.schools.is_empty()
    }

    /// Distinct reporting years present.
    #[must_use]
    pub fn years(&self) -> BTreeSet<i32> {
        self.schools.iter().map(|s| s.year).collect()
    }
}
