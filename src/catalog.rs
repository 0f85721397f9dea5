// src/catalog.rs

use std::{
    collections::HashMap,
    fmt, fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use validator::Validate;

use crate::models::course::Course;

#[derive(Debug)]
pub enum CatalogError {
    Io { path: PathBuf, source: std::io::Error },
    Parse { path: PathBuf, source: serde_json::Error },
    Invalid { course_id: String, reason: String },
    Duplicate(String),
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogError::Io { path, source } => {
                write!(f, "failed to read {}: {}", path.display(), source)
            }
            CatalogError::Parse { path, source } => {
                write!(f, "failed to parse {}: {}", path.display(), source)
            }
            CatalogError::Invalid { course_id, reason } => {
                write!(f, "invalid course '{}': {}", course_id, reason)
            }
            CatalogError::Duplicate(id) => write!(f, "duplicate course id '{}'", id),
        }
    }
}

impl std::error::Error for CatalogError {}

/// Immutable set of validated courses, shared by every request.
#[derive(Debug, Default)]
pub struct CourseCatalog {
    courses: Vec<Arc<Course>>,
    by_id: HashMap<String, usize>,
}

impl CourseCatalog {
    /// Validates and indexes course definitions, keeping their given order.
    pub fn from_courses(courses: Vec<Course>) -> Result<Self, CatalogError> {
        let mut catalog = Self::default();

        for course in courses {
            if let Err(errors) = course.validate() {
                return Err(CatalogError::Invalid {
                    course_id: course.id.clone(),
                    reason: errors.to_string(),
                });
            }
            course
                .check_structure()
                .map_err(|reason| CatalogError::Invalid {
                    course_id: course.id.clone(),
                    reason,
                })?;

            if catalog.by_id.contains_key(&course.id) {
                return Err(CatalogError::Duplicate(course.id));
            }

            catalog.by_id.insert(course.id.clone(), catalog.courses.len());
            catalog.courses.push(Arc::new(course));
        }

        Ok(catalog)
    }

    /// Loads every `*.json` file in `dir`, sorted by file name.
    pub fn load_dir(dir: &Path) -> Result<Self, CatalogError> {
        let io_err = |source| CatalogError::Io {
            path: dir.to_path_buf(),
            source,
        };

        let mut paths = Vec::new();
        for entry in fs::read_dir(dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut courses = Vec::with_capacity(paths.len());
        for path in paths {
            let raw = fs::read_to_string(&path).map_err(|source| CatalogError::Io {
                path: path.clone(),
                source,
            })?;
            let course: Course = serde_json::from_str(&raw)
                .map_err(|source| CatalogError::Parse { path: path.clone(), source })?;

            tracing::debug!("Loaded course '{}' from {}", course.id, path.display());
            courses.push(course);
        }

        let catalog = Self::from_courses(courses)?;
        tracing::info!("Course catalog ready ({} courses)", catalog.len());
        Ok(catalog)
    }

    pub fn get(&self, id: &str) -> Option<Arc<Course>> {
        self.by_id.get(id).map(|&i| self.courses[i].clone())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Course>> {
        self.courses.iter()
    }

    pub fn len(&self) -> usize {
        self.courses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.courses.is_empty()
    }
}
