use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::{
    CoreError, Course, CourseRepository, Instructor, InstructorDirectory, Notifier, Severity,
    Slug, Taxonomy, TaxonomyRepository,
};

fn poisoned<T>(_: T) -> CoreError {
    CoreError::Repository("mutex poisoned".into())
}

/// In-memory course repository keyed by id.
pub struct InMemoryCourseRepo {
    inner: Mutex<BTreeMap<u64, Course>>,
}

/// In-memory lookup lists, seeded with the built-in values.
pub struct InMemoryTaxonomyRepo {
    inner: Mutex<BTreeMap<Taxonomy, Vec<String>>>,
}

/// Fixed instructor directory.
pub struct StaticInstructors {
    instructors: Vec<Instructor>,
}

/// Notifier that keeps every message, for tests and demos.
#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<(String, Severity)>>,
}

impl InMemoryCourseRepo {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(BTreeMap::new()),
        }
    }
}

impl Default for InMemoryCourseRepo {
    fn default() -> Self {
        Self::new()
    }
}

impl CourseRepository for InMemoryCourseRepo {
    fn get(&self, id: u64) -> Result<Option<Course>, CoreError> {
        let map = self.inner.lock().map_err(poisoned)?;
        Ok(map.get(&id).cloned())
    }

    fn get_by_slug(&self, slug: &Slug) -> Result<Option<Course>, CoreError> {
        let map = self.inner.lock().map_err(poisoned)?;
        Ok(map.values().find(|c| &c.slug == slug).cloned())
    }

    fn put(&self, course: Course) -> Result<(), CoreError> {
        let mut map = self.inner.lock().map_err(poisoned)?;
        if map.contains_key(&course.id) || map.values().any(|c| c.slug == course.slug) {
            return Err(CoreError::AlreadyExists);
        }
        map.insert(course.id, course);
        Ok(())
    }

    fn update(&self, course: &Course) -> Result<(), CoreError> {
        let mut map = self.inner.lock().map_err(poisoned)?;
        if !map.contains_key(&course.id) {
            return Err(CoreError::NotFound);
        }
        if map
            .values()
            .any(|c| c.id != course.id && c.slug == course.slug)
        {
            return Err(CoreError::AlreadyExists);
        }
        map.insert(course.id, course.clone());
        Ok(())
    }

    fn delete(&self, id: u64) -> Result<(), CoreError> {
        let mut map = self.inner.lock().map_err(poisoned)?;
        match map.remove(&id) {
            Some(_) => Ok(()),
            None => Err(CoreError::NotFound),
        }
    }

    fn list(&self) -> Result<Vec<Course>, CoreError> {
        let map = self.inner.lock().map_err(poisoned)?;
        Ok(map.values().cloned().collect())
    }

    fn max_id(&self) -> Result<Option<u64>, CoreError> {
        let map = self.inner.lock().map_err(poisoned)?;
        Ok(map.keys().next_back().copied())
    }

    fn replace_all(&self, courses: Vec<Course>) -> Result<(), CoreError> {
        let mut next = BTreeMap::new();
        for course in courses {
            if next.contains_key(&course.id)
                || next.values().any(|c: &Course| c.slug == course.slug)
            {
                return Err(CoreError::AlreadyExists);
            }
            next.insert(course.id, course);
        }
        let mut map = self.inner.lock().map_err(poisoned)?;
        *map = next;
        Ok(())
    }
}

impl InMemoryTaxonomyRepo {
    pub fn new() -> Self {
        let seeded = Taxonomy::ALL
            .into_iter()
            .map(|kind| (kind, kind.seed().iter().map(|s| s.to_string()).collect()))
            .collect();
        Self {
            inner: Mutex::new(seeded),
        }
    }
}

impl Default for InMemoryTaxonomyRepo {
    fn default() -> Self {
        Self::new()
    }
}

impl TaxonomyRepository for InMemoryTaxonomyRepo {
    fn list(&self, kind: Taxonomy) -> Result<Vec<String>, CoreError> {
        let map = self.inner.lock().map_err(poisoned)?;
        Ok(map.get(&kind).cloned().unwrap_or_default())
    }

    fn register(&self, kind: Taxonomy, value: &str) -> Result<bool, CoreError> {
        let mut map = self.inner.lock().map_err(poisoned)?;
        let values = map.entry(kind).or_default();
        if values.iter().any(|v| v == value) {
            return Ok(false);
        }
        values.push(value.to_string());
        Ok(true)
    }

    fn unregister(&self, kind: Taxonomy, value: &str) -> Result<(), CoreError> {
        let mut map = self.inner.lock().map_err(poisoned)?;
        if let Some(values) = map.get_mut(&kind) {
            values.retain(|v| v != value);
        }
        Ok(())
    }
}

impl StaticInstructors {
    pub fn new(instructors: Vec<Instructor>) -> Self {
        Self { instructors }
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            names
                .into_iter()
                .map(|n| Instructor { name: n.into() })
                .collect(),
        )
    }
}

impl InstructorDirectory for StaticInstructors {
    fn exists(&self, name: &str) -> Result<bool, CoreError> {
        Ok(self.instructors.iter().any(|i| i.name == name))
    }

    fn list(&self) -> Result<Vec<Instructor>, CoreError> {
        Ok(self.instructors.clone())
    }
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything sent so far.
    pub fn messages(&self) -> Vec<(String, Severity)> {
        self.messages
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str, severity: Severity) {
        if let Ok(mut m) = self.messages.lock() {
            m.push((message.to_string(), severity));
        }
    }
}
