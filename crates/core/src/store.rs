//! Authoritative per-page annotation state
//!
//! Records are shared through `Arc` so that snapshots for undo and for saving
//! cost one pointer copy per annotation.

use crate::actor::ActorId;
use crate::annotation::{Annotation, AnnotationId, Color, PageCoordinate};
use crate::error::{OverlayError, OverlayResult};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Annotations indexed by id and grouped by page in z-order
#[derive(Debug, Clone, Default)]
struct Contents {
    annotations: HashMap<AnnotationId, Arc<Annotation>>,
    /// Per page, ids in insertion order; the last entry is drawn on top.
    by_page: BTreeMap<u32, Vec<AnnotationId>>,
}

impl Contents {
    fn list_for_page(&self, page_index: u32) -> Vec<&Annotation> {
        self.by_page
            .get(&page_index)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.annotations.get(id).map(|a| a.as_ref()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn same_as(&self, other: &Contents) -> bool {
        self.by_page == other.by_page
            && self.annotations.len() == other.annotations.len()
            && self.annotations.iter().all(|(id, annotation)| {
                other.annotations.get(id).is_some_and(|theirs| theirs == annotation)
            })
    }
}

/// Immutable view of the store at one generation
///
/// Cloning a snapshot is O(1). Edits made to the store after the snapshot was
/// taken are never visible through it.
#[derive(Debug, Clone)]
pub struct AnnotationSnapshot {
    contents: Arc<Contents>,
    generation: u64,
}

impl AnnotationSnapshot {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.contents.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contents.annotations.is_empty()
    }

    pub fn get(&self, id: AnnotationId) -> Option<&Annotation> {
        self.contents.annotations.get(&id).map(|a| a.as_ref())
    }

    /// Pages that carry at least one annotation, ascending
    pub fn pages(&self) -> impl Iterator<Item = u32> + '_ {
        self.contents
            .by_page
            .iter()
            .filter(|(_, ids)| !ids.is_empty())
            .map(|(page, _)| *page)
    }

    pub fn list_for_page(&self, page_index: u32) -> Vec<&Annotation> {
        self.contents.list_for_page(page_index)
    }

    /// All annotations, page by page, each page in z-order
    pub fn iter(&self) -> impl Iterator<Item = &Annotation> + '_ {
        self.pages().flat_map(move |page| self.list_for_page(page))
    }
}

/// Snapshots compare by content; the generation they were taken at is ignored.
impl PartialEq for AnnotationSnapshot {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.contents, &other.contents) || self.contents.same_as(&other.contents)
    }
}

/// Annotations of one open document
///
/// Every successful mutation bumps the generation counter.
#[derive(Debug, Default)]
pub struct AnnotationStore {
    contents: Contents,
    generation: u64,
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully built annotation on top of its page
    pub fn add(&mut self, annotation: Annotation) -> OverlayResult<AnnotationId> {
        let id = annotation.id();
        if self.contents.annotations.contains_key(&id) {
            return Err(OverlayError::DuplicateAnnotation(id));
        }
        annotation.validate()?;

        self.contents.by_page.entry(annotation.page_index()).or_default().push(id);
        self.contents.annotations.insert(id, Arc::new(annotation));
        self.bump();
        Ok(id)
    }

    pub fn remove(&mut self, id: AnnotationId) -> OverlayResult<Annotation> {
        let annotation =
            self.contents.annotations.remove(&id).ok_or(OverlayError::AnnotationNotFound(id))?;

        if let Some(ids) = self.contents.by_page.get_mut(&annotation.page_index()) {
            ids.retain(|existing| *existing != id);
            if ids.is_empty() {
                self.contents.by_page.remove(&annotation.page_index());
            }
        }

        self.bump();
        Ok(Arc::unwrap_or_clone(annotation))
    }

    /// Edit an annotation in place
    ///
    /// `mutator` works on a copy. The copy must still validate and keep the
    /// same kind, otherwise the stored annotation is left untouched.
    pub fn update<F>(&mut self, id: AnnotationId, mutator: F) -> OverlayResult<()>
    where
        F: FnOnce(&mut Annotation),
    {
        let current =
            self.contents.annotations.get(&id).ok_or(OverlayError::AnnotationNotFound(id))?;

        let mut edited = Annotation::clone(current);
        mutator(&mut edited);

        if edited.id() != id || edited.page_index() != current.page_index() {
            return Err(OverlayError::InvalidState(
                "an edit may not change an annotation's id or page".to_owned(),
            ));
        }
        if edited.kind() != current.kind() {
            return Err(OverlayError::InvalidGeometry(format!(
                "cannot change a {:?} into a {:?}",
                current.kind(),
                edited.kind()
            )));
        }
        edited.validate()?;

        self.contents.annotations.insert(id, Arc::new(edited));
        self.bump();
        Ok(())
    }

    /// Recolor every annotation attributed to `actor_id`; returns how many changed
    pub fn recolor_actor(&mut self, actor_id: ActorId, color: Color) -> usize {
        let mut changed = 0;
        for annotation in self.contents.annotations.values_mut() {
            if annotation.actor_id() == actor_id && annotation.color() != color {
                Arc::make_mut(annotation).set_color(color);
                changed += 1;
            }
        }
        if changed > 0 {
            self.bump();
        }
        changed
    }

    pub fn get(&self, id: AnnotationId) -> Option<&Annotation> {
        self.contents.annotations.get(&id).map(|a| a.as_ref())
    }

    /// Annotations on a page, bottom-most first
    pub fn list_for_page(&self, page_index: u32) -> Vec<&Annotation> {
        self.contents.list_for_page(page_index)
    }

    /// Annotations on `page_index` near `point`, topmost first
    pub fn hit_test(
        &self,
        page_index: u32,
        point: &PageCoordinate,
        tolerance: f32,
    ) -> Vec<AnnotationId> {
        self.list_for_page(page_index)
            .into_iter()
            .rev()
            .filter(|annotation| annotation.hit_test(point, tolerance))
            .map(Annotation::id)
            .collect()
    }

    pub fn pages(&self) -> Vec<u32> {
        self.contents.by_page.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.contents.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contents.annotations.is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn clear(&mut self) {
        if self.is_empty() {
            return;
        }
        self.contents = Contents::default();
        self.bump();
    }

    pub fn snapshot(&self) -> AnnotationSnapshot {
        AnnotationSnapshot { contents: Arc::new(self.contents.clone()), generation: self.generation }
    }

    /// Replace the whole contents with those of `snapshot`
    pub fn restore(&mut self, snapshot: &AnnotationSnapshot) {
        self.contents = Contents::clone(&snapshot.contents);
        self.bump();
    }

    fn bump(&mut self) {
        self.generation += 1;
    }
}
