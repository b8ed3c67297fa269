use tracing::{debug, error, info, warn};

use crate::discount::{reconcile_discount, Discount};
use crate::jalali::{dates_consistent, gregorian_to_jalali, jalali_to_gregorian};
use crate::numerals::{format_integer, parse_localized_number, to_ascii_digits, NumeralSystem};
use crate::sanitize::{sanitize, sanitize_all, sanitize_opt};
use crate::slug::unique_slug;
use crate::validate::validate_course;
use crate::{
    CoreError, Course, CourseDraft, CourseRepository, CourseUpdate, CurrentUser, Faq, Instructor,
    InstructorDirectory, Notifier, Role, Severity, SyllabusItem, Taxonomy, TaxonomyRepository,
};

/// A stored course that no longer passes validation.
#[derive(Clone, Debug, PartialEq)]
pub struct InvalidRecord {
    pub id: u64,
    pub slug: String,
    pub reason: String,
}

/// Catalog store: the only owner of the course collection.
///
/// Every mutation is validated as a whole before anything is written, and
/// either fully applies or leaves storage untouched. Collaborators are
/// injected so the service stays free of global state.
pub struct CatalogService<R, T, I, N>
where
    R: CourseRepository,
    T: TaxonomyRepository,
    I: InstructorDirectory,
    N: Notifier,
{
    courses: R,
    taxonomies: T,
    instructors: I,
    notifier: N,
}

impl<R, T, I, N> CatalogService<R, T, I, N>
where
    R: CourseRepository,
    T: TaxonomyRepository,
    I: InstructorDirectory,
    N: Notifier,
{
    pub fn new(courses: R, taxonomies: T, instructors: I, notifier: N) -> Self {
        Self {
            courses,
            taxonomies,
            instructors,
            notifier,
        }
    }

    fn authorize(
        user: &CurrentUser,
        allowed: fn(&Role) -> bool,
        action: &str,
    ) -> Result<(), CoreError> {
        if !allowed(&user.role) {
            return Err(CoreError::Unauthorized(format!(
                "role {} may not {action}",
                user.role.as_str()
            )));
        }
        Ok(())
    }

    /// Forward the outcome of a mutation to the log and the notifier.
    fn report<V>(
        &self,
        action: &str,
        result: Result<V, CoreError>,
        success: impl FnOnce(&V) -> String,
    ) -> Result<V, CoreError> {
        match &result {
            Ok(v) => {
                let msg = success(v);
                info!(action, "{msg}");
                self.notifier.notify(&msg, Severity::Success);
            }
            Err(e) => {
                warn!(action, error = %e, "catalog mutation rejected");
                self.notifier
                    .notify(&format!("Failed to {action}: {e}"), Severity::Error);
            }
        }
        result
    }

    /// Create a course from a draft.
    pub fn add_course(&self, user: &CurrentUser, draft: CourseDraft) -> Result<Course, CoreError> {
        let result = self.try_add(user, draft);
        self.report("add course", result, |c| {
            format!("Course '{}' added with id {}", c.title, c.id)
        })
    }

    fn try_add(&self, user: &CurrentUser, mut draft: CourseDraft) -> Result<Course, CoreError> {
        Self::authorize(user, Role::can_author_courses, "add courses")?;
        if !self.instructors.exists(&draft.instructor)? {
            return Err(CoreError::UnknownInstructor(draft.instructor));
        }
        let jalali = required_text(draft.start_date_jalali.take(), "startDateJalali")?;
        let gregorian = required_text(draft.start_date_gregorian.take(), "startDateGregorian")?;
        let course_type = draft
            .course_type
            .ok_or_else(|| CoreError::invalid("courseType", "is required"))?;
        let currency = draft
            .currency
            .ok_or_else(|| CoreError::invalid("currency", "is required"))?;

        sanitize_draft(&mut draft);
        let (jalali, gregorian) = reconcile_dates(&jalali, &gregorian)?;
        let (discount_price, discount_percentage) = derive_discount(
            &draft.price,
            draft.discount_price.as_deref(),
            draft.discount_percentage,
        )?;

        let id = self.courses.max_id()?.map_or(1, |max| max + 1);
        let slug = unique_slug(&draft.title, |s| self.courses.slug_exists(s))?;

        let course = Course {
            id,
            slug,
            title: draft.title,
            instructor: draft.instructor,
            description: draft.description,
            duration: draft.duration,
            category: draft.category,
            university: draft.university,
            course_type,
            level: draft.level,
            price: draft.price,
            currency,
            discount_price,
            discount_percentage,
            start_date_jalali: jalali,
            start_date_gregorian: gregorian,
            syllabus: draft.syllabus,
            faqs: draft.faqs,
            tags: draft.tags,
            prerequisites: draft.prerequisites,
            countries: draft.countries,
            enrollment_count: 0,
            is_open: draft.is_open,
            is_featured: draft.is_featured,
        };
        validate_course(&course, &self.instructors)?;

        self.courses.put(course.clone())?;
        if let Err(e) = self.register_taxonomies(&course) {
            return Err(rollback_failure(e, self.courses.delete(course.id)));
        }
        Ok(course)
    }

    /// Apply an edit command to a stored course.
    pub fn update_course(
        &self,
        user: &CurrentUser,
        id: u64,
        update: CourseUpdate,
    ) -> Result<Course, CoreError> {
        let result = self.try_update(user, id, update);
        self.report("update course", result, |c| {
            format!("Course '{}' (id {}) updated", c.title, c.id)
        })
    }

    fn try_update(
        &self,
        user: &CurrentUser,
        id: u64,
        update: CourseUpdate,
    ) -> Result<Course, CoreError> {
        Self::authorize(user, Role::can_author_courses, "edit courses")?;
        let existing = self.courses.get(id)?.ok_or(CoreError::NotFound)?;
        if update.is_empty() {
            return Ok(existing);
        }

        let title_changed = update.title.as_ref().is_some_and(|t| *t != existing.title);
        let reprice = update.price.is_some()
            && update.discount_price.is_none()
            && update.discount_percentage.is_none();

        let mut course = existing.clone();
        apply_update(&mut course, update)?;
        sanitize_course(&mut course);

        if reprice && course.discount_percentage.is_some() {
            // Keep the percentage, re-derive the price against the new base.
            course.discount_price = None;
        }
        let (discount_price, discount_percentage) = derive_discount(
            &course.price,
            course.discount_price.as_deref(),
            course.discount_percentage,
        )?;
        course.discount_price = discount_price;
        course.discount_percentage = discount_percentage;

        let (jalali, gregorian) =
            reconcile_dates(&course.start_date_jalali, &course.start_date_gregorian)?;
        course.start_date_jalali = jalali;
        course.start_date_gregorian = gregorian;

        if title_changed {
            course.slug = unique_slug(&course.title, |s| {
                Ok(self.courses.get_by_slug(s)?.is_some_and(|c| c.id != id))
            })?;
        }

        validate_course(&course, &self.instructors)?;
        self.courses.update(&course)?;
        if let Err(e) = self.register_taxonomies(&course) {
            return Err(rollback_failure(e, self.courses.update(&existing)));
        }
        Ok(course)
    }

    /// Remove a course by id. Nothing referencing the id is touched.
    pub fn delete_course(&self, user: &CurrentUser, id: u64) -> Result<Course, CoreError> {
        let result = self.try_delete(user, id);
        self.report("delete course", result, |c| {
            format!("Course '{}' (id {}) deleted", c.title, c.id)
        })
    }

    fn try_delete(&self, user: &CurrentUser, id: u64) -> Result<Course, CoreError> {
        Self::authorize(user, Role::can_manage_catalog, "delete courses")?;
        let course = self.courses.get(id)?.ok_or(CoreError::NotFound)?;
        self.courses.delete(id)?;
        Ok(course)
    }

    /// Replace the whole collection. The batch is validated up front and
    /// rejected as a unit if any record fails.
    pub fn replace_all(&self, user: &CurrentUser, courses: Vec<Course>) -> Result<usize, CoreError> {
        let result = self.try_replace_all(user, courses);
        self.report("replace catalog", result, |n| {
            format!("Catalog replaced with {n} courses")
        })
    }

    fn try_replace_all(&self, user: &CurrentUser, mut courses: Vec<Course>) -> Result<usize, CoreError> {
        Self::authorize(user, Role::can_manage_catalog, "replace the catalog")?;
        for course in courses.iter_mut() {
            sanitize_course(course);
        }
        for course in &courses {
            validate_course(course, &self.instructors).map_err(|e| {
                CoreError::Inconsistent(format!("course {} ({}): {e}", course.id, course.slug))
            })?;
        }
        let previous = self.courses.list()?;
        let count = courses.len();
        self.courses.replace_all(courses.clone())?;
        for course in &courses {
            if let Err(e) = self.register_taxonomies(course) {
                return Err(rollback_failure(e, self.courses.replace_all(previous)));
            }
        }
        Ok(count)
    }

    /// Stored courses that pass validation, optionally narrowed to one slug.
    ///
    /// Records that fail validation are left in storage but excluded from
    /// the result; each exclusion is logged and sent to the notifier.
    pub fn fetch_courses(&self, slug: Option<&str>) -> Result<Vec<Course>, CoreError> {
        let mut out = Vec::new();
        for course in self.courses.list()? {
            if let Some(wanted) = slug {
                if course.slug.as_str() != wanted {
                    continue;
                }
            }
            match validate_course(&course, &self.instructors) {
                Ok(()) => out.push(course),
                Err(e) => {
                    warn!(course_id = course.id, slug = %course.slug, error = %e, "excluding invalid course");
                    self.notifier.notify(
                        &format!("Course {} ({}) hidden: {e}", course.id, course.slug),
                        Severity::Warning,
                    );
                }
            }
        }
        debug!(count = out.len(), "fetched courses");
        Ok(out)
    }

    /// Stored courses that fail validation, with the reason.
    pub fn audit_catalog(&self) -> Result<Vec<InvalidRecord>, CoreError> {
        let mut out = Vec::new();
        for course in self.courses.list()? {
            if let Err(e) = validate_course(&course, &self.instructors) {
                out.push(InvalidRecord {
                    id: course.id,
                    slug: course.slug.to_string(),
                    reason: e.to_string(),
                });
            }
        }
        Ok(out)
    }

    pub fn get_course(&self, id: u64) -> Result<Course, CoreError> {
        self.courses.get(id)?.ok_or(CoreError::NotFound)
    }

    /// Bump the enrollment counter of a course.
    pub fn record_enrollment(&self, id: u64) -> Result<Course, CoreError> {
        let mut course = self.courses.get(id)?.ok_or(CoreError::NotFound)?;
        course.enrollment_count += 1;
        self.courses.update(&course)?;
        debug!(course_id = id, count = course.enrollment_count, "enrollment recorded");
        Ok(course)
    }

    pub fn categories(&self) -> Result<Vec<String>, CoreError> {
        self.taxonomies.list(Taxonomy::Category)
    }

    pub fn universities(&self) -> Result<Vec<String>, CoreError> {
        self.taxonomies.list(Taxonomy::University)
    }

    pub fn countries(&self) -> Result<Vec<String>, CoreError> {
        self.taxonomies.list(Taxonomy::Country)
    }

    pub fn instructors(&self) -> Result<Vec<Instructor>, CoreError> {
        self.instructors.list()
    }

    /// Register the course's university, category and countries. On failure,
    /// values registered by this call are removed again.
    fn register_taxonomies(&self, course: &Course) -> Result<(), CoreError> {
        let values = [
            (Taxonomy::University, course.university.as_str()),
            (Taxonomy::Category, course.category.as_str()),
        ]
        .into_iter()
        .chain(
            course
                .countries
                .iter()
                .map(|c| (Taxonomy::Country, c.as_str())),
        );

        let mut added = Vec::new();
        for (kind, value) in values {
            let value = value.trim();
            match self.taxonomies.register(kind, value) {
                Ok(true) => {
                    debug!(list = kind.storage_key(), value, "registered lookup value");
                    added.push((kind, value));
                }
                Ok(false) => {}
                Err(e) => {
                    let mut err = e;
                    for (kind, value) in added {
                        err = rollback_failure(err, self.taxonomies.unregister(kind, value));
                    }
                    return Err(err);
                }
            }
        }
        Ok(())
    }
}

/// Combine a failed mutation with the outcome of undoing it. A failed undo
/// leaves storage partly written, which the caller must hear about.
fn rollback_failure(cause: CoreError, undo: Result<(), CoreError>) -> CoreError {
    match undo {
        Ok(()) => cause,
        Err(undo_err) => {
            error!(error = %cause, rollback_error = %undo_err, "rollback failed");
            CoreError::Repository(format!("{cause}; rollback failed: {undo_err}"))
        }
    }
}

fn required_text(value: Option<String>, field: &str) -> Result<String, CoreError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(CoreError::invalid(field, "is required")),
    }
}

/// Normalize both start dates and repair a Gregorian date that disagrees
/// with the Jalali one.
fn reconcile_dates(jalali: &str, gregorian: &str) -> Result<(String, String), CoreError> {
    let jalali = to_ascii_digits(jalali.trim());
    let gregorian = to_ascii_digits(gregorian.trim());
    if dates_consistent(&jalali, &gregorian) {
        return Ok((jalali, gregorian));
    }
    match jalali_to_gregorian(&jalali) {
        Some(repaired) => {
            debug!(%jalali, from = %gregorian, to = %repaired, "repaired gregorian start date");
            Ok((jalali, repaired))
        }
        None => Err(CoreError::invalid(
            "startDateJalali",
            format!("'{jalali}' cannot be converted to a Gregorian date"),
        )),
    }
}

/// Fill in the missing discount field. A price that does not parse is left
/// for the validator to report.
fn derive_discount(
    price: &str,
    discount_price: Option<&str>,
    discount_percentage: Option<f64>,
) -> Result<(Option<String>, Option<f64>), CoreError> {
    let Some(price_value) = parse_localized_number(price) else {
        return Ok((discount_price.map(str::to_string), discount_percentage));
    };
    let given_price = discount_price.map(str::trim).filter(|s| !s.is_empty());
    let dp_value = match given_price {
        Some(s) => Some(
            parse_localized_number(s)
                .ok_or_else(|| CoreError::invalid("discountPrice", "not a number"))?,
        ),
        None => None,
    };
    match reconcile_discount(price_value, dp_value, discount_percentage)? {
        Discount::None => Ok((None, None)),
        Discount::Applied {
            price: derived,
            percentage,
        } => {
            let dp = match given_price {
                Some(s) => s.to_string(),
                None => format_integer(derived, NumeralSystem::detect(price)),
            };
            debug!(discount_price = %dp, percentage, "discount reconciled");
            Ok((Some(dp), Some(percentage)))
        }
    }
}

fn sanitize_syllabus(items: &mut [SyllabusItem]) {
    for item in items.iter_mut() {
        item.title = sanitize(&item.title);
        item.duration = sanitize(&item.duration);
        sanitize_opt(&mut item.preview_content);
        for content in item.contents.iter_mut() {
            sanitize_opt(&mut content.url);
            sanitize_opt(&mut content.text);
            sanitize_opt(&mut content.title);
        }
    }
}

fn sanitize_faqs(faqs: &mut [Faq]) {
    for faq in faqs.iter_mut() {
        faq.question = sanitize(&faq.question);
        faq.answer = sanitize(&faq.answer);
    }
}

fn sanitize_draft(draft: &mut CourseDraft) {
    for field in [
        &mut draft.title,
        &mut draft.instructor,
        &mut draft.description,
        &mut draft.duration,
        &mut draft.category,
        &mut draft.university,
        &mut draft.level,
        &mut draft.price,
    ] {
        *field = sanitize(field);
    }
    sanitize_opt(&mut draft.discount_price);
    sanitize_syllabus(&mut draft.syllabus);
    sanitize_faqs(&mut draft.faqs);
    sanitize_all(&mut draft.tags);
    sanitize_all(&mut draft.prerequisites);
    sanitize_all(&mut draft.countries);
}

fn sanitize_course(course: &mut Course) {
    for field in [
        &mut course.title,
        &mut course.instructor,
        &mut course.description,
        &mut course.duration,
        &mut course.category,
        &mut course.university,
        &mut course.level,
        &mut course.price,
        &mut course.start_date_jalali,
        &mut course.start_date_gregorian,
    ] {
        *field = sanitize(field);
    }
    sanitize_opt(&mut course.discount_price);
    sanitize_syllabus(&mut course.syllabus);
    sanitize_faqs(&mut course.faqs);
    sanitize_all(&mut course.tags);
    sanitize_all(&mut course.prerequisites);
    sanitize_all(&mut course.countries);
}

fn apply_update(course: &mut Course, update: CourseUpdate) -> Result<(), CoreError> {
    let CourseUpdate {
        title,
        instructor,
        description,
        duration,
        category,
        university,
        course_type,
        level,
        price,
        currency,
        discount_price,
        discount_percentage,
        start_date_jalali,
        start_date_gregorian,
        syllabus,
        faqs,
        tags,
        prerequisites,
        countries,
        is_open,
        is_featured,
    } = update;

    if let Some(v) = title {
        course.title = v;
    }
    if let Some(v) = instructor {
        course.instructor = v;
    }
    if let Some(v) = description {
        course.description = v;
    }
    if let Some(v) = duration {
        course.duration = v;
    }
    if let Some(v) = category {
        course.category = v;
    }
    if let Some(v) = university {
        course.university = v;
    }
    if let Some(v) = course_type {
        course.course_type = v;
    }
    if let Some(v) = level {
        course.level = v;
    }
    if let Some(v) = price {
        course.price = v;
    }
    if let Some(v) = currency {
        course.currency = v;
    }
    if let Some(v) = discount_price {
        course.discount_price = v;
    }
    if let Some(v) = discount_percentage {
        course.discount_percentage = v;
    }
    match (start_date_jalali, start_date_gregorian) {
        (Some(j), Some(g)) => {
            course.start_date_jalali = j;
            course.start_date_gregorian = g;
        }
        // The Gregorian date follows the Jalali one; reconcile_dates fills it in.
        (Some(j), None) => {
            course.start_date_jalali = j;
            course.start_date_gregorian.clear();
        }
        // A lone Gregorian change is mirrored back into the Jalali date.
        (None, Some(g)) => {
            let ascii = to_ascii_digits(g.trim());
            let j = gregorian_to_jalali(&ascii).ok_or_else(|| {
                CoreError::invalid(
                    "startDateGregorian",
                    format!("'{g}' is not a valid YYYY-MM-DD date"),
                )
            })?;
            course.start_date_jalali = j;
            course.start_date_gregorian = ascii;
        }
        (None, None) => {}
    }
    if let Some(v) = syllabus {
        course.syllabus = v;
    }
    if let Some(v) = faqs {
        course.faqs = v;
    }
    if let Some(v) = tags {
        course.tags = v;
    }
    if let Some(v) = prerequisites {
        course.prerequisites = v;
    }
    if let Some(v) = countries {
        course.countries = v;
    }
    if let Some(v) = is_open {
        course.is_open = v;
    }
    if let Some(v) = is_featured {
        course.is_featured = v;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory_repo::{
        InMemoryCourseRepo, InMemoryTaxonomyRepo, RecordingNotifier, StaticInstructors,
    };
    use crate::validate::tests::sample_course;
    use crate::{ContentItem, ContentType, CourseType, Currency, Slug};

    type Service =
        CatalogService<InMemoryCourseRepo, InMemoryTaxonomyRepo, StaticInstructors, RecordingNotifier>;

    fn service_with(repo: InMemoryCourseRepo) -> Service {
        CatalogService::new(
            repo,
            InMemoryTaxonomyRepo::new(),
            StaticInstructors::from_names(["Dr. Sara Ahmadi", "Dr. Reza Karimi"]),
            RecordingNotifier::new(),
        )
    }

    fn service() -> Service {
        service_with(InMemoryCourseRepo::new())
    }

    fn admin() -> CurrentUser {
        CurrentUser::new("admin", Role::Admin)
    }

    fn draft() -> CourseDraft {
        CourseDraft {
            title: "Composite Restorations".into(),
            instructor: "Dr. Sara Ahmadi".into(),
            description: "Layering techniques".into(),
            duration: "8 hours".into(),
            category: "Restorative Dentistry".into(),
            university: "Tehran University of Medical Sciences".into(),
            course_type: Some(CourseType::Online),
            level: "Intermediate".into(),
            price: "8,000,000".into(),
            currency: Some(Currency::Irr),
            discount_price: None,
            discount_percentage: Some(10.0),
            start_date_jalali: Some("1404/04/01".into()),
            start_date_gregorian: Some("2025-06-22".into()),
            syllabus: vec![SyllabusItem {
                id: 1,
                title: "Shade selection".into(),
                duration: "30 min".into(),
                completed: false,
                is_locked: true,
                preview_content: None,
                is_new: None,
                contents: vec![ContentItem {
                    kind: ContentType::Text,
                    url: None,
                    text: Some("Read before class".into()),
                    title: None,
                }],
            }],
            countries: vec!["Iran".into()],
            ..CourseDraft::default()
        }
    }

    #[test]
    fn add_then_fetch_end_to_end() {
        let mut existing = sample_course();
        existing.id = 4;
        let repo = InMemoryCourseRepo::new();
        repo.put(existing).unwrap();
        let svc = service_with(repo);

        let course = svc.add_course(&admin(), draft()).unwrap();
        assert_eq!(course.id, 5);
        assert_eq!(course.slug.as_str(), "composite-restorations");
        assert_eq!(course.discount_price.as_deref(), Some("7,200,000"));
        assert_eq!(course.discount_percentage, Some(10.0));
        assert_eq!(course.enrollment_count, 0);

        let all = svc.fetch_courses(None).unwrap();
        assert_eq!(all.len(), 2);
        let one = svc.fetch_courses(Some("composite-restorations")).unwrap();
        assert_eq!(one, vec![course]);
    }

    #[test]
    fn first_course_gets_id_one() {
        let svc = service();
        assert_eq!(svc.add_course(&admin(), draft()).unwrap().id, 1);
    }

    #[test]
    fn unknown_instructor_leaves_catalog_untouched() {
        let svc = service();
        let before = svc.categories().unwrap();
        let mut d = draft();
        d.instructor = "Dr. Nobody".into();
        d.category = "Brand New Category".into();
        let err = svc.add_course(&admin(), d).unwrap_err();
        assert!(matches!(err, CoreError::UnknownInstructor(_)));
        assert!(svc.fetch_courses(None).unwrap().is_empty());
        assert_eq!(svc.categories().unwrap(), before);
    }

    #[test]
    fn students_cannot_add() {
        let svc = service();
        let student = CurrentUser::new("s", Role::Student);
        let err = svc.add_course(&student, draft()).unwrap_err();
        assert!(matches!(err, CoreError::Unauthorized(_)));
        assert!(svc.fetch_courses(None).unwrap().is_empty());
        let notes = svc.notifier.messages();
        assert_eq!(notes.last().map(|n| n.1), Some(Severity::Error));
    }

    #[test]
    fn instructors_can_add() {
        let svc = service();
        let user = CurrentUser::new("Dr. Reza Karimi", Role::Instructor);
        assert!(svc.add_course(&user, draft()).is_ok());
    }

    #[test]
    fn gregorian_mismatch_is_repaired() {
        let svc = service();
        let mut d = draft();
        d.start_date_gregorian = Some("2025-06-30".into());
        let course = svc.add_course(&admin(), d).unwrap();
        assert_eq!(course.start_date_gregorian, "2025-06-22");
    }

    #[test]
    fn bad_or_missing_dates_rejected() {
        let svc = service();
        let mut d = draft();
        d.start_date_jalali = Some("1404/12/30".into());
        assert!(svc.add_course(&admin(), d).is_err());

        let mut d = draft();
        d.start_date_gregorian = None;
        let err = svc.add_course(&admin(), d).unwrap_err();
        assert!(err.to_string().contains("startDateGregorian"));
        assert!(svc.fetch_courses(None).unwrap().is_empty());
    }

    #[test]
    fn text_fields_are_sanitized() {
        let svc = service();
        let mut d = draft();
        d.description = "Intro<script>alert(1)</script>".into();
        d.syllabus[0].contents[0].text = Some("<b onclick=\"x()\">Read</b>".into());
        d.tags = vec!["<iframe src=x></iframe>endo".into()];
        let course = svc.add_course(&admin(), d).unwrap();
        assert_eq!(course.description, "Intro");
        assert_eq!(course.syllabus[0].contents[0].text.as_deref(), Some("<b>Read</b>"));
        assert_eq!(course.tags, vec!["endo".to_string()]);
    }

    #[test]
    fn slug_collisions_are_suffixed() {
        let svc = service();
        let a = svc.add_course(&admin(), draft()).unwrap();
        let b = svc.add_course(&admin(), draft()).unwrap();
        assert_eq!(a.slug.as_str(), "composite-restorations");
        assert_eq!(b.slug.as_str(), "composite-restorations-2");
    }

    #[test]
    fn empty_slug_rejected() {
        let svc = service();
        let mut d = draft();
        d.title = "!!!".into();
        assert!(svc.add_course(&admin(), d).is_err());
    }

    #[test]
    fn new_lookup_values_registered_on_success() {
        let svc = service();
        let mut d = draft();
        d.university = "Kazan State Medical University".into();
        d.countries = vec!["Iran".into(), "Armenia".into()];
        svc.add_course(&admin(), d).unwrap();
        assert!(svc
            .universities()
            .unwrap()
            .contains(&"Kazan State Medical University".to_string()));
        let countries = svc.countries().unwrap();
        assert_eq!(countries.iter().filter(|c| *c == "Iran").count(), 1);
        assert!(countries.contains(&"Armenia".to_string()));
    }

    #[test]
    fn discount_mismatch_rejected() {
        let svc = service();
        let mut d = draft();
        d.discount_price = Some("7,000,000".into());
        d.discount_percentage = Some(10.0);
        let err = svc.add_course(&admin(), d).unwrap_err();
        assert!(matches!(err, CoreError::Inconsistent(_)));
    }

    #[test]
    fn persian_price_keeps_persian_digits() {
        let svc = service();
        let mut d = draft();
        d.price = "۶,۰۰۰,۰۰۰".into();
        let course = svc.add_course(&admin(), d).unwrap();
        assert_eq!(course.discount_price.as_deref(), Some("۵,۴۰۰,۰۰۰"));
    }

    #[test]
    fn delete_requires_admin_roles() {
        let svc = service();
        let course = svc.add_course(&admin(), draft()).unwrap();
        let instructor = CurrentUser::new("Dr. Sara Ahmadi", Role::Instructor);
        assert!(matches!(
            svc.delete_course(&instructor, course.id),
            Err(CoreError::Unauthorized(_))
        ));
        let root = CurrentUser::new("root", Role::SuperAdmin);
        svc.delete_course(&root, course.id).unwrap();
        assert!(matches!(
            svc.delete_course(&root, course.id),
            Err(CoreError::NotFound)
        ));
    }

    #[test]
    fn fetch_hides_invalid_records_without_deleting() {
        let mut broken = sample_course();
        broken.id = 9;
        broken.slug = Slug::new("broken").unwrap();
        broken.start_date_gregorian = "2025-06-23".into();
        let repo = InMemoryCourseRepo::new();
        repo.put(sample_course()).unwrap();
        repo.put(broken).unwrap();
        let svc = service_with(repo);

        let visible = svc.fetch_courses(None).unwrap();
        assert_eq!(visible.len(), 1);
        assert!(svc.get_course(9).is_ok());
        let audit = svc.audit_catalog().unwrap();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].id, 9);
        assert!(svc
            .notifier
            .messages()
            .iter()
            .any(|(_, s)| *s == Severity::Warning));
    }

    #[test]
    fn update_rederives_and_validates_as_a_whole() {
        let svc = service();
        let course = svc.add_course(&admin(), draft()).unwrap();

        let updated = svc
            .update_course(
                &admin(),
                course.id,
                CourseUpdate::new().title("Composite Layering").discount_percentage(25.0),
            )
            .unwrap();
        assert_eq!(updated.slug.as_str(), "composite-layering");
        assert_eq!(updated.discount_price.as_deref(), Some("6,000,000"));

        let repriced = svc
            .update_course(&admin(), course.id, CourseUpdate::new().price("10,000,000"))
            .unwrap();
        assert_eq!(repriced.discount_price.as_deref(), Some("7,500,000"));
        assert_eq!(repriced.discount_percentage, Some(25.0));

        let moved = svc
            .update_course(&admin(), course.id, CourseUpdate::new().start_date_jalali("1404/05/01"))
            .unwrap();
        assert_eq!(moved.start_date_gregorian, "2025-07-23");

        let err = svc
            .update_course(&admin(), course.id, CourseUpdate::new().countries(vec![]))
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidField { .. }));
        assert_eq!(svc.get_course(course.id).unwrap(), moved);
    }

    #[test]
    fn update_unknown_course() {
        let svc = service();
        assert!(matches!(
            svc.update_course(&admin(), 42, CourseUpdate::new().title("x")),
            Err(CoreError::NotFound)
        ));
    }

    #[test]
    fn replace_all_rejects_whole_batch() {
        let svc = service();
        svc.add_course(&admin(), draft()).unwrap();

        let good = sample_course();
        let mut bad = sample_course();
        bad.id = 2;
        bad.slug = Slug::new("bad").unwrap();
        bad.countries.clear();
        assert!(svc.replace_all(&admin(), vec![good.clone(), bad]).is_err());
        assert_eq!(svc.fetch_courses(None).unwrap()[0].slug.as_str(), "composite-restorations");

        assert_eq!(svc.replace_all(&admin(), vec![good]).unwrap(), 1);
        assert_eq!(svc.fetch_courses(None).unwrap()[0].slug.as_str(), "advanced-endodontics");
    }

    #[test]
    fn enrollment_counter() {
        let svc = service();
        let course = svc.add_course(&admin(), draft()).unwrap();
        svc.record_enrollment(course.id).unwrap();
        assert_eq!(svc.record_enrollment(course.id).unwrap().enrollment_count, 2);
    }

    #[test]
    fn lone_gregorian_change_is_mirrored_into_jalali() {
        let svc = service();
        let course = svc.add_course(&admin(), draft()).unwrap();
        let moved = svc
            .update_course(
                &admin(),
                course.id,
                CourseUpdate::new().start_date_gregorian("2025-07-23"),
            )
            .unwrap();
        assert_eq!(moved.start_date_jalali, "1404/05/01");
        assert_eq!(moved.start_date_gregorian, "2025-07-23");
    }

    #[test]
    fn unconvertible_gregorian_change_is_rejected() {
        let svc = service();
        let course = svc.add_course(&admin(), draft()).unwrap();
        let err = svc
            .update_course(
                &admin(),
                course.id,
                CourseUpdate::new().start_date_gregorian("2025-02-30"),
            )
            .unwrap_err();
        assert!(
            matches!(&err, CoreError::InvalidField { field, .. } if field == "startDateGregorian"),
            "got {err:?}"
        );
        let stored = svc.get_course(course.id).unwrap();
        assert_eq!(stored.start_date_jalali, "1404/04/01");
        assert_eq!(stored.start_date_gregorian, "2025-06-22");
    }

    #[test]
    fn replace_all_sanitizes_before_storing() {
        let svc = service();
        let mut course = sample_course();
        course.description = "x<script>alert(1)</script>".into();
        course.tags = vec!["<b onclick=\"x()\">endo</b>".into()];
        assert_eq!(svc.replace_all(&admin(), vec![course]).unwrap(), 1);

        let stored = svc.get_course(1).unwrap();
        assert_eq!(stored.description, "x");
        assert_eq!(stored.tags, vec!["<b>endo</b>"]);
    }

    struct BrokenTaxonomies;

    impl TaxonomyRepository for BrokenTaxonomies {
        fn list(&self, kind: Taxonomy) -> Result<Vec<String>, CoreError> {
            Ok(kind.seed().iter().map(|s| s.to_string()).collect())
        }

        fn register(&self, _kind: Taxonomy, _value: &str) -> Result<bool, CoreError> {
            Err(CoreError::Repository("lookup store offline".into()))
        }

        fn unregister(&self, _kind: Taxonomy, _value: &str) -> Result<(), CoreError> {
            Ok(())
        }
    }

    /// Course store whose deletes always fail.
    struct UndeletableCourses(InMemoryCourseRepo);

    impl CourseRepository for UndeletableCourses {
        fn get(&self, id: u64) -> Result<Option<Course>, CoreError> {
            self.0.get(id)
        }
        fn get_by_slug(&self, slug: &Slug) -> Result<Option<Course>, CoreError> {
            self.0.get_by_slug(slug)
        }
        fn put(&self, course: Course) -> Result<(), CoreError> {
            self.0.put(course)
        }
        fn update(&self, course: &Course) -> Result<(), CoreError> {
            self.0.update(course)
        }
        fn delete(&self, _id: u64) -> Result<(), CoreError> {
            Err(CoreError::Repository("disk detached".into()))
        }
        fn list(&self) -> Result<Vec<Course>, CoreError> {
            self.0.list()
        }
        fn max_id(&self) -> Result<Option<u64>, CoreError> {
            self.0.max_id()
        }
        fn replace_all(&self, courses: Vec<Course>) -> Result<(), CoreError> {
            self.0.replace_all(courses)
        }
    }

    #[test]
    fn failed_registration_rolls_back_the_add() {
        let svc = CatalogService::new(
            InMemoryCourseRepo::new(),
            BrokenTaxonomies,
            StaticInstructors::from_names(["Dr. Sara Ahmadi"]),
            RecordingNotifier::new(),
        );
        let err = svc.add_course(&admin(), draft()).unwrap_err();
        assert_eq!(err.to_string(), CoreError::Repository("lookup store offline".into()).to_string());
        assert!(svc.fetch_courses(None).unwrap().is_empty());
    }

    #[test]
    fn failed_rollback_is_reported() {
        let svc = CatalogService::new(
            UndeletableCourses(InMemoryCourseRepo::new()),
            BrokenTaxonomies,
            StaticInstructors::from_names(["Dr. Sara Ahmadi"]),
            RecordingNotifier::new(),
        );
        let err = svc.add_course(&admin(), draft()).unwrap_err();
        let msg = err.to_string();
        assert!(matches!(err, CoreError::Repository(_)));
        assert!(msg.contains("lookup store offline"), "{msg}");
        assert!(msg.contains("rollback failed") && msg.contains("disk detached"), "{msg}");
    }
}
