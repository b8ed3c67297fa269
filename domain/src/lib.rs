//! Domain library for the dental course catalog.
//!
//! Holds the course records, the ports (traits) adapters implement, and the
//! error type. Keep storage and IO concerns out of this crate; the SQLite
//! adapter and the CLI live in their own workspace members.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A URL-safe, locale-aware identifier derived from a course title.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Slug(String);

impl Slug {
    pub fn new<S: Into<String>>(s: S) -> Result<Self, CoreError> {
        let val = s.into();
        if val.is_empty() {
            return Err(CoreError::InvalidSlug("empty".into()));
        }
        if !slug::is_slug_text(&val) {
            return Err(CoreError::InvalidSlug("invalid characters".into()));
        }
        Ok(Self(val))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Slug {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Slug::new(value)
    }
}

impl From<Slug> for String {
    fn from(slug: Slug) -> Self {
        slug.0
    }
}

impl Display for Slug {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Delivery format of a course.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CourseType {
    Online,
    Offline,
    #[serde(rename = "In-Person")]
    InPerson,
    Hybrid,
}

impl CourseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CourseType::Online => "Online",
            CourseType::Offline => "Offline",
            CourseType::InPerson => "In-Person",
            CourseType::Hybrid => "Hybrid",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "online" => Some(CourseType::Online),
            "offline" => Some(CourseType::Offline),
            "in-person" | "inperson" | "in person" => Some(CourseType::InPerson),
            "hybrid" => Some(CourseType::Hybrid),
            _ => None,
        }
    }
}

/// Currencies a course can be priced in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    #[serde(rename = "IRR")]
    Irr,
    #[serde(rename = "RUB")]
    Rub,
    #[serde(rename = "CNY")]
    Cny,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Irr => "IRR",
            Currency::Rub => "RUB",
            Currency::Cny => "CNY",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "IRR" => Some(Currency::Irr),
            "RUB" => Some(Currency::Rub),
            "CNY" => Some(Currency::Cny),
            _ => None,
        }
    }
}

/// Kind of material inside a syllabus item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Video,
    Image,
    Text,
    Quiz,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Video => "video",
            ContentType::Image => "image",
            ContentType::Text => "text",
            ContentType::Quiz => "quiz",
        }
    }
}

/// A single piece of material attached to a syllabus item.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    #[serde(rename = "type")]
    pub kind: ContentType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// One chapter of a course syllabus.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyllabusItem {
    pub id: u64,
    pub title: String,
    pub duration: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub is_locked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_new: Option<bool>,
    #[serde(default)]
    pub contents: Vec<ContentItem>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Faq {
    pub id: u64,
    pub question: String,
    pub answer: String,
}

/// Stored course record. Only the catalog service creates or mutates these.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: u64,
    pub slug: Slug,
    pub title: String,
    pub instructor: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub duration: String,
    pub category: String,
    pub university: String,
    pub course_type: CourseType,
    #[serde(default)]
    pub level: String,
    /// Localized numeral string, e.g. "۶,۰۰۰,۰۰۰".
    pub price: String,
    pub currency: Currency,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_percentage: Option<f64>,
    pub start_date_jalali: String,
    pub start_date_gregorian: String,
    #[serde(default)]
    pub syllabus: Vec<SyllabusItem>,
    #[serde(default)]
    pub faqs: Vec<Faq>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub prerequisites: Vec<String>,
    #[serde(default)]
    pub countries: Vec<String>,
    #[serde(default)]
    pub enrollment_count: u64,
    #[serde(default)]
    pub is_open: bool,
    #[serde(default)]
    pub is_featured: bool,
}

/// Caller-supplied course data for `CatalogService::add_course`.
///
/// Dates are optional here so that a missing date surfaces as a field error
/// instead of a decode failure.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CourseDraft {
    pub title: String,
    pub instructor: String,
    pub description: String,
    pub duration: String,
    pub category: String,
    pub university: String,
    pub course_type: Option<CourseType>,
    pub level: String,
    pub price: String,
    pub currency: Option<Currency>,
    pub discount_price: Option<String>,
    pub discount_percentage: Option<f64>,
    pub start_date_jalali: Option<String>,
    pub start_date_gregorian: Option<String>,
    pub syllabus: Vec<SyllabusItem>,
    pub faqs: Vec<Faq>,
    pub tags: Vec<String>,
    pub prerequisites: Vec<String>,
    pub countries: Vec<String>,
    pub is_open: bool,
    pub is_featured: bool,
}

/// Explicit edit command for a stored course. Unset fields keep their value.
///
/// `discount_price`/`discount_percentage` use a nested option so an update
/// can clear a discount (`Some(None)`).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CourseUpdate {
    pub title: Option<String>,
    pub instructor: Option<String>,
    pub description: Option<String>,
    pub duration: Option<String>,
    pub category: Option<String>,
    pub university: Option<String>,
    pub course_type: Option<CourseType>,
    pub level: Option<String>,
    pub price: Option<String>,
    pub currency: Option<Currency>,
    pub discount_price: Option<Option<String>>,
    pub discount_percentage: Option<Option<f64>>,
    pub start_date_jalali: Option<String>,
    pub start_date_gregorian: Option<String>,
    pub syllabus: Option<Vec<SyllabusItem>>,
    pub faqs: Option<Vec<Faq>>,
    pub tags: Option<Vec<String>>,
    pub prerequisites: Option<Vec<String>>,
    pub countries: Option<Vec<String>>,
    pub is_open: Option<bool>,
    pub is_featured: Option<bool>,
}

impl CourseUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn instructor(mut self, name: impl Into<String>) -> Self {
        self.instructor = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn university(mut self, university: impl Into<String>) -> Self {
        self.university = Some(university.into());
        self
    }

    pub fn course_type(mut self, course_type: CourseType) -> Self {
        self.course_type = Some(course_type);
        self
    }

    pub fn price(mut self, price: impl Into<String>) -> Self {
        self.price = Some(price.into());
        self
    }

    pub fn currency(mut self, currency: Currency) -> Self {
        self.currency = Some(currency);
        self
    }

    /// Set a discount percentage; the discount price is derived from it.
    pub fn discount_percentage(mut self, pct: f64) -> Self {
        self.discount_percentage = Some(Some(pct));
        self.discount_price = Some(None);
        self
    }

    /// Set a discount price; the percentage is derived from it.
    pub fn discount_price(mut self, price: impl Into<String>) -> Self {
        self.discount_price = Some(Some(price.into()));
        self.discount_percentage = Some(None);
        self
    }

    pub fn clear_discount(mut self) -> Self {
        self.discount_price = Some(None);
        self.discount_percentage = Some(None);
        self
    }

    /// Set the Jalali start date; the Gregorian date is recomputed from it.
    pub fn start_date_jalali(mut self, date: impl Into<String>) -> Self {
        self.start_date_jalali = Some(date.into());
        self
    }

    /// Set the Gregorian start date; the Jalali date is mirrored from it.
    pub fn start_date_gregorian(mut self, date: impl Into<String>) -> Self {
        self.start_date_gregorian = Some(date.into());
        self
    }

    pub fn syllabus(mut self, syllabus: Vec<SyllabusItem>) -> Self {
        self.syllabus = Some(syllabus);
        self
    }

    pub fn countries(mut self, countries: Vec<String>) -> Self {
        self.countries = Some(countries);
        self
    }

    pub fn tags(mut self, tags: Vec<String>) -> Self {
        self.tags = Some(tags);
        self
    }

    pub fn is_open(mut self, open: bool) -> Self {
        self.is_open = Some(open);
        self
    }

    pub fn is_featured(mut self, featured: bool) -> Self {
        self.is_featured = Some(featured);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Access level of the acting user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    SuperAdmin,
    Admin,
    Instructor,
    Blogger,
    Student,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "SuperAdmin",
            Role::Admin => "Admin",
            Role::Instructor => "Instructor",
            Role::Blogger => "Blogger",
            Role::Student => "Student",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "superadmin" | "super-admin" | "super_admin" => Some(Role::SuperAdmin),
            "admin" => Some(Role::Admin),
            "instructor" => Some(Role::Instructor),
            "blogger" => Some(Role::Blogger),
            "student" => Some(Role::Student),
            _ => None,
        }
    }

    /// Roles allowed to create and edit courses.
    pub fn can_author_courses(&self) -> bool {
        matches!(self, Role::SuperAdmin | Role::Admin | Role::Instructor)
    }

    /// Roles allowed to delete courses or replace the catalog.
    pub fn can_manage_catalog(&self) -> bool {
        matches!(self, Role::SuperAdmin | Role::Admin)
    }
}

/// The acting user, as seen by authorization checks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CurrentUser {
    pub name: String,
    pub role: Role,
}

impl CurrentUser {
    pub fn new(name: impl Into<String>, role: Role) -> Self {
        Self {
            name: name.into(),
            role,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instructor {
    pub name: String,
}

/// Notification severity, mirroring the UI snackbar levels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Success => "success",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

/// Global lookup lists that grow as courses are added.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Taxonomy {
    University,
    Category,
    Country,
}

impl Taxonomy {
    pub const ALL: [Taxonomy; 3] = [Taxonomy::University, Taxonomy::Category, Taxonomy::Country];

    /// Persistence key of the list.
    pub fn storage_key(&self) -> &'static str {
        match self {
            Taxonomy::University => "courseUniversities",
            Taxonomy::Category => "courseCategories",
            Taxonomy::Country => "courseCountries",
        }
    }

    pub fn from_storage_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.storage_key() == key)
    }

    /// Built-in values used when nothing valid is stored.
    pub fn seed(&self) -> &'static [&'static str] {
        match self {
            Taxonomy::University => &[
                "Tehran University of Medical Sciences",
                "Shahid Beheshti University of Medical Sciences",
                "Moscow State University of Medicine and Dentistry",
                "Peking University School of Stomatology",
            ],
            Taxonomy::Category => &[
                "Restorative Dentistry",
                "Endodontics",
                "Orthodontics",
                "Periodontics",
                "Implantology",
            ],
            Taxonomy::Country => &["Iran", "Russia", "China"],
        }
    }
}

/// Repository port for course records, keyed by id.
pub trait CourseRepository: Send + Sync {
    fn get(&self, id: u64) -> Result<Option<Course>, CoreError>;
    fn get_by_slug(&self, slug: &Slug) -> Result<Option<Course>, CoreError>;
    fn slug_exists(&self, slug: &Slug) -> Result<bool, CoreError> {
        Ok(self.get_by_slug(slug)?.is_some())
    }
    /// Insert a new record. Fails with `AlreadyExists` on an id or slug clash.
    fn put(&self, course: Course) -> Result<(), CoreError>;
    /// Replace an existing record.
    fn update(&self, course: &Course) -> Result<(), CoreError>;
    fn delete(&self, id: u64) -> Result<(), CoreError>;
    /// All records in ascending id order.
    fn list(&self) -> Result<Vec<Course>, CoreError>;
    fn max_id(&self) -> Result<Option<u64>, CoreError>;
    /// Swap the whole collection in one step.
    fn replace_all(&self, courses: Vec<Course>) -> Result<(), CoreError>;
}

/// Repository port for the university/category/country lists.
pub trait TaxonomyRepository: Send + Sync {
    fn list(&self, kind: Taxonomy) -> Result<Vec<String>, CoreError>;
    /// Returns false when the value was already registered.
    fn register(&self, kind: Taxonomy, value: &str) -> Result<bool, CoreError>;
    fn unregister(&self, kind: Taxonomy, value: &str) -> Result<(), CoreError>;
}

/// Directory of known instructors, used for existence checks.
pub trait InstructorDirectory: Send + Sync {
    fn exists(&self, name: &str) -> Result<bool, CoreError>;
    fn list(&self) -> Result<Vec<Instructor>, CoreError>;
}

/// Fire-and-forget notification sink.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str, severity: Severity);
}

/// Broad class of a `CoreError`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    Authorization,
    Referential,
    Format,
    Consistency,
    Storage,
}

/// Core domain errors.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("instructor not found: {0}")]
    UnknownInstructor(String),
    #[error("not found")]
    NotFound,
    #[error("invalid slug: {0}")]
    InvalidSlug(String),
    #[error("invalid {field}: {reason}")]
    InvalidField { field: String, reason: String },
    #[error("inconsistent record: {0}")]
    Inconsistent(String),
    #[error("resource already exists")]
    AlreadyExists,
    #[error("repository error: {0}")]
    Repository(String),
}

impl CoreError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        CoreError::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            CoreError::Unauthorized(_) => ErrorClass::Authorization,
            CoreError::UnknownInstructor(_) | CoreError::NotFound => ErrorClass::Referential,
            CoreError::InvalidSlug(_) | CoreError::InvalidField { .. } => ErrorClass::Format,
            CoreError::Inconsistent(_) | CoreError::AlreadyExists => ErrorClass::Consistency,
            CoreError::Repository(_) => ErrorClass::Storage,
        }
    }
}


pub mod adapters;
pub mod discount;
pub mod jalali;
pub mod numerals;
pub mod sanitize;
pub mod service;
pub mod slug;
pub mod validate;
