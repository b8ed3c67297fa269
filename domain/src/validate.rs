//! Course record validation.
//!
//! `validate_course` is the single accept/reject pass every stored course
//! must survive. Checks run in a fixed order and stop at the first failure.

use std::collections::HashSet;

use crate::discount::check_discount_fields;
use crate::jalali::{dates_consistent, is_valid_gregorian, is_valid_jalali};
use crate::numerals::parse_localized_number;
use crate::{ContentItem, ContentType, CoreError, Course, InstructorDirectory, Slug, SyllabusItem};

pub const MAX_TITLE_CHARS: usize = 100;
pub const MAX_DURATION_CHARS: usize = 50;
pub const MAX_TEXT_CHARS: usize = 500;

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn require_non_blank(value: &str, field: &str) -> Result<(), CoreError> {
    if value.trim().is_empty() {
        return Err(CoreError::invalid(field, "must not be blank"));
    }
    Ok(())
}

fn require_max_len(value: &str, max: usize, field: &str) -> Result<(), CoreError> {
    if char_len(value) > max {
        return Err(CoreError::invalid(
            field,
            format!("longer than {max} characters"),
        ));
    }
    Ok(())
}

/// Absolute http(s) URL with a non-empty host part.
fn is_absolute_http_url(s: &str) -> bool {
    let Some((scheme, rest)) = s.split_once("://") else {
        return false;
    };
    if !scheme.eq_ignore_ascii_case("https") && !scheme.eq_ignore_ascii_case("http") {
        return false;
    }
    let host = rest.split(['/', '?', '#']).next().unwrap_or("");
    !host.is_empty() && !s.chars().any(char::is_whitespace)
}

fn is_asset_path(s: &str) -> bool {
    s.starts_with("/assets/") && s.len() > "/assets/".len() && !s.chars().any(char::is_whitespace)
}

/// Check one content item. `path` prefixes field names in errors.
pub fn validate_content_item(item: &ContentItem, path: &str) -> Result<(), CoreError> {
    if let Some(url) = &item.url {
        let ok = is_absolute_http_url(url)
            || (item.kind == ContentType::Image && is_asset_path(url));
        if !ok {
            let reason = if item.kind == ContentType::Image {
                "must be an absolute http(s) URL or an /assets/ path"
            } else {
                "must be an absolute http(s) URL"
            };
            return Err(CoreError::invalid(format!("{path}.url"), reason));
        }
    }
    if let Some(text) = &item.text {
        require_max_len(text, MAX_TEXT_CHARS, &format!("{path}.text"))?;
    }
    if let Some(title) = &item.title {
        require_max_len(title, MAX_TITLE_CHARS, &format!("{path}.title"))?;
    }
    Ok(())
}

/// Check one syllabus item and its contents.
pub fn validate_syllabus_item(item: &SyllabusItem, path: &str) -> Result<(), CoreError> {
    require_non_blank(&item.title, &format!("{path}.title"))?;
    require_max_len(&item.title, MAX_TITLE_CHARS, &format!("{path}.title"))?;
    require_non_blank(&item.duration, &format!("{path}.duration"))?;
    require_max_len(&item.duration, MAX_DURATION_CHARS, &format!("{path}.duration"))?;
    if let Some(preview) = &item.preview_content {
        require_max_len(preview, MAX_TEXT_CHARS, &format!("{path}.previewContent"))?;
    }
    for (i, content) in item.contents.iter().enumerate() {
        validate_content_item(content, &format!("{path}.contents[{i}]"))?;
    }
    Ok(())
}

fn validate_syllabus(items: &[SyllabusItem]) -> Result<(), CoreError> {
    let mut seen = HashSet::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let path = format!("syllabus[{i}]");
        if !seen.insert(item.id) {
            return Err(CoreError::invalid(
                format!("{path}.id"),
                format!("duplicate id {}", item.id),
            ));
        }
        validate_syllabus_item(item, &path)?;
    }
    Ok(())
}

fn validate_countries(countries: &[String]) -> Result<(), CoreError> {
    if countries.is_empty() {
        return Err(CoreError::invalid("countries", "at least one country is required"));
    }
    for (i, c) in countries.iter().enumerate() {
        require_non_blank(c, &format!("countries[{i}]"))?;
    }
    Ok(())
}

fn validate_price(price: &str) -> Result<(), CoreError> {
    match parse_localized_number(price) {
        Some(v) if v > 0.0 => Ok(()),
        Some(_) => Err(CoreError::invalid("price", "must be greater than zero")),
        None => Err(CoreError::invalid("price", "not a number")),
    }
}

fn validate_dates(jalali: &str, gregorian: &str) -> Result<(), CoreError> {
    if !is_valid_jalali(jalali) {
        return Err(CoreError::invalid(
            "startDateJalali",
            format!("'{jalali}' is not a valid YYYY/MM/DD Jalali date"),
        ));
    }
    if !is_valid_gregorian(gregorian) {
        return Err(CoreError::invalid(
            "startDateGregorian",
            format!("'{gregorian}' is not a valid YYYY-MM-DD date"),
        ));
    }
    if !dates_consistent(jalali, gregorian) {
        return Err(CoreError::Inconsistent(format!(
            "start dates disagree: {jalali} (Jalali) vs {gregorian} (Gregorian)"
        )));
    }
    Ok(())
}

/// Full accept/reject pass over a course record.
///
/// Order: instructor, category/university, course type, syllabus, currency,
/// countries, price, discount, dates. Course type and currency are closed
/// enums, so they are already enforced when the record is built.
pub fn validate_course<I>(course: &Course, instructors: &I) -> Result<(), CoreError>
where
    I: InstructorDirectory + ?Sized,
{
    if !instructors.exists(&course.instructor)? {
        return Err(CoreError::UnknownInstructor(course.instructor.clone()));
    }
    require_non_blank(&course.category, "category")?;
    require_non_blank(&course.university, "university")?;
    validate_syllabus(&course.syllabus)?;
    validate_countries(&course.countries)?;
    validate_price(&course.price)?;
    check_discount_fields(
        &course.price,
        course.discount_price.as_deref(),
        course.discount_percentage,
    )?;
    validate_dates(&course.start_date_jalali, &course.start_date_gregorian)?;
    // Slugs are normally checked at decode time; records built in code can
    // still carry a hand-made one.
    Slug::new(course.slug.as_str())?;
    Ok(())
}

/// Predicate form of `validate_course`; directory failures count as invalid.
pub fn is_valid_course<I>(course: &Course, instructors: &I) -> bool
where
    I: InstructorDirectory + ?Sized,
{
    validate_course(course, instructors).is_ok()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::adapters::memory_repo::StaticInstructors;
    use crate::{CourseType, Currency, Faq};

    pub(crate) fn sample_course() -> Course {
        Course {
            id: 1,
            slug: Slug::new("advanced-endodontics").unwrap(),
            title: "Advanced Endodontics".into(),
            instructor: "Dr. Sara Ahmadi".into(),
            description: "Root canal therapy in depth".into(),
            duration: "12 hours".into(),
            category: "Endodontics".into(),
            university: "Tehran University of Medical Sciences".into(),
            course_type: CourseType::Online,
            level: "Advanced".into(),
            price: "6,000,000".into(),
            currency: Currency::Irr,
            discount_price: Some("5,400,000".into()),
            discount_percentage: Some(10.0),
            start_date_jalali: "1404/04/01".into(),
            start_date_gregorian: "2025-06-22".into(),
            syllabus: vec![SyllabusItem {
                id: 1,
                title: "Access cavity design".into(),
                duration: "45 min".into(),
                completed: false,
                is_locked: false,
                preview_content: Some("Why access matters".into()),
                is_new: Some(true),
                contents: vec![
                    ContentItem {
                        kind: ContentType::Video,
                        url: Some("https://cdn.example.com/v/1.mp4".into()),
                        text: None,
                        title: Some("Lecture".into()),
                    },
                    ContentItem {
                        kind: ContentType::Image,
                        url: Some("/assets/images/access.png".into()),
                        text: None,
                        title: None,
                    },
                ],
            }],
            faqs: vec![Faq {
                id: 1,
                question: "Is there a certificate?".into(),
                answer: "Yes".into(),
            }],
            tags: vec!["endo".into()],
            prerequisites: vec![],
            countries: vec!["Iran".into()],
            enrollment_count: 0,
            is_open: true,
            is_featured: false,
        }
    }

    fn directory() -> StaticInstructors {
        StaticInstructors::from_names(["Dr. Sara Ahmadi"])
    }

    #[test]
    fn sample_is_valid() {
        assert!(validate_course(&sample_course(), &directory()).is_ok());
        assert!(is_valid_course(&sample_course(), &directory()));
    }

    #[test]
    fn unknown_instructor_rejected_first() {
        let mut c = sample_course();
        c.instructor = "Nobody".into();
        c.category = " ".into();
        let err = validate_course(&c, &directory()).unwrap_err();
        assert!(matches!(err, CoreError::UnknownInstructor(_)));
    }

    #[test]
    fn blank_category_and_university() {
        let mut c = sample_course();
        c.category = "  ".into();
        assert!(matches!(
            validate_course(&c, &directory()),
            Err(CoreError::InvalidField { field, .. }) if field == "category"
        ));
        let mut c = sample_course();
        c.university = String::new();
        assert!(validate_course(&c, &directory()).is_err());
    }

    #[test]
    fn syllabus_bounds() {
        let mut c = sample_course();
        c.syllabus[0].title = "x".repeat(101);
        assert!(validate_course(&c, &directory()).is_err());

        let mut c = sample_course();
        c.syllabus[0].title = "ت".repeat(100);
        assert!(validate_course(&c, &directory()).is_ok());

        let mut c = sample_course();
        c.syllabus[0].duration = "d".repeat(51);
        assert!(validate_course(&c, &directory()).is_err());

        let mut c = sample_course();
        c.syllabus[0].preview_content = Some("p".repeat(501));
        assert!(validate_course(&c, &directory()).is_err());

        let mut c = sample_course();
        let dup = c.syllabus[0].clone();
        c.syllabus.push(dup);
        let err = validate_course(&c, &directory()).unwrap_err();
        assert!(err.to_string().contains("duplicate id"));
    }

    #[test]
    fn content_urls() {
        let video = |url: &str| ContentItem {
            kind: ContentType::Video,
            url: Some(url.into()),
            text: None,
            title: None,
        };
        assert!(validate_content_item(&video("http://a.b/c"), "c").is_ok());
        assert!(validate_content_item(&video("/assets/x.mp4"), "c").is_err());
        assert!(validate_content_item(&video("ftp://a.b"), "c").is_err());
        assert!(validate_content_item(&video("https://"), "c").is_err());
        assert!(validate_content_item(&video("HTTPS://cdn.example.com/x.mp4"), "c").is_ok());
        assert!(validate_content_item(&video("Http://cdn.example.com/x.mp4"), "c").is_ok());
        assert!(validate_content_item(&video("javascript://cdn.example.com"), "c").is_err());

        let image = ContentItem {
            kind: ContentType::Image,
            url: Some("/assets/a.png".into()),
            text: None,
            title: None,
        };
        assert!(validate_content_item(&image, "c").is_ok());

        let text = ContentItem {
            kind: ContentType::Text,
            url: None,
            text: Some("t".repeat(501)),
            title: None,
        };
        let err = validate_content_item(&text, "syllabus[0].contents[0]").unwrap_err();
        assert!(err.to_string().contains("syllabus[0].contents[0].text"));
    }

    #[test]
    fn countries_required() {
        let mut c = sample_course();
        c.countries.clear();
        assert!(validate_course(&c, &directory()).is_err());
        let mut c = sample_course();
        c.countries = vec!["Iran".into(), " ".into()];
        assert!(validate_course(&c, &directory()).is_err());
    }

    #[test]
    fn price_must_be_positive_number() {
        let mut c = sample_course();
        c.price = "0".into();
        c.discount_price = None;
        c.discount_percentage = None;
        assert!(validate_course(&c, &directory()).is_err());
        c.price = "free".into();
        assert!(validate_course(&c, &directory()).is_err());
        c.price = "۶,۰۰۰,۰۰۰".into();
        assert!(validate_course(&c, &directory()).is_ok());
    }

    #[test]
    fn discount_and_dates_consistency() {
        let mut c = sample_course();
        c.discount_percentage = Some(20.0);
        assert!(matches!(
            validate_course(&c, &directory()),
            Err(CoreError::Inconsistent(_))
        ));

        let mut c = sample_course();
        c.start_date_gregorian = "2025-06-23".into();
        assert!(matches!(
            validate_course(&c, &directory()),
            Err(CoreError::Inconsistent(_))
        ));

        let mut c = sample_course();
        c.start_date_jalali = "1404/12/30".into();
        assert!(matches!(
            validate_course(&c, &directory()),
            Err(CoreError::InvalidField { .. })
        ));
    }
}
