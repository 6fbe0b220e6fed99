//! Date parsing for the formats the catalogue prints.
use chrono::{NaiveDate, NaiveDateTime};

/// Revision labels, e.g. `12 Mar, 2023 at 10:15`.
pub const REVISION_TEMPLATES: [&str; 2] = ["%d %b, %Y at %H:%M", "%d %b at %H:%M"];

/// `datetime` attributes of `<time>` elements: catalogue pages use the first
/// form, detail pages the second.
pub const PUBLISHED_TEMPLATES: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%B %d, %Y"];

/// Parse `text` with the first template that matches and return it with the
/// matched template.
///
/// Date-only templates yield midnight. Templates without a year (`%Y`) take
/// `year`, since chrono cannot build a date without one.
///
/// ```
/// use smods_catalogue::dates::{parse_time, REVISION_TEMPLATES};
///
/// let (date, template) = parse_time("5 Jan at 08:30", &REVISION_TEMPLATES, 2021).unwrap();
/// assert_eq!(date.to_string(), "2021-01-05 08:30:00");
/// assert_eq!(template, "%d %b at %H:%M");
/// ```
pub fn parse_time<'t>(
    text: &str,
    templates: &[&'t str],
    year: i32,
) -> Option<(NaiveDateTime, &'t str)> {
    let text = text.trim();
    templates.iter().find_map(|template| {
        let parsed = if template.contains("%Y") {
            parse_one(text, template)
        } else {
            parse_one(&format!("{text} {year}"), &format!("{template} %Y"))
        };
        parsed.map(|date| (date, *template))
    })
}

fn parse_one(text: &str, template: &str) -> Option<NaiveDateTime> {
    if template.contains("%H") {
        NaiveDateTime::parse_from_str(text, template).ok()
    } else {
        NaiveDate::parse_from_str(text, template)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
    }
}

/// Remove the timezone suffix the site appends to revision labels.
pub fn clean_revision_label(label: &str) -> String {
    label.replace("UTC", "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_revision_label_keeps_its_year() {
        let (d, t) = parse_time("12 Mar, 2019 at 10:15", &REVISION_TEMPLATES, 2030).unwrap();
        assert_eq!(d.to_string(), "2019-03-12 10:15:00");
        assert_eq!(t, REVISION_TEMPLATES[0]);
    }

    #[test]
    fn published_dates_in_both_forms() {
        let (d, _) = parse_time("2022-11-03 17:45:09", &PUBLISHED_TEMPLATES, 2030).unwrap();
        assert_eq!(d.to_string(), "2022-11-03 17:45:09");
        let (d, t) = parse_time("November 3, 2022", &PUBLISHED_TEMPLATES, 2030).unwrap();
        assert_eq!(d.to_string(), "2022-11-03 00:00:00");
        assert_eq!(t, "%B %d, %Y");
    }

    #[test]
    fn unknown_formats_are_rejected() {
        assert!(parse_time("yesterday", &REVISION_TEMPLATES, 2024).is_none());
        assert!(parse_time("", &PUBLISHED_TEMPLATES, 2024).is_none());
    }

    #[test]
    fn label_cleanup_strips_utc() {
        assert_eq!(clean_revision_label(" 1 Feb at 00:01 UTC "), "1 Feb at 00:01");
    }
}
