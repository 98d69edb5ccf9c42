//! Resource naming helpers: English plurals and identifier case conversion

/// Utility for deriving resource names and converting between the
/// snake_case field names used in Rust and the camelCase/kebab-case names
/// used on the wire.
pub struct Pluralizer;

/// Nouns whose plural is the same word
const UNCOUNTABLE: &[&str] = &["staff", "equipment", "information", "feedback"];

impl Pluralizer {
    /// Convert a singular noun to its plural form
    ///
    /// Only the last word of a snake_case identifier is pluralized.
    ///
    /// # Examples
    ///
    /// ```
    /// use campus::core::pluralize::Pluralizer;
    ///
    /// assert_eq!(Pluralizer::pluralize("student"), "students");
    /// assert_eq!(Pluralizer::pluralize("class"), "classes");
    /// assert_eq!(Pluralizer::pluralize("academic_year"), "academic_years");
    /// assert_eq!(Pluralizer::pluralize("staff"), "staff");
    /// ```
    pub fn pluralize(singular: &str) -> String {
        if singular.is_empty() {
            return singular.to_string();
        }

        let (prefix, last) = match singular.rfind('_') {
            Some(idx) => singular.split_at(idx + 1),
            None => ("", singular),
        };

        if UNCOUNTABLE.contains(&last) {
            return singular.to_string();
        }

        let plural = match last {
            // Consonant + y -> ies
            s if s.ends_with('y')
                && s.len() > 1
                && !matches!(s.as_bytes()[s.len() - 2], b'a' | b'e' | b'i' | b'o' | b'u') =>
            {
                format!("{}ies", &s[..s.len() - 1])
            }

            // Sibilants -> es
            s if s.ends_with('s')
                || s.ends_with("sh")
                || s.ends_with("ch")
                || s.ends_with('x')
                || s.ends_with('z') =>
            {
                format!("{}es", s)
            }

            s => format!("{}s", s),
        };

        format!("{}{}", prefix, plural)
    }

    /// `classId` -> `class_id`
    pub fn camel_to_snake(name: &str) -> String {
        let mut out = String::with_capacity(name.len() + 4);
        for (i, ch) in name.chars().enumerate() {
            if ch.is_ascii_uppercase() {
                if i > 0 {
                    out.push('_');
                }
                out.push(ch.to_ascii_lowercase());
            } else {
                out.push(ch);
            }
        }
        out
    }

    /// `class_id` -> `classId`
    pub fn snake_to_camel(name: &str) -> String {
        let mut out = String::with_capacity(name.len());
        let mut upper = false;
        for ch in name.chars() {
            if ch == '_' {
                upper = true;
            } else if upper {
                out.push(ch.to_ascii_uppercase());
                upper = false;
            } else {
                out.push(ch);
            }
        }
        out
    }

    /// `academic_years` -> `academic-years`
    pub fn snake_to_kebab(name: &str) -> String {
        name.replace('_', "-")
    }
}
