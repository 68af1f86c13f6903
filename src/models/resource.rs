//! Resource definitions matching the site's content types.
//!
//! Every editable content type is a variant here; the router resolves the
//! URL segment through [`Resource::from_name`], so there is no way to reach
//! storage with an undeclared resource or field.

use serde_json::Value;

/// Storage shape of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Ordered list of items, each with a server-assigned `id`
    Collection,
    /// A single free-form document
    Singleton,
}

/// How a field's raw value is normalized before persisting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Plain string or number, stored as a trimmed string
    Text,
    /// String/number or `{tr, en}` object of trimmed strings
    Bilingual,
    /// List of strings (array or comma/newline-delimited), optionally per
    /// language
    BilingualList,
    /// Array of `{label, value}` bilingual pairs
    Stats,
    /// Lower-cased, hyphen-collapsed URL fragment
    Slug,
    /// Array joined with ", " or a bilingual scalar
    Keywords,
    /// Map of page name to a flat per-page SEO object
    SeoPages,
}

/// A single allowlisted field.
#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub kind: FieldKind,
}

const fn field(name: &'static str, kind: FieldKind) -> Field {
    Field { name, kind }
}

/// Field allowlist and required-field names for one resource.
#[derive(Debug, Clone, Copy)]
pub struct Schema {
    pub fields: &'static [Field],
    pub required: &'static [&'static str],
}

const PROJECT_FIELDS: &[Field] = &[
    field("title", FieldKind::Bilingual),
    field("summary", FieldKind::Bilingual),
    field("stack", FieldKind::BilingualList),
    field("status", FieldKind::Bilingual),
    field("year", FieldKind::Text),
];

const SOFTWARE_FIELDS: &[Field] = &[
    field("name", FieldKind::Bilingual),
    field("type", FieldKind::Bilingual),
    field("status", FieldKind::Bilingual),
    field("description", FieldKind::Bilingual),
    field("downloadUrl", FieldKind::Text),
];

const NEWS_FIELDS: &[Field] = &[
    field("title", FieldKind::Bilingual),
    field("date", FieldKind::Text),
    field("slug", FieldKind::Slug),
    field("summary", FieldKind::Bilingual),
    field("content", FieldKind::Bilingual),
    field("metaTitle", FieldKind::Bilingual),
    field("metaDescription", FieldKind::Bilingual),
    field("ogImage", FieldKind::Text),
    field("ogVideo", FieldKind::Text),
    field("ogVideoType", FieldKind::Text),
    field("canonical", FieldKind::Text),
];

const ABOUT_FIELDS: &[Field] = &[
    field("title", FieldKind::Bilingual),
    field("summary", FieldKind::Bilingual),
    field("highlights", FieldKind::BilingualList),
    field("stats", FieldKind::Stats),
];

const MESSAGE_FIELDS: &[Field] = &[
    field("name", FieldKind::Bilingual),
    field("email", FieldKind::Text),
    field("message", FieldKind::Text),
    field("phone", FieldKind::Text),
];

const SEO_FIELDS: &[Field] = &[
    field("title", FieldKind::Bilingual),
    field("description", FieldKind::Bilingual),
    field("keywords", FieldKind::Keywords),
    field("ogImage", FieldKind::Text),
    field("ogVideo", FieldKind::Text),
    field("ogVideoType", FieldKind::Text),
    field("canonical", FieldKind::Text),
    field("canonicalBase", FieldKind::Text),
    field("robots", FieldKind::Text),
    field("themeColor", FieldKind::Text),
    field("siteName", FieldKind::Text),
    field("twitterCard", FieldKind::Text),
    field("twitterImage", FieldKind::Text),
    field("twitterPlayer", FieldKind::Text),
    field("ogType", FieldKind::Text),
    field("pages", FieldKind::SeoPages),
];

/// Plain-field allowlist for a single page entry under `seo.pages`.
pub const SEO_PAGE_FIELDS: &[&str] = &[
    "title",
    "description",
    "keywords",
    "ogImage",
    "ogVideo",
    "ogVideoType",
    "canonical",
    "canonicalBase",
    "robots",
    "themeColor",
    "siteName",
    "twitterCard",
    "twitterImage",
    "twitterPlayer",
    "ogType",
];

/// A named content type served under `/api/<name>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Projects,
    Software,
    News,
    Messages,
    About,
    Seo,
    Pages,
}

impl Resource {
    pub const ALL: [Resource; 7] = [
        Resource::Projects,
        Resource::Software,
        Resource::News,
        Resource::Messages,
        Resource::About,
        Resource::Seo,
        Resource::Pages,
    ];

    /// Resolve a URL path segment to a resource.
    pub fn from_name(name: &str) -> Option<Resource> {
        match name {
            "projects" => Some(Resource::Projects),
            "software" => Some(Resource::Software),
            "news" => Some(Resource::News),
            "messages" => Some(Resource::Messages),
            "about" => Some(Resource::About),
            "seo" => Some(Resource::Seo),
            "pages" => Some(Resource::Pages),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Resource::Projects => "projects",
            Resource::Software => "software",
            Resource::News => "news",
            Resource::Messages => "messages",
            Resource::About => "about",
            Resource::Seo => "seo",
            Resource::Pages => "pages",
        }
    }

    /// Name of the backing JSON file under the data directory.
    pub fn file_name(&self) -> &'static str {
        match self {
            Resource::Projects => "projects.json",
            Resource::Software => "software.json",
            Resource::News => "news.json",
            Resource::Messages => "messages.json",
            Resource::About => "about.json",
            Resource::Seo => "seo.json",
            Resource::Pages => "pages.json",
        }
    }

    pub fn mode(&self) -> Mode {
        match self {
            Resource::Projects | Resource::Software | Resource::News | Resource::Messages => {
                Mode::Collection
            }
            Resource::About | Resource::Seo | Resource::Pages => Mode::Singleton,
        }
    }

    /// Field allowlist for this resource. The `pages` resource has none: its
    /// whole payload is sanitized as a recursive page tree instead.
    pub fn schema(&self) -> Schema {
        match self {
            Resource::Projects => Schema {
                fields: PROJECT_FIELDS,
                required: &["title"],
            },
            Resource::Software => Schema {
                fields: SOFTWARE_FIELDS,
                required: &["name"],
            },
            Resource::News => Schema {
                fields: NEWS_FIELDS,
                required: &["title"],
            },
            Resource::Messages => Schema {
                fields: MESSAGE_FIELDS,
                required: &["name", "email", "message"],
            },
            Resource::About => Schema {
                fields: ABOUT_FIELDS,
                required: &["title"],
            },
            Resource::Seo => Schema {
                fields: SEO_FIELDS,
                required: &[],
            },
            Resource::Pages => Schema {
                fields: &[],
                required: &[],
            },
        }
    }

    /// The empty value a missing or unreadable file degrades to.
    pub fn empty_value(&self) -> Value {
        match self.mode() {
            Mode::Collection => Value::Array(Vec::new()),
            Mode::Singleton => Value::Object(serde_json::Map::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name_round_trip() {
        for resource in Resource::ALL {
            assert_eq!(Resource::from_name(resource.name()), Some(resource));
        }
        assert_eq!(Resource::from_name("unknown"), None);
    }

    #[test]
    fn test_modes() {
        assert_eq!(Resource::Projects.mode(), Mode::Collection);
        assert_eq!(Resource::Messages.mode(), Mode::Collection);
        assert_eq!(Resource::Seo.mode(), Mode::Singleton);
        assert_eq!(Resource::Pages.mode(), Mode::Singleton);
    }

    #[test]
    fn test_messages_required_fields() {
        assert_eq!(
            Resource::Messages.schema().required,
            &["name", "email", "message"]
        );
    }

    #[test]
    fn test_empty_values() {
        assert_eq!(Resource::News.empty_value(), serde_json::json!([]));
        assert_eq!(Resource::About.empty_value(), serde_json::json!({}));
    }
}
