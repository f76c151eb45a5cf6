//! Courses, categories and modules.

pub mod runner;

use crate::extraction::classify::ContentType;
use crate::renderer::{first_link_within, BrowserSession, Locator};
use crate::selectors;
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// One of the five harvested sections of a course.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Modules,
    Announcements,
    Syllabus,
    Files,
    Assignments,
}

impl Category {
    /// Harvest order.
    pub const ALL: [Category; 5] = [
        Category::Modules,
        Category::Announcements,
        Category::Syllabus,
        Category::Files,
        Category::Assignments,
    ];

    /// Path appended to the course location to reach the category page.
    pub fn path_suffix(self) -> &'static str {
        match self {
            Self::Modules => "/modules",
            Self::Announcements => "/announcements",
            Self::Syllabus => "/assignments/syllabus",
            Self::Files => "/files",
            Self::Assignments => "/assignments",
        }
    }

    /// Directory name under the course root.
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Modules => "modules",
            Self::Announcements => "announcements",
            Self::Syllabus => "syllabus",
            Self::Files => "other_files",
            Self::Assignments => "assignments",
        }
    }

    /// Whether the barrier and flush run even when the page was not
    /// available, so the category directory always exists.
    pub fn always_flushed(self) -> bool {
        matches!(self, Self::Files | Self::Assignments)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Modules => "modules",
            Self::Announcements => "announcements",
            Self::Syllabus => "syllabus",
            Self::Files => "files",
            Self::Assignments => "assignments",
        })
    }
}

/// An enrolled course. Immutable once listed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Course {
    location: String,
    name: String,
    categories: Vec<Category>,
}

impl Course {
    /// Build from an enrollment link; the display text becomes a directory
    /// name.
    pub fn from_enrollment(location: &str, display_name: &str) -> Self {
        Self {
            location: location.trim_end_matches('/').to_string(),
            name: normalize_course_name(display_name),
            categories: Category::ALL.to_vec(),
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn category_location(&self, category: Category) -> String {
        format!("{}{}", self.location, category.path_suffix())
    }

    /// Prefix shared by every sub-folder link in the file browser.
    pub fn folder_prefix(&self) -> String {
        format!("{}/files/folder/", self.location)
    }
}

/// Spaces and periods become `_`; path separators too.
pub fn normalize_course_name(display_name: &str) -> String {
    display_name
        .trim()
        .chars()
        .map(|c| match c {
            ' ' | '.' | '/' | '\\' => '_',
            c => c,
        })
        .collect()
}

/// A linked unit of course content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Module {
    pub location: String,
    pub content_type: ContentType,
}

/// Read current and past enrollments from the course listing page.
pub async fn list_courses(session: &mut dyn BrowserSession) -> Result<Vec<Course>> {
    let mut courses = Vec::new();
    for table_id in [selectors::CURRENT_COURSES_TABLE, selectors::PAST_COURSES_TABLE] {
        let Some(table) = session
            .find_all(&Locator::id(table_id))
            .await?
            .into_iter()
            .next()
        else {
            tracing::debug!("enrollment table #{table_id} not present");
            continue;
        };
        for link in session.find_within(table, &Locator::tag("a")).await? {
            let Some(location) = session.attribute(link, "href").await? else {
                continue;
            };
            let text = session
                .attribute(link, "innerText")
                .await?
                .unwrap_or_default();
            courses.push(Course::from_enrollment(&location, &text));
        }
    }
    Ok(courses)
}

/// Read the module list of a loaded modules page.
pub async fn list_modules(session: &mut dyn BrowserSession) -> Result<Vec<Module>> {
    let mut modules = Vec::new();
    for item in session
        .find_all(&Locator::class(selectors::MODULE_ITEM))
        .await?
    {
        if session.attribute(item, "id").await?.as_deref() == Some(selectors::MODULE_ITEM_BLANK) {
            continue;
        }
        let Some(location) = first_link_within(session, item).await? else {
            continue;
        };
        let class_attr = session.attribute(item, "class").await?.unwrap_or_default();
        let markers = crate::extraction::classify::markers_from_class(&class_attr);
        modules.push(Module {
            location,
            content_type: crate::extraction::classify::classify(&markers),
        });
    }
    Ok(modules)
}
