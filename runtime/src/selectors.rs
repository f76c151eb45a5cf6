//! Page structure of the LMS: element ids, classes and the conditions built
//! from them.

use crate::navigation::Condition;
use crate::renderer::Locator;

pub const CURRENT_COURSES_TABLE: &str = "my_courses_table";
pub const PAST_COURSES_TABLE: &str = "past_enrollments_table";

pub const MODULES_CONTAINER: &str = "context_modules";
pub const MODULE_ITEM: &str = "context_module_item";
pub const MODULE_ITEM_BLANK: &str = "context_module_item_blank";

pub const WIKI_PAGE: &str = "wiki_page_show";
pub const ASSIGNMENT_PAGE: &str = "assignment_show";
pub const GENERIC_CONTENT: &str = "content";
pub const TOOL_FRAME: &str = "tool_content";
pub const FILE_DOWNLOAD_BUTTON: &str = "file_download_btn";
pub const DOWNLOAD_LINK_TEXT: &str = "Download";
pub const OPEN_URL_BUTTON: &str = "open_url_button";
pub const EXTERNAL_ANCHOR: &str = "a.external";

pub const ANNOUNCEMENTS_WRAPPER: &str = "announcements-v2__wrapper";
pub const ANNOUNCEMENT_ROW: &str = "ic-announcement-row";
pub const DISCUSSION_TOPIC: &str = "discussion_topic";

pub const SYLLABUS: &str = "course_syllabus";

pub const DIRECTORY_HEADER: &str = "ef-directory-header";
pub const DIRECTORY_ENTRY_LINK: &str = "ef-name-col__link";

pub const ASSIGNMENT_GROUPS: [&str; 4] = [
    "assignment_group_upcoming",
    "assignment_group_past",
    "assignment_group_undated",
    "assignment_group_overdue_assignments",
];
pub const ASSIGNMENT_ENTRY: &str = "assignment";

pub const PAGE_NOT_AVAILABLE: &str = "#flash_message_holder > *";

/// Ready marker of the secondary learning system's pages.
pub const SECONDARY_READY: &str = "learning-header";

/// The LMS flashed an error instead of rendering the page.
pub fn page_not_available() -> Condition {
    Condition::visible(Locator::css(PAGE_NOT_AVAILABLE))
}

pub fn enrollments_ready() -> Condition {
    Condition::visible(Locator::id(CURRENT_COURSES_TABLE))
}

pub fn modules_ready() -> Condition {
    Condition::visible(Locator::id(MODULES_CONTAINER))
}

pub fn announcements_ready() -> Condition {
    Condition::visible(Locator::class(ANNOUNCEMENTS_WRAPPER))
}

pub fn announcement_ready() -> Condition {
    Condition::visible(Locator::id(DISCUSSION_TOPIC))
}

pub fn syllabus_ready() -> Condition {
    Condition::visible(Locator::id(SYLLABUS))
}

pub fn directory_ready() -> Condition {
    Condition::visible(Locator::class(DIRECTORY_HEADER))
}

pub fn assignments_ready() -> Condition {
    Condition::any_of(
        ASSIGNMENT_GROUPS
            .iter()
            .map(|id| Condition::visible(Locator::id(id)))
            .collect(),
    )
}

pub fn wiki_ready() -> Condition {
    Condition::visible(Locator::id(WIKI_PAGE))
}

pub fn assignment_ready() -> Condition {
    Condition::visible(Locator::id(ASSIGNMENT_PAGE))
}

pub fn content_ready() -> Condition {
    Condition::visible(Locator::id(GENERIC_CONTENT))
}

pub fn tool_frame() -> Locator {
    Locator::id(TOOL_FRAME)
}

pub fn tool_frame_ready() -> Condition {
    Condition::frame(tool_frame())
}

pub fn download_link_ready() -> Condition {
    Condition::visible(Locator::link_text(DOWNLOAD_LINK_TEXT))
}

/// Branch 0: "open externally" button (a second window opens).
/// Branch 1: the external link rendered in place.
pub fn external_link_ready() -> Condition {
    Condition::any_of(vec![
        Condition::visible(Locator::id(OPEN_URL_BUTTON)),
        Condition::visible(Locator::css(EXTERNAL_ANCHOR)),
    ])
}

pub fn secondary_ready() -> Condition {
    Condition::visible(Locator::class(SECONDARY_READY))
}
