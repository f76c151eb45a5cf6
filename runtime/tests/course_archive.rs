mod common;

use common::{test_config, FakeElement, FakePage, FakeSession, LMS, PRIMARY_WINDOW};
use coursevault_runtime::auth::InteractiveAuthenticator;
use coursevault_runtime::course::runner::ArchiveRunner;
use coursevault_runtime::course::Category;
use coursevault_runtime::error::ArchiveError;
use coursevault_runtime::progress::{self, ProgressEventKind};
use coursevault_runtime::selectors;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

const PHYSICS: &str = "https://lms.test/courses/1";
const CHEM: &str = "https://lms.test/courses/2";

fn at(course: &str, path: &str) -> String {
    format!("{course}{path}")
}

fn module_item(kind: &str, href: &str) -> FakeElement {
    FakeElement::new("li")
        .class(&format!("{} {kind}", selectors::MODULE_ITEM))
        .child(FakeElement::link(href))
}

fn enrollments(session: &mut FakeSession, current: &[(&str, &str)], past: &[(&str, &str)]) {
    let table = |id: &str, rows: &[(&str, &str)]| {
        rows.iter().fold(FakeElement::new("table").id(id), |t, (href, name)| {
            t.child(FakeElement::link(href).text(name))
        })
    };
    session.page(
        &format!("{LMS}/courses"),
        FakePage::new("Courses")
            .with(table(selectors::CURRENT_COURSES_TABLE, current))
            .with(table(selectors::PAST_COURSES_TABLE, past)),
    );
}

/// Every category available; the attachment module and the file browser
/// both link file `f1`, the syllabus and an assignment both embed `f2`.
fn physics(session: &mut FakeSession) {
    let f1 = at(PHYSICS, "/files/f1/download?download_frd=1");
    let f2 = at(PHYSICS, "/files/f2/download");
    let f3 = at(PHYSICS, "/files/f3/download?download_frd=1");

    session
        .page(
            &at(PHYSICS, "/modules"),
            FakePage::new("Modules")
                .with(FakeElement::div_id(selectors::MODULES_CONTAINER))
                .with(module_item("attachment", &at(PHYSICS, "/modules/items/10")))
                .with(module_item("external_url", &at(PHYSICS, "/modules/items/11")))
                .with(
                    FakeElement::new("li")
                        .id(selectors::MODULE_ITEM_BLANK)
                        .class(selectors::MODULE_ITEM),
                ),
        )
        .page(
            &at(PHYSICS, "/modules/items/10"),
            FakePage::new("Lecture notes")
                .with(FakeElement::link(&f1).text(selectors::DOWNLOAD_LINK_TEXT)),
        )
        .page(
            &at(PHYSICS, "/modules/items/11"),
            FakePage::new("External")
                .with(
                    FakeElement::new("button")
                        .id(selectors::OPEN_URL_BUTTON)
                        .href("https://ext.test/paper"),
                )
                .opening_window(),
        )
        .page("https://ext.test/paper", FakePage::new("Paper"))
        .page(
            &at(PHYSICS, "/announcements"),
            FakePage::new("Announcements")
                .with(FakeElement::div_class(selectors::ANNOUNCEMENTS_WRAPPER))
                .with(
                    FakeElement::div_class(selectors::ANNOUNCEMENT_ROW)
                        .child(FakeElement::link(&at(PHYSICS, "/discussion_topics/5"))),
                ),
        )
        .page(
            &at(PHYSICS, "/discussion_topics/5"),
            FakePage::new("Welcome").with(FakeElement::div_id(selectors::DISCUSSION_TOPIC)),
        )
        .page(
            &at(PHYSICS, "/assignments/syllabus"),
            FakePage::new("Syllabus")
                .with(FakeElement::div_id(selectors::SYLLABUS))
                .with(FakeElement::link(&f2).class(selectors::FILE_DOWNLOAD_BUTTON)),
        )
        .page(
            &at(PHYSICS, "/files"),
            FakePage::new("Files")
                .with(FakeElement::div_class(selectors::DIRECTORY_HEADER))
                .with(FakeElement::link(&f1).class(selectors::DIRECTORY_ENTRY_LINK))
                .with(
                    FakeElement::link(&at(PHYSICS, "/files/folder/week1"))
                        .class(selectors::DIRECTORY_ENTRY_LINK),
                ),
        )
        .page(
            &at(PHYSICS, "/files/folder/week1"),
            FakePage::new("Files")
                .with(FakeElement::div_class(selectors::DIRECTORY_HEADER))
                .with(FakeElement::link(&f3).class(selectors::DIRECTORY_ENTRY_LINK)),
        )
        .page(
            &at(PHYSICS, "/assignments"),
            FakePage::new("Assignments")
                .with(FakeElement::div_id("assignment_group_past"))
                .with(
                    FakeElement::div_class(selectors::ASSIGNMENT_ENTRY)
                        .child(FakeElement::link(&at(PHYSICS, "/assignments/7"))),
                ),
        )
        .page(
            &at(PHYSICS, "/assignments/7"),
            FakePage::new("Homework 1")
                .with(FakeElement::div_id(selectors::GENERIC_CONTENT))
                .with(FakeElement::link(&f2).class(selectors::FILE_DOWNLOAD_BUTTON)),
        )
        .download(&f1, "f1.bin")
        .download(&f2, "f2.bin")
        .download(&f3, "f3.bin");
}

/// Only the syllabus is available; it embeds a file also called `f1`.
fn chem(session: &mut FakeSession) {
    let f1 = at(CHEM, "/files/f1/download");
    for category in Category::ALL {
        session.page(&at(CHEM, category.path_suffix()), FakePage::not_available());
    }
    session
        .page(
            &at(CHEM, "/assignments/syllabus"),
            FakePage::new("Chem Syllabus")
                .with(FakeElement::div_id(selectors::SYLLABUS))
                .with(FakeElement::link(&f1).class(selectors::FILE_DOWNLOAD_BUTTON)),
        )
        .download(&f1, "chem_f1.bin");
}

fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn runner(root: &Path) -> ArchiveRunner {
    let authenticator = Arc::new(InteractiveAuthenticator::new(None, false));
    ArchiveRunner::new(&test_config(root), authenticator).unwrap()
}

#[tokio::test]
async fn test_archives_every_category_without_duplicates() {
    let dir = TempDir::new().unwrap();
    let mut session = FakeSession::new(dir.path());
    enrollments(&mut session, &[(PHYSICS, "Physics I")], &[(CHEM, "Chem 5.111")]);
    physics(&mut session);
    chem(&mut session);

    let (tx, mut rx) = progress::channel();
    let mut runner = runner(dir.path()).with_progress(tx);
    let summary = runner.run(&mut session).await.unwrap();

    let physics_dir = dir.path().join("Physics_I");
    assert_eq!(files_in(&physics_dir.join("modules")), ["Paper.pdf", "f1.bin"]);
    assert_eq!(files_in(&physics_dir.join("announcements")), ["Welcome.pdf"]);
    assert_eq!(files_in(&physics_dir.join("syllabus")), ["Syllabus.pdf", "f2.bin"]);
    assert_eq!(files_in(&physics_dir.join("other_files")), ["f3.bin"]);
    assert_eq!(files_in(&physics_dir.join("assignments")), ["Homework 1.pdf"]);

    // A fresh identifier set per course: Chem's f1 is not Physics' f1.
    // Files and assignments get their directories even though both pages are
    // missing.
    let chem_dir = dir.path().join("Chem_5_111");
    assert_eq!(files_in(&chem_dir), ["assignments", "other_files", "syllabus"]);
    assert!(files_in(&chem_dir.join("other_files")).is_empty());
    assert!(files_in(&chem_dir.join("assignments")).is_empty());
    assert_eq!(
        files_in(&chem_dir.join("syllabus")),
        ["Chem Syllabus.pdf", "chem_f1.bin"]
    );

    for id in ["f1", "f2", "f3"] {
        let triggered = session
            .downloaded
            .iter()
            .filter(|l| l.starts_with(&at(PHYSICS, &format!("/files/{id}/"))))
            .count();
        assert_eq!(triggered, 1, "{id} triggered {triggered} times");
    }
    assert_eq!(session.downloaded.len(), 4);

    // The scratch area is drained after every category.
    let leftover: Vec<String> = files_in(dir.path())
        .into_iter()
        .filter(|n| dir.path().join(n).is_file())
        .collect();
    assert!(leftover.is_empty(), "left in scratch: {leftover:?}");

    // The external link's popup was closed and focus returned.
    assert_eq!(session.windows().to_vec(), vec![PRIMARY_WINDOW.to_string()]);
    assert_eq!(session.current_window(), PRIMARY_WINDOW);

    assert_eq!(summary.courses.len(), 2);
    assert_eq!(summary.courses[0].files(), 7);
    let chem_summary = &summary.courses[1];
    let available: Vec<Category> = chem_summary
        .categories
        .iter()
        .filter(|c| c.available)
        .map(|c| c.category)
        .collect();
    assert_eq!(available, [Category::Syllabus]);
    assert!(chem_summary.categories.iter().all(|c| c.available || c.files == 0));

    let mut skipped = 0;
    while let Ok(event) = rx.try_recv() {
        if let ProgressEventKind::CategorySkipped { course, .. } = event.event {
            assert_eq!(course, "Chem_5_111");
            skipped += 1;
        }
    }
    assert_eq!(skipped, 4);
}

#[tokio::test]
async fn test_unrecognized_module_aborts_run() {
    let dir = TempDir::new().unwrap();
    let mut session = FakeSession::new(dir.path());
    enrollments(&mut session, &[(PHYSICS, "Physics I")], &[]);
    session
        .page(
            &at(PHYSICS, "/modules"),
            FakePage::new("Modules")
                .with(FakeElement::div_id(selectors::MODULES_CONTAINER))
                .with(module_item("discussion_topic", &at(PHYSICS, "/modules/items/20")))
                .with(module_item("attachment", &at(PHYSICS, "/modules/items/10"))),
        )
        .page(
            &at(PHYSICS, "/modules/items/10"),
            FakePage::new("Lecture notes").with(
                FakeElement::link(&at(PHYSICS, "/files/f1/download"))
                    .text(selectors::DOWNLOAD_LINK_TEXT),
            ),
        )
        .download(&at(PHYSICS, "/files/f1/download"), "f1.bin");

    let err = runner(dir.path()).run(&mut session).await.unwrap_err();
    match err.downcast_ref::<ArchiveError>() {
        Some(ArchiveError::UnrecognizedModule { location, markers }) => {
            assert_eq!(location, &at(PHYSICS, "/modules/items/20"));
            assert!(markers.iter().any(|m| m == "discussion_topic"));
        }
        other => panic!("expected UnrecognizedModule, got {other:?}"),
    }
    assert_eq!(session.visit_count(&at(PHYSICS, "/modules/items/10")), 0);
    assert!(session.downloaded.is_empty());
}

#[tokio::test]
async fn test_announcements_leave_identifier_set_alone() {
    let dir = TempDir::new().unwrap();
    let mut session = FakeSession::new(dir.path());
    enrollments(&mut session, &[(PHYSICS, "Physics I")], &[]);
    physics(&mut session);
    // The announcement shares f2's identifier in its location; the syllabus
    // must still download f2.
    session.page(
        &at(PHYSICS, "/announcements"),
        FakePage::new("Announcements")
            .with(FakeElement::div_class(selectors::ANNOUNCEMENTS_WRAPPER))
            .with(
                FakeElement::div_class(selectors::ANNOUNCEMENT_ROW)
                    .child(FakeElement::link(&at(PHYSICS, "/discussion_topics/f2/view"))),
            ),
    );
    session.page(
        &at(PHYSICS, "/discussion_topics/f2/view"),
        FakePage::new("Office hours").with(FakeElement::div_id(selectors::DISCUSSION_TOPIC)),
    );

    runner(dir.path()).run(&mut session).await.unwrap();

    let physics_dir = dir.path().join("Physics_I");
    assert_eq!(files_in(&physics_dir.join("announcements")), ["Office hours.pdf"]);
    assert_eq!(files_in(&physics_dir.join("syllabus")), ["Syllabus.pdf", "f2.bin"]);
}

#[tokio::test]
async fn test_missing_files_and_assignments_pages_still_flush() {
    let dir = TempDir::new().unwrap();
    let mut session = FakeSession::new(dir.path());
    enrollments(&mut session, &[(CHEM, "Chem 5.111")], &[]);
    for category in Category::ALL {
        session.page(&at(CHEM, category.path_suffix()), FakePage::not_available());
    }
    // Left over from an interrupted run.
    std::fs::write(dir.path().join("stray.bin"), b"partial run").unwrap();

    let summary = runner(dir.path()).run(&mut session).await.unwrap();

    let chem_dir = dir.path().join("Chem_5_111");
    assert_eq!(files_in(&chem_dir), ["assignments", "other_files"]);
    assert_eq!(files_in(&chem_dir.join("other_files")), ["stray.bin"]);
    assert!(files_in(&chem_dir.join("assignments")).is_empty());

    let categories = &summary.courses[0].categories;
    assert!(categories.iter().all(|c| !c.available));
    let files = categories
        .iter()
        .find(|c| c.category == Category::Files)
        .unwrap();
    assert_eq!(files.files, 1);
    assert_eq!(files.downloads_triggered, 0);
}
