use super::IntegrationHarness;
use anyhow::Result;
use filer::{FileCategory, StoreError};
use std::fs;

#[test]
fn move_copies_then_removes_source() -> Result<()> {
    let harness = IntegrationHarness::new();
    let source = harness.outside_file("song.m4a", b"la la la");

    let moved = harness.move_file(&source, FileCategory::Audio)?;
    assert!(!source.exists());
    assert_eq!(fs::read(&moved)?, b"la la la");
    assert_eq!(
        moved,
        harness.store.directory_for(FileCategory::Audio).join("song.m4a")
    );
    Ok(())
}

#[test]
fn move_disambiguates_taken_names() -> Result<()> {
    let harness = IntegrationHarness::new();
    let existing = harness.save_named(FileCategory::FullImage, "cat.jpg", b"old cat", false)?;
    let source = harness.outside_file("cat.jpg", b"new cat");

    let moved = harness.move_file(&source, FileCategory::FullImage)?;
    assert_eq!(moved, existing.with_file_name("cat1.jpg"));
    assert_eq!(fs::read(&existing)?, b"old cat");
    assert_eq!(fs::read(&moved)?, b"new cat");
    Ok(())
}

#[test]
fn failed_destination_keeps_source() -> Result<()> {
    let harness = IntegrationHarness::new();
    let source = harness.outside_file("frame.jpg", b"pixels");

    // A plain file where the category directory belongs makes the
    // destination unusable.
    let blocked = harness.store.directory_for(FileCategory::FullImage);
    fs::create_dir_all(blocked.parent().expect("category dir has a parent"))?;
    fs::write(&blocked, b"in the way")?;

    let err = harness
        .move_file(&source, FileCategory::FullImage)
        .unwrap_err();
    assert!(matches!(err, StoreError::DirectoryCreateFailed { .. }));
    assert_eq!(fs::read(&source)?, b"pixels");
    Ok(())
}

#[test]
fn moving_a_missing_file_reports_not_found() {
    let harness = IntegrationHarness::new();
    let missing = harness.workspace_path().join("incoming/ghost.mp4");
    let err = harness
        .move_file(&missing, FileCategory::Video)
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
    harness.wait_idle();
}

#[test]
fn move_between_categories() -> Result<()> {
    let harness = IntegrationHarness::new();
    let draft = harness.save_named(FileCategory::Temp, "upload.jpg", b"draft", false)?;
    let kept = harness.move_file(&draft, FileCategory::FullImage)?;
    assert!(!draft.exists());
    assert!(kept.starts_with(harness.store.directory_for(FileCategory::FullImage)));
    assert!(harness.list(FileCategory::Temp)?.is_empty());
    Ok(())
}
