use super::IntegrationHarness;
use anyhow::Result;
use filer::directory::DirState;
use filer::{FileCategory, StoreError};
use std::fs;

#[test]
fn resolving_twice_creates_once() -> Result<()> {
    let harness = IntegrationHarness::new();
    for category in FileCategory::ALL {
        let (first, state) = harness.store.ensure_directory(category)?;
        assert_eq!(state, DirState::Created);
        let (second, state) = harness.store.ensure_directory(category)?;
        assert_eq!(state, DirState::Existing);
        assert_eq!(first, second);
        assert_eq!(harness.resolve_path(category)?, first);
    }
    Ok(())
}

#[test]
fn backup_marker_follows_policy() -> Result<()> {
    let harness = IntegrationHarness::new();
    let images = harness.resolve_path(FileCategory::FullImage)?;
    let database = harness.resolve_path(FileCategory::Database)?;
    assert!(images.join(filer::backup::CACHEDIR_TAG).is_file());
    assert!(!database.join(filer::backup::CACHEDIR_TAG).exists());
    Ok(())
}

#[test]
fn named_allocation_skips_existing_files() -> Result<()> {
    let harness = IntegrationHarness::new();
    let first = harness.allocate(&FileCategory::Audio, Some("take.m4a"))?;
    assert!(!first.exists());
    fs::write(&first, b"1")?;

    let second = harness.allocate(&FileCategory::Audio, Some("take.m4a"))?;
    assert_eq!(second, first.with_file_name("take1.m4a"));
    assert!(!second.exists());
    fs::write(&second, b"2")?;

    let third = harness.allocate(&FileCategory::Audio, Some("take.m4a"))?;
    assert_eq!(third, first.with_file_name("take2.m4a"));
    Ok(())
}

#[test]
fn opaque_allocation_uses_category_extension() -> Result<()> {
    let harness = IntegrationHarness::new();
    let path = harness.allocate(&FileCategory::Video, None)?;
    assert!(!path.exists());
    assert_eq!(path.extension().and_then(|e| e.to_str()), Some("mp4"));
    assert_eq!(
        path.parent(),
        Some(harness.store.directory_for(FileCategory::Video).as_path())
    );
    Ok(())
}

#[test]
fn malformed_names_fail_fast() {
    let harness = IntegrationHarness::new();
    for bad in ["ab", "noextension", "...", "?!.png"] {
        let err = harness
            .store
            .allocate_unique_path(&FileCategory::Temp, Some(bad), |_| {})
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument(_)), "{bad}");
    }
}
