//! Integration tests for the Quire CLI

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::io::{Cursor, Write};
use std::path::PathBuf;
use tempfile::TempDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Write an EPUB 3 with one long chapter; an empty title triggers a parser warning
fn create_test_epub(dir: &TempDir, name: &str, title: &str) -> PathBuf {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let stored = FileOptions::default().compression_method(CompressionMethod::Stored);
    let deflated = FileOptions::default().compression_method(CompressionMethod::Deflated);

    writer.start_file("mimetype", stored).unwrap();
    writer.write_all(b"application/epub+zip").unwrap();
    writer.start_file("META-INF/container.xml", deflated).unwrap();
    writer
        .write_all(
            br#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles><rootfile full-path="content.opf" media-type="application/oebps-package+xml"/></rootfiles>
</container>"#,
        )
        .unwrap();
    writer.start_file("content.opf", deflated).unwrap();
    write!(
        writer,
        r#"<?xml version="1.0"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="uid">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:identifier id="uid">urn:uuid:cli-test</dc:identifier>
    <dc:title>{title}</dc:title>
    <dc:creator>Jane Doe</dc:creator>
    <dc:language>en</dc:language>
  </metadata>
  <manifest><item id="c1" href="chapter.xhtml" media-type="application/xhtml+xml"/></manifest>
  <spine><itemref idref="c1"/></spine>
</package>"#
    )
    .unwrap();
    writer.start_file("chapter.xhtml", deflated).unwrap();
    let body = "<p>Call me Ishmael.</p>".repeat(120);
    write!(
        writer,
        r#"<html xmlns="http://www.w3.org/1999/xhtml"><body>{body}</body></html>"#
    )
    .unwrap();

    let bytes = writer.finish().unwrap().into_inner();
    let path = dir.path().join(name);
    fs::write(&path, bytes).expect("Failed to write test file");
    path
}

fn quire() -> Command {
    let mut cmd = Command::cargo_bin("quire").unwrap();
    cmd.env_remove("QUIRE_CHARS_PER_PAGE");
    cmd
}

// ============================================================================
// Help and arguments
// ============================================================================

#[test]
fn test_help() {
    quire()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("info"))
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("batch"))
        .stdout(predicate::str::contains("Disable the built-in format parsers"))
        .stdout(predicate::str::contains("plugins").not());
}

#[test]
fn test_version() {
    quire()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("quire"));
}

#[test]
fn test_info_help() {
    quire()
        .args(["info", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Display information"))
        .stdout(predicate::str::contains("--json"))
        .stdout(predicate::str::contains("--password"));
}

#[test]
fn test_validate_help() {
    quire()
        .args(["validate", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Validate that a publication"))
        .stdout(predicate::str::contains("--strict"));
}

#[test]
fn test_batch_invalid_jobs() {
    quire()
        .args(["batch", "/some/input/dir", "--jobs", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("at least 1"));
}

// ============================================================================
// Info
// ============================================================================

#[test]
fn test_info_epub() {
    let temp_dir = TempDir::new().unwrap();
    let input = create_test_epub(&temp_dir, "whale.epub", "Moby Dick");

    quire()
        .args(["info", input.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Title:       Moby Dick"))
        .stdout(predicate::str::contains("Authors:     Jane Doe"))
        .stdout(predicate::str::contains("Type:        epub"))
        .stdout(predicate::str::contains("Style:       ltr"))
        .stdout(predicate::str::contains("chapter.xhtml"));
}

#[test]
fn test_info_json() {
    let temp_dir = TempDir::new().unwrap();
    let input = create_test_epub(&temp_dir, "whale.epub", "Moby Dick");

    let output = quire()
        .args(["info", "--json", input.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(output.status.success());

    let info: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(info["title"], "Moby Dick");
    assert_eq!(info["publication_type"], "epub");
    assert_eq!(info["pages"], 3);
    assert_eq!(info["restricted"], false);
}

#[test]
fn test_info_chars_per_page_from_env() {
    let temp_dir = TempDir::new().unwrap();
    let input = create_test_epub(&temp_dir, "whale.epub", "Moby Dick");

    let output = quire()
        .env("QUIRE_CHARS_PER_PAGE", "100000")
        .args(["info", "--json", input.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(output.status.success());

    let info: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(info["pages"], 1);
}

#[test]
fn test_info_without_default_parsers() {
    let temp_dir = TempDir::new().unwrap();
    let input = create_test_epub(&temp_dir, "whale.epub", "Moby Dick");

    quire()
        .args(["info", "--no-default-parsers", input.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported format"));
}

#[test]
fn test_info_nonexistent_file() {
    quire()
        .args(["info", "/nonexistent/file.epub"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to open"));
}

// ============================================================================
// Validate
// ============================================================================

#[test]
fn test_validate_epub() {
    let temp_dir = TempDir::new().unwrap();
    let input = create_test_epub(&temp_dir, "whale.epub", "Moby Dick");

    quire()
        .args(["validate", "--strict", input.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Valid publication"));
}

#[test]
fn test_validate_strict_fails_on_warnings() {
    let temp_dir = TempDir::new().unwrap();
    let input = create_test_epub(&temp_dir, "untitled.epub", "");

    quire()
        .args(["validate", input.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Warning: [epub]"));

    quire()
        .args(["validate", "--strict", input.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("warnings"));
}

#[test]
fn test_validate_garbage() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("garbage.bin");
    fs::write(&input, [0u8, 159, 146, 150]).unwrap();

    quire()
        .args(["validate", input.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid publication"));
}

// ============================================================================
// Batch
// ============================================================================

#[test]
fn test_batch_opens_directory() {
    let temp_dir = TempDir::new().unwrap();
    create_test_epub(&temp_dir, "one.epub", "One");
    create_test_epub(&temp_dir, "two.epub", "Two");
    fs::write(temp_dir.path().join("notes.txt"), "not a book").unwrap();

    quire()
        .args(["batch", temp_dir.path().to_str().unwrap(), "--jobs", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Found 2 files"))
        .stdout(predicate::str::contains("Success: 2"));
}

#[test]
fn test_batch_reports_failures() {
    let temp_dir = TempDir::new().unwrap();
    create_test_epub(&temp_dir, "good.epub", "Good");
    fs::write(temp_dir.path().join("broken.epub"), "definitely not a zip").unwrap();

    quire()
        .args(["batch", temp_dir.path().to_str().unwrap()])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Errors:  1"))
        .stderr(predicate::str::contains("1 errors"));
}

#[test]
fn test_batch_empty_directory() {
    let temp_dir = TempDir::new().unwrap();

    quire()
        .args(["batch", temp_dir.path().to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("No supported files"));
}
