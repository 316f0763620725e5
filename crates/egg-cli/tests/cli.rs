//! End-to-end CLI behavior.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const MANIFEST: &str = "\
name: Demo Notebook
description: two trivial cells
cells:
  - language: python
    source: hello.py
  - language: r
    source: hello.R
";

fn egg() -> Command {
    let mut cmd = Command::cargo_bin("egg").unwrap();
    for var in [
        "EGG_SIGNING_KEY",
        "EGG_PRIVATE_KEY",
        "EGG_PUBLIC_KEY",
        "EGG_REGISTRY_URL",
        "EGG_DOWNLOAD_TIMEOUT",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

fn demo_tree() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("manifest.yaml"), MANIFEST).unwrap();
    fs::write(dir.path().join("hello.py"), "print('hello')\n").unwrap();
    fs::write(dir.path().join("hello.R"), "cat('hello')\n").unwrap();
    dir
}

fn build_demo(dir: &TempDir) -> PathBuf {
    let output = dir.path().join("demo.egg");
    egg()
        .current_dir(dir.path())
        .args(["build", "--manifest", "manifest.yaml", "--output", "demo.egg"])
        .assert()
        .success()
        .stdout(predicate::str::contains("built Demo Notebook"));
    output
}

/// Rewrite one entry of a zip archive in place.
fn replace_entry(path: &Path, target: &str, data: &[u8]) {
    let mut archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
    let mut contents: Vec<(String, Vec<u8>)> = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).unwrap();
        let name = entry.name().to_string();
        let mut buf = Vec::new();
        entry.read_to_end(&mut buf).unwrap();
        contents.push((name, buf));
    }
    drop(archive);

    let mut writer = zip::ZipWriter::new(File::create(path).unwrap());
    for (name, buf) in &contents {
        writer
            .start_file(name.as_str(), zip::write::FileOptions::default())
            .unwrap();
        if name == target {
            writer.write_all(data).unwrap();
        } else {
            writer.write_all(buf).unwrap();
        }
    }
    writer.finish().unwrap();
}

#[test]
fn build_then_verify_roundtrip() {
    let dir = demo_tree();
    build_demo(&dir);

    egg()
        .current_dir(dir.path())
        .args(["verify", "--egg", "demo.egg"])
        .assert()
        .success()
        .stdout(predicate::str::contains("verified: 3 entries OK"));
}

#[test]
fn build_refuses_to_overwrite_without_force() {
    let dir = demo_tree();
    build_demo(&dir);

    egg()
        .current_dir(dir.path())
        .args(["build", "--manifest", "manifest.yaml", "--output", "demo.egg"])
        .assert()
        .code(1)
        .stderr(predicate::str::starts_with("E_EXISTS"));

    egg()
        .current_dir(dir.path())
        .args([
            "build",
            "--manifest",
            "manifest.yaml",
            "--output",
            "demo.egg",
            "--force",
        ])
        .assert()
        .success();
}

#[test]
fn tampered_archive_fails_verification() {
    let dir = demo_tree();
    let output = build_demo(&dir);

    replace_entry(&output, "hello.py", b"print('tampered')\n");

    egg()
        .current_dir(dir.path())
        .args(["verify", "--egg", "demo.egg"])
        .assert()
        .code(1)
        .stderr(predicate::str::starts_with("E_DIGEST"));
}

#[test]
fn wrong_public_key_fails_verification() {
    let dir = demo_tree();
    build_demo(&dir);

    let other_key = hex::encode(
        egg_core::signer::signing_key_from_seed(b"some-other-seed")
            .verifying_key()
            .to_bytes(),
    );
    egg()
        .current_dir(dir.path())
        .args(["verify", "--egg", "demo.egg", "--public-key", &other_key])
        .assert()
        .code(1)
        .stderr(predicate::str::starts_with("E_SIGNATURE"));
}

#[test]
fn escaping_source_fails_the_build() {
    let dir = TempDir::new().unwrap();
    let sub = dir.path().join("sub");
    fs::create_dir(&sub).unwrap();
    fs::write(
        sub.join("manifest.yaml"),
        "name: n\ndescription: d\ncells:\n  - language: python\n    source: ../evil.py\n",
    )
    .unwrap();

    egg()
        .current_dir(&sub)
        .args(["build", "--manifest", "manifest.yaml", "--output", "demo.egg"])
        .assert()
        .code(1)
        .stderr(predicate::str::starts_with("E_PATH"));
    assert!(!sub.join("demo.egg").exists());
}

#[test]
fn info_prints_manifest_summary() {
    let dir = demo_tree();
    build_demo(&dir);

    egg()
        .current_dir(dir.path())
        .args(["info", "--egg", "demo.egg"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Demo Notebook")
                .and(predicate::str::contains("[python] hello.py"))
                .and(predicate::str::contains("[r] hello.R")),
        );
}

#[test]
fn hatch_executes_cells() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("manifest.yaml"),
        "name: shell demo\ndescription: d\ncells:\n  - language: bash\n    source: hello.sh\n",
    )
    .unwrap();
    fs::write(dir.path().join("hello.sh"), "echo hi from the egg\n").unwrap();

    egg()
        .current_dir(dir.path())
        .args(["build", "--manifest", "manifest.yaml", "--output", "demo.egg"])
        .assert()
        .success();

    egg()
        .current_dir(dir.path())
        .args(["hatch", "--egg", "demo.egg", "--no-sandbox"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("hi from the egg")
                .and(predicate::str::contains("1 cells completed")),
        );
}

#[test]
fn hatch_reports_missing_runtime() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("manifest.yaml"),
        "name: shell demo\ndescription: d\ncells:\n  - language: bash\n    source: hello.sh\n",
    )
    .unwrap();
    fs::write(dir.path().join("hello.sh"), "echo hi\n").unwrap();

    egg()
        .current_dir(dir.path())
        .args(["build", "--manifest", "manifest.yaml", "--output", "demo.egg"])
        .assert()
        .success();

    egg()
        .current_dir(dir.path())
        .env("EGG_CMD_BASH", "/definitely/not/a/shell")
        .args(["hatch", "--egg", "demo.egg", "--no-sandbox"])
        .assert()
        .code(1)
        .stderr(
            predicate::str::starts_with("E_RUNTIME_MISSING")
                .and(predicate::str::contains("/definitely/not/a/shell")),
        );
}

#[test]
fn hatch_rejects_unknown_language() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("manifest.yaml"),
        "name: n\ndescription: d\ncells:\n  - language: cobol\n    source: prog.cob\n",
    )
    .unwrap();
    fs::write(dir.path().join("prog.cob"), "DISPLAY 'HI'.\n").unwrap();

    egg()
        .current_dir(dir.path())
        .args(["build", "--manifest", "manifest.yaml", "--output", "demo.egg"])
        .assert()
        .success();

    egg()
        .current_dir(dir.path())
        .args(["hatch", "--egg", "demo.egg", "--no-sandbox"])
        .assert()
        .code(1)
        .stderr(predicate::str::starts_with("E_UNSUPPORTED_LANG"));
}

#[test]
fn languages_lists_the_command_table() {
    egg()
        .arg("languages")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("python: python3")
                .and(predicate::str::contains("bash: bash"))
                .and(predicate::str::contains("r: Rscript")),
        );
}

#[test]
fn clean_removes_byproducts() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("precompute_hashes.yaml"), "a: b\n").unwrap();
    fs::write(dir.path().join("hello.py.out"), "output\n").unwrap();
    fs::create_dir_all(dir.path().join("nested/sandbox/python-image")).unwrap();
    fs::write(dir.path().join("keep.py"), "print('keep')\n").unwrap();

    egg()
        .current_dir(dir.path())
        .args(["clean", ".", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("would remove"));
    assert!(dir.path().join("hello.py.out").exists());

    egg()
        .current_dir(dir.path())
        .args(["clean", "."])
        .assert()
        .success();

    assert!(!dir.path().join("precompute_hashes.yaml").exists());
    assert!(!dir.path().join("hello.py.out").exists());
    assert!(!dir.path().join("nested/sandbox").exists());
    assert!(dir.path().join("keep.py").exists());
}

#[test]
fn missing_subcommand_is_a_usage_error() {
    egg().assert().code(2);
}

#[test]
fn version_flag_prints_version() {
    egg()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}
