use anyhow::Result;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::{tempdir, TempDir};

fn create_test_files(dir: &TempDir, files: &[(&str, &str)]) -> Result<()> {
    for (name, content) in files {
        fs::write(dir.path().join(name), content)?;
    }
    Ok(())
}

fn skrgrep(dir: &TempDir) -> Result<Command> {
    let mut cmd = Command::cargo_bin("skrgrep-cli")?;
    cmd.env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .current_dir(dir.path());
    Ok(cmd)
}

#[test]
fn test_search_prints_header_records_and_total() -> Result<()> {
    let dir = tempdir()?;
    create_test_files(
        &dir,
        &[
            ("a.txt", "hit one\nhit two\n"),
            ("b.txt", "nothing here\n"),
            ("c.txt", "a hit\n"),
        ],
    )?;

    skrgrep(&dir)?
        .args(["search", "hit", "-f", "*.txt", "-j", "2", "--charset", "utf-8"])
        .arg("-d")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("□Search condition  \"hit\""))
        .stdout(predicate::str::contains("Target      *.txt"))
        .stdout(predicate::str::contains("a.txt(2,1): hit"))
        .stdout(predicate::str::contains("c.txt(1,3): hit"))
        .stdout(predicate::str::contains("b.txt").not())
        .stdout(predicate::str::contains("3 match(es) found."));
    Ok(())
}

#[test]
fn test_results_only_streamed_without_header() -> Result<()> {
    let dir = tempdir()?;
    create_test_files(&dir, &[("a.txt", "hit one\nhit two\n")])?;

    skrgrep(&dir)?
        .args(["search", "h.t", "-E", "-s", "3", "--no-header", "--stdout"])
        .arg("-d")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::diff("hit\r\nhit\r\n"));
    Ok(())
}

#[test]
fn test_replace_with_backup() -> Result<()> {
    let dir = tempdir()?;
    create_test_files(&dir, &[("a.txt", "old value\nkeep\n")])?;

    skrgrep(&dir)?
        .args(["replace", "old", "new", "-b", "-f", "*.txt"])
        .arg("-d")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Replace to  \"new\""))
        .stdout(predicate::str::contains("1 replacement(s) made."));

    assert_eq!(fs::read_to_string(dir.path().join("a.txt"))?, "new value\nkeep\n");
    assert_eq!(
        fs::read_to_string(dir.path().join("a.txt.bak"))?,
        "old value\nkeep\n"
    );
    Ok(())
}

#[test]
fn test_paste_inserts_stdin_verbatim() -> Result<()> {
    let dir = tempdir()?;
    create_test_files(&dir, &[("a.txt", "a1 a2\n")])?;

    skrgrep(&dir)?
        .args(["replace", r"a(\d)", "-E", "--paste"])
        .arg("-d")
        .arg(dir.path())
        .write_stdin("$1")
        .assert()
        .success()
        .stdout(predicate::str::contains("Replace to  (clipboard)"))
        .stdout(predicate::str::contains("2 replacement(s) made."));

    assert_eq!(fs::read_to_string(dir.path().join("a.txt"))?, "$1 $1\n");
    Ok(())
}

#[test]
fn test_file_search_lists_files() -> Result<()> {
    let dir = tempdir()?;
    create_test_files(&dir, &[("a.txt", "text\n"), ("b.log", "log\n")])?;

    skrgrep(&dir)?
        .args(["search", "", "-f", "*.log"])
        .arg("-d")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("(File search)"))
        .stdout(predicate::str::contains("b.log"))
        .stdout(predicate::str::contains("a.txt").not());
    Ok(())
}

#[test]
fn test_invalid_arguments_fail() -> Result<()> {
    let dir = tempdir()?;
    create_test_files(&dir, &[("a.txt", "text\n")])?;

    skrgrep(&dir)?
        .args(["search", "(unclosed", "-E"])
        .arg("-d")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("InvalidPattern"));

    skrgrep(&dir)?
        .args(["search", "text", "-t", "5"])
        .assert()
        .failure();

    skrgrep(&dir)?
        .args(["search", "text", "--charset", "klingon"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown charset"));
    Ok(())
}
