// Regression tests for the `bobbin` binary: exit codes, stdout and miette diagnostics on
// stderr.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::{prelude::PredicateBooleanExt, str::contains};

fn write(root: &Path, path: &str, text: &str) {
    let path = root.join(path);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, text).unwrap();
}

fn bobbin() -> Command {
    Command::cargo_bin("bobbin").unwrap()
}

#[test]
fn tokens_are_listed_one_per_line() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "page.x", "# Title\n");

    bobbin()
        .arg("tokens")
        .arg(dir.path().join("page.x"))
        .assert()
        .success()
        .stdout(contains("NonWord").and(contains("\"Title\"")));
}

#[test]
fn ast_is_printed_as_json() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "page.x", "title = Hello\n");

    bobbin()
        .arg("ast")
        .arg(dir.path().join("page.x"))
        .assert()
        .success()
        .stdout(contains("\"Declaration\"").and(contains("\"Hello\"")));
}

#[test]
fn render_uses_project_templates() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "config/templates/main.x", "<main>%%</main>\n");
    write(dir.path(), "source/index.x", "& main\n[#] = <h1>%%</h1>\n# Hi\n");

    bobbin()
        .arg("render")
        .arg(dir.path().join("source/index.x"))
        .arg("--root")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(contains("<main><h1>Hi</h1></main>"));
}

#[test]
fn render_failures_exit_nonzero_with_a_diagnostic() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "source/index.x", "%{nowhere}\n");

    bobbin()
        .arg("render")
        .arg(dir.path().join("source/index.x"))
        .arg("--root")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(contains("bobbin::render::resource_not_found"));
}

#[test]
fn build_prints_a_summary() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "source/index.x", "Hello\n");

    bobbin()
        .arg("build")
        .arg("--root")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(contains("built").and(contains("1 pages")));
    assert!(dir.path().join("public/index.html").is_file());
}

#[test]
fn build_without_an_index_fails() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "source/about.x", "About\n");

    bobbin()
        .arg("build")
        .arg("--root")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(contains("bobbin::build::missing_index"));
}

#[test]
fn bad_config_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "config/bobbin.toml", "path_mode = \"sideways\"\n");
    write(dir.path(), "source/index.x", "Hello\n");

    bobbin()
        .arg("build")
        .arg("--root")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(contains("bobbin::build::config").or(contains("path_mode")));
}

#[test]
fn render_can_print_an_error_page() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "source/index.x", "%{nowhere}\nafter\n");

    bobbin()
        .arg("render")
        .arg(dir.path().join("source/index.x"))
        .arg("--root")
        .arg(dir.path())
        .arg("--error-page")
        .assert()
        .failure()
        .stdout(
            contains("<h1>Build errors</h1>")
                .and(contains("class=\"failure\""))
                .and(contains("after").not()),
        );
}
