use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::tempdir;

fn sandpit() -> Command {
    #[allow(deprecated)]
    Command::cargo_bin("sandpit").expect("sandpit binary")
}

#[test]
fn init_scaffolds_config_and_sources() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;

    sandpit()
        .arg("init")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("sandpit initialized"));

    for name in ["sandpit.yml", "index.html", "styles.css", "script.js", "main.js", "stdin.txt"] {
        assert!(dir.path().join(name).exists(), "missing {}", name);
    }
    let config = fs::read_to_string(dir.path().join("sandpit.yml"))?;
    assert!(config.contains("default_mode: html"));
    Ok(())
}

#[test]
fn build_markup_inlines_sources_to_stdout() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    sandpit().arg("init").arg(dir.path()).assert().success();
    fs::write(dir.path().join("styles.css"), "h1{color:teal}")?;

    let assert = sandpit()
        .current_dir(dir.path())
        .args(["build", "--mode", "html"])
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone())?;
    assert!(stdout.contains("h1{color:teal}"));
    assert!(stdout.contains("sandpitInstrumented"));
    assert_eq!(stdout.matches("hello from script.js").count(), 1);
    assert!(!stdout.contains("src=\"script.js\""));
    Ok(())
}

#[test]
fn build_script_mode_writes_file() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    sandpit().arg("init").arg(dir.path()).assert().success();
    let out = dir.path().join("dist/run.html");

    sandpit()
        .current_dir(dir.path())
        .args(["build", "--mode", "js", "--output"])
        .arg(&out)
        .assert()
        .success();

    let html = fs::read_to_string(&out)?;
    assert!(html.contains("AsyncFunction"));
    assert!(html.contains("id=\"sandpit-console\""));
    Ok(())
}

#[test]
fn build_without_config_uses_defaults() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;

    sandpit()
        .current_dir(dir.path())
        .args(["build", "--mode", "html"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Hello from index.html"));
    Ok(())
}

#[test]
fn export_follows_mode() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    sandpit().arg("init").arg(dir.path()).assert().success();
    fs::write(dir.path().join("main.js"), "console.log(prompt())")?;
    let out = dir.path().join("out");

    sandpit()
        .current_dir(dir.path())
        .args(["export", "--mode", "js", "--output"])
        .arg(&out)
        .assert()
        .success();
    assert_eq!(fs::read_to_string(out.join("main.js"))?, "console.log(prompt())");

    sandpit()
        .current_dir(dir.path())
        .args(["export", "--mode", "html", "--output"])
        .arg(&out)
        .assert()
        .success();
    assert!(fs::read_to_string(out.join("index.html"))?.contains("<style>"));
    Ok(())
}

#[test]
fn invalid_config_fails() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    fs::write(dir.path().join("sandpit.yml"), "server:\n  port: 0\n")?;

    sandpit()
        .current_dir(dir.path())
        .args(["build"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load config"));
    Ok(())
}
