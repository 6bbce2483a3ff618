use std::error::Error;
use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn cli(settings_dir: &Path) -> Result<Command, Box<dyn Error>> {
    let mut command = Command::cargo_bin("cambench-cli")?;
    command
        .current_dir(settings_dir)
        .env_remove("RUST_LOG")
        .args(["--settings-dir", settings_dir.to_str().unwrap()]);
    Ok(command)
}

#[test]
fn settings_show_lists_compiled_defaults() -> Result<(), Box<dyn Error>> {
    let workspace = tempdir()?;

    cli(workspace.path())?
        .args(["settings", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "displayName = NC Program (default)",
        ))
        .stdout(predicate::str::contains("name = 1001 (default)"))
        .stdout(predicate::str::contains("createFolder = false (default)"));

    assert!(!workspace.path().join("defaults.json").exists());
    Ok(())
}

#[test]
fn settings_set_persists_and_reset_restores() -> Result<(), Box<dyn Error>> {
    let workspace = tempdir()?;

    cli(workspace.path())?
        .args(["settings", "set", "name", "2040"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Saved name"));
    cli(workspace.path())?
        .args(["settings", "set", "createFolder", "true"])
        .assert()
        .success();

    let contents = fs::read_to_string(workspace.path().join("defaults.json"))?;
    assert!(contents.contains("\"userSettings\""));
    assert!(contents.contains("\"2040\""));

    cli(workspace.path())?
        .args(["settings", "get", "name"])
        .assert()
        .success()
        .stdout("2040\n");
    cli(workspace.path())?
        .args(["settings", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("createFolder = true\n"));

    cli(workspace.path())?
        .args(["settings", "reset", "name"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Reset name"));
    cli(workspace.path())?
        .args(["settings", "get", "name"])
        .assert()
        .success()
        .stdout("1001\n");
    Ok(())
}

#[test]
fn settings_set_rejects_unknown_keys_and_wrong_types() -> Result<(), Box<dyn Error>> {
    let workspace = tempdir()?;

    cli(workspace.path())?
        .args(["settings", "set", "colour", "red"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown setting 'colour'"));
    cli(workspace.path())?
        .args(["settings", "set", "createFolder", "maybe"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("expects a bool value"));

    assert!(!workspace.path().join("defaults.json").exists());
    Ok(())
}

#[test]
fn malformed_settings_fall_back_to_defaults() -> Result<(), Box<dyn Error>> {
    let workspace = tempdir()?;
    fs::write(workspace.path().join("defaults.json"), "{ not json")?;

    cli(workspace.path())?
        .args(["settings", "get", "displayName"])
        .assert()
        .success()
        .stdout("NC Program\n")
        .stderr(predicate::str::contains("was malformed"));
    Ok(())
}

#[test]
fn tree_prints_both_panels_and_all_commands() -> Result<(), Box<dyn Error>> {
    let workspace = tempdir()?;

    cli(workspace.path())?
        .arg("tree")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "CAM_UTILITIES_cam_tab [sub-container]",
        ))
        .stdout(predicate::str::contains("\"CAM UTILITIES\""))
        .stdout(predicate::str::contains("\"POST UTILITIES\""))
        .stdout(predicate::str::contains(
            "DSI_CamUtilities_ropeThread [leaf]",
        ))
        .stdout(predicate::str::contains(
            "DSI_CamUtilities_setNcProgramDefaults [leaf]",
        ));
    Ok(())
}

#[test]
fn tree_follows_addin_config() -> Result<(), Box<dyn Error>> {
    let workspace = tempdir()?;
    let config = workspace.path().join("addin.json");
    fs::write(&config, r#"{ "company_name": "ACME" }"#)?;

    cli(workspace.path())?
        .args(["--config", config.to_str().unwrap(), "tree"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "ACME_CamUtilities_Template_Command",
        ))
        .stdout(predicate::str::contains("DSI_").not());
    Ok(())
}

#[test]
fn simulate_saves_edited_defaults_and_cleans_up() -> Result<(), Box<dyn Error>> {
    let workspace = tempdir()?;
    let folder = workspace.path().join("programs");

    let assert = cli(workspace.path())?
        .args([
            "simulate",
            "--display-name",
            "Bracket Op",
            "--folder",
            folder.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("defaults saved"))
        .stdout(predicate::str::contains("display name: Bracket Op"))
        .stdout(predicate::str::contains(format!(
            "output folder: {}",
            folder.display()
        )));

    let stdout = String::from_utf8(assert.get_output().stdout.clone())?;
    let after = stdout
        .split("== after stop ==\n")
        .nth(1)
        .ok_or("missing teardown section")?;
    assert_eq!(
        after.lines().count(),
        1,
        "only the workspace remains: {after}"
    );

    let contents = fs::read_to_string(workspace.path().join("defaults.json"))?;
    assert!(contents.contains("Bracket Op"));
    Ok(())
}

#[test]
fn simulate_cancel_leaves_settings_untouched() -> Result<(), Box<dyn Error>> {
    let workspace = tempdir()?;

    cli(workspace.path())?
        .args(["simulate", "--display-name", "Discarded", "--cancel"])
        .assert()
        .success()
        .stdout(predicate::str::contains("dialog cancelled"))
        .stdout(predicate::str::contains("display name: NC Program"));

    assert!(!workspace.path().join("defaults.json").exists());
    Ok(())
}

#[test]
fn simulate_fails_when_defaults_cannot_be_written() -> Result<(), Box<dyn Error>> {
    let workspace = tempdir()?;
    // A file where the settings directory should be makes every save fail.
    let blocked = workspace.path().join("blocked");
    fs::write(&blocked, "")?;

    Command::cargo_bin("cambench-cli")?
        .current_dir(workspace.path())
        .env_remove("RUST_LOG")
        .args(["--settings-dir", blocked.to_str().unwrap(), "simulate"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("defaults saved").not())
        .stderr(predicate::str::contains("defaults were not saved"));
    Ok(())
}
