use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

fn yt2mp3(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("yt2mp3").unwrap();
    cmd.env("HOME", home).env_remove("RUST_LOG");
    cmd
}

fn write_config(home: &Path, output_dir: &Path) {
    let config = serde_json::json!({
        "output_dir": output_dir,
        "transcripts_dir": home.join("captions"),
    });
    fs_err::write(home.join(".yt2mp3_config.json"), config.to_string()).unwrap();
}

#[test]
fn test_help_lists_commands() {
    let home = TempDir::new().unwrap();
    yt2mp3(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("download"))
        .stdout(predicate::str::contains("playlist"))
        .stdout(predicate::str::contains("transcript"))
        .stdout(predicate::str::contains("watch"));
}

#[test]
fn test_config_shows_defaults() {
    let home = TempDir::new().unwrap();
    yt2mp3(home.path())
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("Output directory:"))
        .stdout(predicate::str::contains("yt2mp3"))
        .stdout(predicate::str::contains(".yt2mp3_config.json"))
        .stdout(predicate::str::contains("Total files: 0"));
}

#[test]
fn test_set_dir_persists_to_config_file() {
    let home = TempDir::new().unwrap();
    let target = home.path().join("music").join("mp3");

    yt2mp3(home.path())
        .args(["set-dir", target.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Output directory set to"));

    assert!(target.is_dir());
    let stored = fs_err::read_to_string(home.path().join(".yt2mp3_config.json")).unwrap();
    let stored: serde_json::Value = serde_json::from_str(&stored).unwrap();
    assert!(stored["output_dir"].as_str().unwrap().ends_with("mp3"));
}

#[test]
fn test_list_empty_directory() {
    let home = TempDir::new().unwrap();
    let music = home.path().join("music");
    fs_err::create_dir_all(&music).unwrap();
    write_config(home.path(), &music);

    yt2mp3(home.path())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No MP3 files in"));
}

#[test]
fn test_list_truncates_to_count() {
    let home = TempDir::new().unwrap();
    let music = home.path().join("music");
    fs_err::create_dir_all(&music).unwrap();
    for name in ["a.mp3", "b.mp3", "c.mp3"] {
        fs_err::write(music.join(name), vec![0u8; 1024]).unwrap();
    }
    fs_err::write(music.join("notes.txt"), b"x").unwrap();
    write_config(home.path(), &music);

    yt2mp3(home.path())
        .args(["list", "-n", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("... and 1 more files"))
        .stdout(predicate::str::contains("notes.txt").not());
}

#[test]
fn test_trim_without_target_fails() {
    let home = TempDir::new().unwrap();
    yt2mp3(home.path())
        .arg("trim")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Specify a file or use --all"));
}

#[test]
fn test_trim_all_with_empty_library() {
    let home = TempDir::new().unwrap();
    let music = home.path().join("music");
    fs_err::create_dir_all(&music).unwrap();
    write_config(home.path(), &music);

    yt2mp3(home.path())
        .args(["trim", "--all"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No MP3 files found"));
}

#[test]
fn test_batch_without_urls_fails() {
    let home = TempDir::new().unwrap();
    yt2mp3(home.path())
        .arg("batch")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("No URLs provided"));
}

#[test]
fn test_download_rejects_bad_clip_before_fetching() {
    let home = TempDir::new().unwrap();
    yt2mp3(home.path())
        .args(["download", "https://youtu.be/abc", "-s", "2:00", "-e", "1:00"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("must be after clip start"));
}

#[test]
fn test_download_rejects_unknown_quality() {
    let home = TempDir::new().unwrap();
    yt2mp3(home.path())
        .args(["download", "https://youtu.be/abc", "-q", "256"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("256"));
}
