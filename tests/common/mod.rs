//! Common test utilities and helpers for gitback tests
#![allow(dead_code)]

use chrono::Utc;
use gitback::{Repository, Visibility};
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// Run git in `dir` with a fixed identity, panicking on failure
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args([
            "-c",
            "user.name=gitback tests",
            "-c",
            "user.email=tests@gitback.invalid",
            "-c",
            "commit.gpgsign=false",
            "-c",
            "init.defaultBranch=main",
        ])
        .args(args)
        .current_dir(dir)
        .env("LC_ALL", "C")
        .output()
        .expect("Failed to execute git");

    assert!(
        output.status.success(),
        "git {:?} failed in {}: {}",
        args,
        dir.display(),
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Bare "remote" repositories plus a mirror root, all inside one temp dir
pub struct GitFixture {
    pub temp_dir: TempDir,
    pub mirrors: PathBuf,
    remotes: PathBuf,
    work: PathBuf,
}

impl GitFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let mirrors = temp_dir.path().join("mirrors");
        let remotes = temp_dir.path().join("remotes");
        let work = temp_dir.path().join("work");
        for dir in [&mirrors, &remotes, &work] {
            std::fs::create_dir_all(dir).expect("Failed to create fixture dir");
        }

        Self {
            temp_dir,
            mirrors,
            remotes,
            work,
        }
    }

    /// Create a bare remote with one commit and return its clone URL
    pub fn create_remote(&self, name: &str) -> String {
        let bare = self.remotes.join(format!("{}.git", name.replace('/', "_")));
        std::fs::create_dir_all(&bare).unwrap();
        git(&bare, &["init", "--bare"]);

        let work = self.work_dir(name);
        git(&self.work, &["clone", bare.to_str().unwrap(), work.to_str().unwrap()]);
        self.commit(name, "README.md", "initial");

        bare.to_string_lossy().to_string()
    }

    /// Commit `content` to `file` in the remote named `name` and push it
    pub fn commit(&self, name: &str, file: &str, content: &str) {
        let work = self.work_dir(name);
        std::fs::write(work.join(file), content).unwrap();
        git(&work, &["add", file]);
        git(&work, &["commit", "-m", &format!("update {}", file)]);
        git(&work, &["push", "origin", "HEAD:main"]);
    }

    /// Replace the remote's last commit so existing mirrors can no longer fast-forward
    pub fn rewrite_history(&self, name: &str, content: &str) {
        let work = self.work_dir(name);
        std::fs::write(work.join("README.md"), content).unwrap();
        git(&work, &["add", "README.md"]);
        git(&work, &["commit", "--amend", "-m", "rewritten"]);
        git(&work, &["push", "--force", "origin", "HEAD:main"]);
    }

    pub fn mirror(&self, name: &str) -> PathBuf {
        self.mirrors.join(name)
    }

    fn work_dir(&self, name: &str) -> PathBuf {
        self.work.join(name.replace('/', "_"))
    }
}

/// Catalog record for a repository served from `url`
pub fn repository(name: &str, url: &str) -> Repository {
    Repository {
        clone_url: url.to_string(),
        name: name.to_string(),
        size: 1,
        created_at: Utc::now(),
        owner: true,
        member: true,
        visibility: Visibility::Private,
        provider_name: "local".to_string(),
        archived: false,
    }
}

/// Assertion helpers for test validation
pub fn assert_contains_all(text: &str, expected: &[&str]) {
    for item in expected {
        assert!(
            text.contains(item),
            "Expected text to contain '{}', but it didn't. Text: {}",
            item,
            text
        );
    }
}
