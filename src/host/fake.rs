use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use anyhow::{bail, Result};

use super::Host;

#[derive(Debug, Clone)]
pub enum Reply {
    Ok(String),
    Fail,
}

/// In-memory host. Commands are answered by the most recently scripted
/// reply whose pattern is a substring of the command; anything unscripted succeeds
/// with empty output. File writes are logged as `write <path>` alongside
/// commands so tests can check ordering.
#[derive(Default)]
pub struct FakeHost {
    replies: Vec<(String, Reply)>,
    files: Mutex<BTreeMap<String, String>>,
    private: Mutex<BTreeSet<String>>,
    commands: Mutex<Vec<String>>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, pattern: &str, reply: Reply) -> Self {
        self.replies.insert(0, (pattern.to_string(), reply));
        self
    }

    pub fn stdout(self, pattern: &str, stdout: &str) -> Self {
        self.reply(pattern, Reply::Ok(stdout.to_string()))
    }

    pub fn file(self, path: &str, content: &str) -> Self {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), content.to_string());
        self
    }

    pub fn content(&self, path: &str) -> Option<String> {
        self.files.lock().unwrap().get(path).cloned()
    }

    /// Whether `path` was last written with `write_private`
    pub fn is_private(&self, path: &str) -> bool {
        self.private.lock().unwrap().contains(path)
    }

    pub fn paths(&self) -> Vec<String> {
        self.files.lock().unwrap().keys().cloned().collect()
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    /// Whether any executed command contains `needle`
    pub fn ran(&self, needle: &str) -> bool {
        self.commands().iter().any(|c| c.contains(needle))
    }

    fn answer(&self, cmd: &str) -> Reply {
        self.commands.lock().unwrap().push(cmd.to_string());
        self.replies
            .iter()
            .find(|(pattern, _)| cmd.contains(pattern.as_str()))
            .map(|(_, reply)| reply.clone())
            .unwrap_or_else(|| Reply::Ok(String::new()))
    }
}

impl Host for FakeHost {
    async fn exec(&self, cmd: &str) -> Result<String> {
        match self.answer(cmd) {
            Reply::Ok(out) => Ok(out),
            Reply::Fail => bail!("Command failed: {}", cmd),
        }
    }

    async fn exec_ok(&self, cmd: &str) -> Result<bool> {
        Ok(matches!(self.answer(cmd), Reply::Ok(_)))
    }

    async fn read_file(&self, path: &str) -> Result<Option<String>> {
        Ok(self.content(path))
    }

    async fn write_file(&self, path: &str, content: &str) -> Result<()> {
        self.commands.lock().unwrap().push(format!("write {}", path));
        self.private.lock().unwrap().remove(path);
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), content.to_string());
        Ok(())
    }

    async fn write_private(&self, path: &str, content: &str) -> Result<()> {
        self.write_file(path, content).await?;
        self.private.lock().unwrap().insert(path.to_string());
        Ok(())
    }

    async fn path_exists(&self, path: &str) -> Result<bool> {
        let dir = format!("{}/", path.trim_end_matches('/'));
        Ok(self
            .files
            .lock()
            .unwrap()
            .keys()
            .any(|p| p == path || p.starts_with(&dir)))
    }
}
