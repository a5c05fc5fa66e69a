use anyhow::{Context, Result};
use std::path::Path;

use crate::compose;
use crate::output;

/// Patch a compose file on disk the same way `install` does.
pub fn run(file: &Path, port: u16, dry_run: bool) -> Result<()> {
    let source = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let patch = compose::patch_ports(&source, port);

    if !patch.structured {
        output::warning("File does not parse as YAML; used the literal 80:80 substitution");
    }

    if dry_run {
        print!("{}", patch.content);
        return Ok(());
    }

    if !patch.changed() {
        output::success(&format!("{}: no service publishes port 80", file.display()));
        return Ok(());
    }

    std::fs::write(file, &patch.content)
        .with_context(|| format!("Failed to write {}", file.display()))?;

    for rebind in &patch.rebinds {
        output::success(&format!("{}: {} → {}", rebind.service, rebind.from, rebind.to));
    }
    if patch.missed > 0 {
        output::warning(&format!(
            "{} binding(s) on port 80 left for manual editing",
            patch.missed
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patches_file_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docker-compose.yml");
        std::fs::write(&path, "services:\n  web:\n    ports:\n      - \"80:80\"\n").unwrap();

        run(&path, 9001, false).unwrap();

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "services:\n  web:\n    ports:\n      - \"127.0.0.1:9001:80\"\n"
        );
    }

    #[test]
    fn dry_run_leaves_file_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docker-compose.yml");
        let source = "services:\n  web:\n    ports:\n      - \"80:80\"\n";
        std::fs::write(&path, source).unwrap();

        run(&path, 9001, true).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), source);
    }
}
