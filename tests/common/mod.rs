use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

/// Write an executable shell script that stands in for the agent CLI.
///
/// The script consumes the single prompt line and then runs `body`, which
/// typically echoes stream-json frames.
#[cfg(unix)]
#[allow(dead_code)]
pub fn fake_agent_cli(dir: &TempDir, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.path().join("fake-agent");
    fs::write(&path, format!("#!/bin/sh\nread -r line\n{}\n", body))
        .expect("failed to write fake agent");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
        .expect("failed to mark fake agent executable");
    path
}

/// A fake agent turn that says `text` and finishes with `session_id`.
#[allow(dead_code)]
pub fn text_turn(text: &str, session_id: &str) -> String {
    format!(
        "echo '{{\"type\":\"system\",\"subtype\":\"init\"}}'\n\
         echo '{{\"type\":\"assistant\",\"message\":{{\"content\":[{{\"type\":\"text\",\"text\":\"{}\"}}]}}}}'\n\
         echo '{{\"type\":\"result\",\"subtype\":\"success\",\"session_id\":\"{}\",\"usage\":{{\"input_tokens\":3,\"output_tokens\":4}}}}'",
        text, session_id
    )
}
