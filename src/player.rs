use std::fs::OpenOptions;
use std::io::Write;
use std::process::{Child, Command, Stdio};
use std::sync::Mutex;

use anyhow::{bail, Context, Result};
use once_cell::sync::OnceCell;

/// Placeholder substituted with the resolved stream URL in the configured
/// player command.
pub const URL_PLACEHOLDER: &str = "%URL%";

fn audio_debug_enabled() -> bool {
    static FLAG: OnceCell<bool> = OnceCell::new();
    *FLAG.get_or_init(|| {
        std::env::var("NOOR_TUI_DEBUG_AUDIO")
            .map(|val| {
                let trimmed = val.trim();
                !(trimmed.is_empty()
                    || trimmed.eq_ignore_ascii_case("0")
                    || trimmed.eq_ignore_ascii_case("false")
                    || trimmed.eq_ignore_ascii_case("no")
                    || trimmed.eq_ignore_ascii_case("off"))
            })
            .unwrap_or(false)
    })
}

fn audio_debug_writer() -> Option<&'static Mutex<std::fs::File>> {
    static WRITER: OnceCell<Option<Mutex<std::fs::File>>> = OnceCell::new();
    WRITER
        .get_or_init(|| {
            std::env::var("NOOR_TUI_DEBUG_AUDIO_LOG")
                .ok()
                .and_then(|path| {
                    OpenOptions::new()
                        .create(true)
                        .append(true)
                        .open(path)
                        .map(Mutex::new)
                        .ok()
                })
        })
        .as_ref()
}

pub fn debug_log(message: impl AsRef<str>) {
    if !audio_debug_enabled() {
        return;
    }
    if let Some(writer) = audio_debug_writer() {
        if let Ok(mut file) = writer.lock() {
            let _ = writeln!(file, "{}", message.as_ref());
            return;
        }
    }
    eprintln!("{}", message.as_ref());
}

/// Spawns the configured external player for recitation URLs. Playback
/// mechanics stay with the player process; this only starts and stops it.
pub struct Player {
    command: Vec<String>,
    detach: bool,
    child: Option<Child>,
}

impl Player {
    pub fn new(command: Vec<String>, detach: bool) -> Self {
        Self {
            command,
            detach,
            child: None,
        }
    }

    pub fn play(&mut self, url: &str) -> Result<()> {
        self.stop();
        let argv = build_invocation(&self.command, url)?;
        debug_log(format!("player: spawning {:?}", argv));
        let mut command = Command::new(&argv[0]);
        command
            .args(&argv[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        let child = command
            .spawn()
            .with_context(|| format!("player: spawn {}", argv[0]))?;
        if self.detach {
            drop(child);
        } else {
            self.child = Some(child);
        }
        Ok(())
    }

    /// Kills a tracked player process. Detached players are not reachable
    /// from here.
    pub fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            debug_log("player: stopping tracked process");
            let _ = child.kill();
            let _ = child.wait();
        }
    }

}

impl Drop for Player {
    fn drop(&mut self) {
        self.stop();
    }
}

fn build_invocation(template: &[String], url: &str) -> Result<Vec<String>> {
    if template.is_empty() {
        bail!("player: audio command is empty");
    }
    let mut argv: Vec<String> = template
        .iter()
        .map(|part| part.replace(URL_PLACEHOLDER, url))
        .collect();
    if !template.iter().any(|part| part.contains(URL_PLACEHOLDER)) {
        argv.push(url.to_string());
    }
    Ok(argv)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_the_url_placeholder() {
        let argv = build_invocation(
            &["mpv".into(), "--no-video".into(), "%URL%".into()],
            "https://cdn.example/001.mp3",
        )
        .unwrap();
        assert_eq!(
            argv,
            vec!["mpv", "--no-video", "https://cdn.example/001.mp3"]
        );
    }

    #[test]
    fn appends_the_url_when_no_placeholder_is_present() {
        let argv = build_invocation(&["mpv".into()], "https://cdn.example/001.mp3").unwrap();
        assert_eq!(argv, vec!["mpv", "https://cdn.example/001.mp3"]);
    }

    #[test]
    fn rejects_an_empty_command() {
        assert!(build_invocation(&[], "https://cdn.example/001.mp3").is_err());
    }
}
