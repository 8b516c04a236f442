//! Best-effort desktop dialogs
//!
//! macOS: JavaScript for Automation dialogs run through `osascript`.
//! Linux: `pinentry` for the PIN and `notify-send` for everything else.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde::Deserialize;
use tracing::debug;

use crate::error::{PromptError, YkagentResult};
use crate::model::{Pin, PinRequest, TouchOutcome, TouchRequest};
use crate::ports::PresencePrompt;

const APP_NAME: &str = "ykagent";
/// Seconds the touch dialog stays up; the card's own window is ~15 s
const TOUCH_DIALOG_SECONDS: u32 = 5;
/// osascript error number for a dialog dismissed with Cancel
const USER_CANCELED: &str = "-128";
/// pinentry error code for a cancelled dialog
const PINENTRY_CANCELED: &str = "83886179";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Platform {
    MacOs,
    Linux,
    Other,
}

impl Platform {
    fn current() -> Self {
        if cfg!(target_os = "macos") {
            Platform::MacOs
        } else if cfg!(target_os = "linux") {
            Platform::Linux
        } else {
            Platform::Other
        }
    }
}

#[derive(Debug, Clone)]
pub struct DesktopPrompt {
    platform: Platform,
    pinentry: PathBuf,
}

impl Default for DesktopPrompt {
    fn default() -> Self {
        Self::new()
    }
}

impl DesktopPrompt {
    pub fn new() -> Self {
        Self {
            platform: Platform::current(),
            pinentry: PathBuf::from("pinentry"),
        }
    }

    fn unavailable(&self) -> PromptError {
        PromptError::Unavailable {
            reason: format!("no dialog support on {}", std::env::consts::OS),
        }
    }
}

/// What `osascript -s s` prints for a dialog result
#[derive(Debug, Default, Deserialize)]
struct DialogResult {
    #[serde(rename = "textReturned")]
    text_returned: Option<String>,
    #[serde(rename = "gaveUp", default)]
    gave_up: bool,
}

impl PresencePrompt for DesktopPrompt {
    fn request_pin(&self, request: &PinRequest) -> YkagentResult<Option<Pin>> {
        let entered = match self.platform {
            Platform::MacOs => run_osascript(&pin_script(request))?
                .map(|output| parse_dialog(&output))
                .transpose()?
                .and_then(|result| result.text_returned),
            Platform::Linux => run_pinentry(&self.pinentry, request)?,
            Platform::Other => return Err(self.unavailable().into()),
        };
        match entered {
            Some(pin) => Ok(Some(Pin::from_str(&pin)?)),
            None => Ok(None),
        }
    }

    fn request_touch(&self, request: &TouchRequest) -> YkagentResult<TouchOutcome> {
        match self.platform {
            Platform::MacOs => {
                let result = run_osascript(&touch_script(request))?
                    .map(|output| parse_dialog(&output))
                    .transpose()?
                    .unwrap_or_default();
                if result.gave_up {
                    Ok(TouchOutcome::TimedOut)
                } else {
                    Ok(TouchOutcome::Confirmed)
                }
            }
            Platform::Linux => {
                let message = format!("{}: waiting for touch...", request.identity);
                run_notify_send(&message, request.icon.as_deref())?;
                Ok(TouchOutcome::Confirmed)
            }
            Platform::Other => Err(self.unavailable().into()),
        }
    }

    fn notify(&self, message: &str) {
        let result = match self.platform {
            Platform::MacOs => {
                let script = format!(
                    "display notification {} with title \"{APP_NAME}\"",
                    applescript_string(message)
                );
                Command::new("osascript")
                    .args(["-e", &script])
                    .status()
                    .map(|_| ())
                    .map_err(|e| e.to_string())
            }
            Platform::Linux => run_notify_send(message, None).map_err(|e| e.to_string()),
            Platform::Other => Err(self.unavailable().to_string()),
        };
        if let Err(e) = result {
            debug!("Notification failed: {}", e);
        }
    }
}

fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

fn applescript_string(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

fn icon_option(icon: Option<&Path>) -> String {
    match icon {
        Some(path) => format!(
            ",\n    withIcon: Path({})",
            js_string(&path.to_string_lossy())
        ),
        None => String::new(),
    }
}

fn pin_script(request: &PinRequest) -> String {
    let text = format!(
        "{} ({} tries left)\n\nPlease enter your PIN:",
        request.identity, request.retries_remaining
    );
    format!(
        r#"var app = Application.currentApplication()
app.includeStandardAdditions = true
app.displayDialog({text}, {{
    defaultAnswer: "",
    withTitle: {title},
    buttons: ["Cancel", "OK"],
    defaultButton: "OK",
    cancelButton: "Cancel",
    hiddenAnswer: true{icon}
}})"#,
        text = js_string(&text),
        title = js_string(&format!("{APP_NAME} - PIN required")),
        icon = icon_option(request.icon.as_deref()),
    )
}

fn touch_script(request: &TouchRequest) -> String {
    format!(
        r#"var app = Application.currentApplication()
app.includeStandardAdditions = true
app.displayDialog({text}, {{
    withTitle: {title},
    buttons: ["Dismiss"],
    defaultButton: "Dismiss",
    givingUpAfter: {seconds}{icon}
}})"#,
        text = js_string(&format!("{}: please touch your YubiKey now.", request.identity)),
        title = js_string(&format!("{APP_NAME} - Touch required")),
        seconds = TOUCH_DIALOG_SECONDS,
        icon = icon_option(request.icon.as_deref()),
    )
}

fn parse_dialog(output: &str) -> YkagentResult<DialogResult> {
    serde_json::from_str(output.trim()).map_err(|e| {
        PromptError::Failed {
            reason: format!("failed to parse osascript output: {e}"),
        }
        .into()
    })
}

/// Run a JXA script. `Ok(None)` when the user pressed Cancel.
fn run_osascript(script: &str) -> YkagentResult<Option<String>> {
    let mut child = Command::new("osascript")
        .args(["-s", "s", "-l", "JavaScript"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(failed("failed to run osascript"))?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(script.as_bytes())
            .map_err(failed("failed to send script to osascript"))?;
    }
    let output = child
        .wait_with_output()
        .map_err(failed("osascript did not finish"))?;

    if output.status.success() {
        return Ok(Some(String::from_utf8_lossy(&output.stdout).into_owned()));
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    if stderr.contains(USER_CANCELED) {
        return Ok(None);
    }
    Err(PromptError::Failed {
        reason: format!("osascript exited with {}: {}", output.status, stderr.trim()),
    }
    .into())
}

/// Assuan escaping used by pinentry
fn assuan_escape(value: &str) -> String {
    value
        .replace('%', "%25")
        .replace('\n', "%0A")
        .replace('\r', "%0D")
}

fn assuan_unescape(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(byte) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn pinentry_commands(request: &PinRequest) -> String {
    let description = format!(
        "{} ({} tries left)\nPlease enter your PIN:",
        request.identity, request.retries_remaining
    );
    format!(
        "SETTITLE {APP_NAME} PIN Prompt\nSETDESC {}\nSETPROMPT PIN:\nGETPIN\nBYE\n",
        assuan_escape(&description)
    )
}

/// The PIN from a pinentry transcript; `Ok(None)` if the user cancelled
fn parse_pinentry(transcript: &str) -> YkagentResult<Option<String>> {
    for line in transcript.lines() {
        if let Some(data) = line.strip_prefix("D ") {
            return Ok(Some(assuan_unescape(data)));
        }
        if let Some(error) = line.strip_prefix("ERR ") {
            if error.starts_with(PINENTRY_CANCELED) {
                return Ok(None);
            }
            return Err(PromptError::Failed {
                reason: format!("pinentry: {error}"),
            }
            .into());
        }
    }
    Err(PromptError::Failed {
        reason: "pinentry returned no PIN".to_string(),
    }
    .into())
}

fn run_pinentry(program: &Path, request: &PinRequest) -> YkagentResult<Option<String>> {
    let mut child = Command::new(program)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(failed("failed to run pinentry"))?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(pinentry_commands(request).as_bytes())
            .map_err(failed("failed to talk to pinentry"))?;
    }
    let output = child
        .wait_with_output()
        .map_err(failed("pinentry did not finish"))?;
    parse_pinentry(&String::from_utf8_lossy(&output.stdout))
}

fn run_notify_send(message: &str, icon: Option<&Path>) -> YkagentResult<()> {
    let icon = icon
        .map(|path| path.to_string_lossy().into_owned())
        .unwrap_or_else(|| "dialog-password".to_string());
    let status = Command::new("notify-send")
        .args(["-i", &icon, APP_NAME, message])
        .status()
        .map_err(failed("failed to run notify-send"))?;
    if status.success() {
        Ok(())
    } else {
        Err(PromptError::Failed {
            reason: format!("notify-send exited with {status}"),
        }
        .into())
    }
}

fn failed(context: &'static str) -> impl Fn(std::io::Error) -> PromptError {
    move |e| PromptError::Failed {
        reason: format!("{context}: {e}"),
    }
}
