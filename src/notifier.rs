//! Delivery of due-task alerts.
//!
//! A [`Notifier`] tries every channel it has on each call: a sound cue, then
//! a desktop notification, falling back to a blocking alert when the desktop
//! channel is unavailable, not permitted, or fails. Nothing here returns an
//! error to the caller; each channel's outcome is reported in a [`Delivery`].

use std::env;
use std::io::{self, Write as _};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::Sender;

use anyhow::{bail, Context, Result};
use log::{debug, info, warn};

use crate::config::{NotifyConfig, SoundSetting};

/// Title used for every desktop notification.
pub const NOTIFICATION_TITLE: &str = "🔔 Study Reminder";

pub fn notification_body(title: &str) -> String {
    format!("Time for: {title}")
}

pub fn alert_message(title: &str) -> String {
    format!("Reminder: {title}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Delivered,
    Skipped,
    Failed(String),
}

impl Outcome {
    pub fn delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }
}

/// What happened on each channel for one reminder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub sound: Outcome,
    pub system: Outcome,
    pub alert: Outcome,
}

impl Delivery {
    /// True if the user was shown something, through either visual channel.
    pub fn visible(&self) -> bool {
        self.system.delivered() || self.alert.delivered()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Default,
    Granted,
    Denied,
}

/// A replayable sound.
pub trait AudioCue {
    /// Resets playback to the start, cutting off any cue still playing.
    fn rewind(&mut self) -> Result<()>;
    fn play(&mut self) -> Result<()>;
}

/// Platform notification center.
pub trait SystemNotifications {
    fn is_supported(&self) -> bool;
    fn request_permission(&mut self) -> Permission;
    fn permission(&self) -> Permission;
    fn show(&mut self, title: &str, body: &str) -> Result<()>;
}

/// Last-resort visual channel. Implementations block until the alert has been
/// handed to the user.
pub trait Alert {
    fn alert(&mut self, message: &str) -> Result<()>;
}

pub struct Notifier {
    sound: Option<Box<dyn AudioCue>>,
    system: Box<dyn SystemNotifications>,
    alert: Box<dyn Alert>,
}

impl Notifier {
    /// Builds a notifier and asks for desktop notification permission once,
    /// up front, so delivery never waits on a pending prompt.
    pub fn new(
        sound: Option<Box<dyn AudioCue>>,
        mut system: Box<dyn SystemNotifications>,
        alert: Box<dyn Alert>,
    ) -> Self {
        if system.is_supported() && system.permission() == Permission::Default {
            let permission = system.request_permission();
            info!("desktop notification permission: {permission:?}");
        }
        Self {
            sound,
            system,
            alert,
        }
    }

    /// Builds the channels described by `config`, with `alert` as fallback.
    pub fn from_config(config: &NotifyConfig, alert: Box<dyn Alert>) -> Result<Self> {
        let sound: Option<Box<dyn AudioCue>> = match config.sound()? {
            SoundSetting::None => None,
            SoundSetting::Bell => Some(Box::new(TerminalBell)),
            SoundSetting::Command(argv) => Some(Box::new(CommandCue::new(argv)?)),
        };
        let system = CommandNotifications::new(config.system_command(), config.system_enabled());
        Ok(Self::new(sound, Box::new(system), alert))
    }

    pub fn notify(&mut self, title: &str) -> Delivery {
        let sound = self.play_sound();

        let system = if !self.system.is_supported() {
            Outcome::Skipped
        } else if self.system.permission() != Permission::Granted {
            debug!("desktop notifications not permitted");
            Outcome::Skipped
        } else {
            match self.system.show(NOTIFICATION_TITLE, &notification_body(title)) {
                Ok(()) => Outcome::Delivered,
                Err(e) => {
                    warn!("desktop notification failed: {e:#}");
                    Outcome::Failed(format!("{e:#}"))
                }
            }
        };

        let alert = if system.delivered() {
            Outcome::Skipped
        } else {
            match self.alert.alert(&alert_message(title)) {
                Ok(()) => Outcome::Delivered,
                Err(e) => {
                    warn!("fallback alert failed: {e:#}");
                    Outcome::Failed(format!("{e:#}"))
                }
            }
        };

        Delivery {
            sound,
            system,
            alert,
        }
    }

    fn play_sound(&mut self) -> Outcome {
        let Some(cue) = self.sound.as_mut() else {
            return Outcome::Skipped;
        };
        if let Err(e) = cue.rewind() {
            debug!("could not rewind sound cue: {e:#}");
        }
        match cue.play() {
            Ok(()) => Outcome::Delivered,
            Err(e) => {
                warn!("sound cue blocked: {e:#}");
                Outcome::Failed(format!("{e:#}"))
            }
        }
    }
}

/// Rings the terminal bell on stderr.
pub struct TerminalBell;

impl AudioCue for TerminalBell {
    fn rewind(&mut self) -> Result<()> {
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        let mut err = io::stderr();
        err.write_all(b"\x07")?;
        err.flush()?;
        Ok(())
    }
}

/// Plays a sound by spawning an external player, e.g. `paplay ding.oga`.
pub struct CommandCue {
    argv: Vec<String>,
    child: Option<Child>,
}

impl CommandCue {
    pub fn new(argv: Vec<String>) -> Result<Self> {
        if argv.is_empty() {
            bail!("sound command must not be empty");
        }
        Ok(Self { argv, child: None })
    }
}

impl AudioCue for CommandCue {
    fn rewind(&mut self) -> Result<()> {
        if let Some(mut child) = self.child.take() {
            if child.try_wait()?.is_none() {
                child.kill().context("failed to stop previous sound")?;
            }
            child.wait()?;
        }
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        let child = Command::new(&self.argv[0])
            .args(&self.argv[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("failed to run sound command '{}'", self.argv[0]))?;
        self.child = Some(child);
        Ok(())
    }
}

impl Drop for CommandCue {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.wait();
        }
    }
}

/// Desktop notifications through a `notify-send`-style command taking
/// `<title> <body>`. Permission comes from configuration.
pub struct CommandNotifications {
    program: String,
    enabled: bool,
    permission: Permission,
}

impl CommandNotifications {
    pub fn new(program: impl Into<String>, enabled: bool) -> Self {
        Self {
            program: program.into(),
            enabled,
            permission: Permission::Default,
        }
    }
}

impl SystemNotifications for CommandNotifications {
    fn is_supported(&self) -> bool {
        find_program(&self.program)
    }

    fn request_permission(&mut self) -> Permission {
        self.permission = if self.enabled {
            Permission::Granted
        } else {
            Permission::Denied
        };
        self.permission
    }

    fn permission(&self) -> Permission {
        self.permission
    }

    fn show(&mut self, title: &str, body: &str) -> Result<()> {
        let status = Command::new(&self.program)
            .arg(title)
            .arg(body)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .with_context(|| format!("failed to run '{}'", self.program))?;
        if !status.success() {
            bail!("'{}' exited with status {status}", self.program);
        }
        Ok(())
    }
}

/// True if `program` is a path to a file or names one on `$PATH`.
fn find_program(program: &str) -> bool {
    if program.is_empty() {
        return false;
    }
    if program.contains('/') {
        return Path::new(program).is_file();
    }
    env::var_os("PATH")
        .map(|paths| env::split_paths(&paths).any(|dir| dir.join(program).is_file()))
        .unwrap_or(false)
}

/// Prints the alert on stdout; used by the headless commands.
pub struct PrintAlert;

impl Alert for PrintAlert {
    fn alert(&mut self, message: &str) -> Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "{message}")?;
        out.flush()?;
        Ok(())
    }
}

/// Hands alerts to an event loop that displays them, e.g. as a TUI modal.
pub struct ChannelAlert(pub Sender<String>);

impl Alert for ChannelAlert {
    fn alert(&mut self, message: &str) -> Result<()> {
        self.0
            .send(message.to_string())
            .context("alert receiver is gone")
    }
}
