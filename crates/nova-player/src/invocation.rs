//! How the external player binary is invoked for each role.
//!
//! The supervisors only know about [`Invocation`]; the production
//! implementation builds VLC command lines, tests substitute shell
//! scripts.

use nova_core::config::{PlayerConfig, RecordingConfig};
use nova_core::error::PlayerError;
use nova_core::platform;
use std::path::{Path, PathBuf};

/// A fully resolved command line, ready to spawn.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
}

pub trait Invocation: Send + Sync {
    /// Command line for playing `url`.
    fn playback(&self, url: &str) -> Result<CommandSpec, PlayerError>;

    /// Command line for transcoding `url` into `dest`.
    fn recording(&self, url: &str, dest: &Path) -> Result<CommandSpec, PlayerError>;
}

/// Invokes VLC in quiet non-interactive mode with relaxed certificate
/// validation, matching the invocation signature the orphan sweeper
/// matches on (`--intf dummy`).
pub struct VlcInvocation {
    player: PlayerConfig,
    bitrate_kbps: u32,
}

impl VlcInvocation {
    pub fn new(player: PlayerConfig, recording: &RecordingConfig) -> Self {
        Self {
            player,
            bitrate_kbps: recording.bitrate_kbps,
        }
    }

    fn binary(&self) -> Result<PathBuf, PlayerError> {
        if let Some(binary) = &self.player.binary {
            return Ok(binary.clone());
        }
        platform::find_player_binary().ok_or(PlayerError::BinaryNotFound)
    }

    fn base_args(&self) -> Vec<String> {
        let mut args: Vec<String> = [
            "--intf",
            "dummy",
            "--quiet",
            "--http-cert-ignore",
            "--gnutls-system-trust",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        args.extend(self.player.extra_args.iter().cloned());
        args
    }
}

impl Invocation for VlcInvocation {
    fn playback(&self, url: &str) -> Result<CommandSpec, PlayerError> {
        let program = self.binary()?;
        let mut args = self.base_args();
        args.push(url.to_string());
        if self.player.no_video {
            args.push("--no-video".to_string());
        }
        Ok(CommandSpec { program, args })
    }

    fn recording(&self, url: &str, dest: &Path) -> Result<CommandSpec, PlayerError> {
        let program = self.binary()?;
        let mut args = self.base_args();
        args.push(url.to_string());
        args.push("--sout".to_string());
        args.push(format!(
            "#transcode{{acodec=mp3,ab={}}}:std{{access=file,mux=raw,dst={}}}",
            self.bitrate_kbps,
            dest.display()
        ));
        // Keep the output sink open across stream reconnects within this
        // single invocation.
        args.push("--sout-keep".to_string());
        Ok(CommandSpec { program, args })
    }
}
