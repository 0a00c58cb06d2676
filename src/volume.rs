// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Encrypted Volume Management
//!
//! Registration stores the transport's key material on a LUKS volume, which
//! has to be unlocked (opened and mounted) first and locked again before the
//! process exits.
//!
//! [`LuksVolume`] drives `cryptsetup` and `mount`; [`NoopVolume`] stands in
//! when the volume is managed outside the gateway (test mode).

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use tracing::{info, warn};

/// Device-mapper name used for the opened volume.
pub const MAPPING_NAME: &str = "messaging-gateway";

#[derive(Debug, thiserror::Error)]
pub enum VolumeError {
    #[error("failed to run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} exited with {status}: {stderr}")]
    Command {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("invalid volume name: {0}")]
    InvalidName(String),
}

/// Unlocks and locks the encrypted volume holding the gateway's storage.
pub trait VolumeManager: Send + Sync {
    /// Open `volume` with `password` and mount it.
    ///
    /// With `dispose`, the password's key slot is removed after use.
    fn unlock(&self, volume: &str, password: &str, dispose: bool) -> Result<(), VolumeError>;

    /// Unmount and close the volume.
    fn lock(&self) -> Result<(), VolumeError>;

    /// Whether unlocking needs the volume password.
    fn needs_password(&self) -> bool {
        true
    }
}

/// LUKS volume manager backed by `cryptsetup` and `mount`.
#[derive(Debug, Clone)]
pub struct LuksVolume {
    device_dir: PathBuf,
    mount_point: PathBuf,
}

impl LuksVolume {
    pub fn new(device_dir: impl Into<PathBuf>, mount_point: impl Into<PathBuf>) -> Self {
        Self {
            device_dir: device_dir.into(),
            mount_point: mount_point.into(),
        }
    }

    fn device(&self, volume: &str) -> Result<PathBuf, VolumeError> {
        if volume.is_empty() || volume.contains('/') || volume == "." || volume == ".." {
            return Err(VolumeError::InvalidName(volume.to_string()));
        }
        Ok(self.device_dir.join(volume))
    }

    fn mapper(&self) -> PathBuf {
        PathBuf::from("/dev/mapper").join(MAPPING_NAME)
    }
}

impl VolumeManager for LuksVolume {
    fn unlock(&self, volume: &str, password: &str, dispose: bool) -> Result<(), VolumeError> {
        let device = self.device(volume)?;
        let device = device.to_string_lossy();

        run(
            "cryptsetup",
            &["luksOpen", "--key-file=-", &device, MAPPING_NAME],
            Some(password),
        )?;

        let mapper = self.mapper();
        let mount_point = self.mount_point.to_string_lossy();
        if let Err(e) = run("mount", &[&mapper.to_string_lossy(), &mount_point], None) {
            if let Err(close) = run("cryptsetup", &["luksClose", MAPPING_NAME], None) {
                warn!(error = %close, "Failed to close volume after mount failure");
            }
            return Err(e);
        }

        if dispose {
            run(
                "cryptsetup",
                &["luksRemoveKey", "--key-file=-", &device],
                Some(password),
            )?;
            warn!(volume = %volume, "Volume password disposed after use");
        }

        info!(volume = %volume, mount_point = %mount_point, "Encrypted volume unlocked");
        Ok(())
    }

    fn lock(&self) -> Result<(), VolumeError> {
        let mount_point = self.mount_point.to_string_lossy();
        let unmount = run("umount", &[&mount_point], None);
        let close = run("cryptsetup", &["luksClose", MAPPING_NAME], None);

        unmount?;
        close?;
        info!(mount_point = %mount_point, "Encrypted volume locked");
        Ok(())
    }
}

/// Volume manager that leaves the volume alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopVolume;

impl VolumeManager for NoopVolume {
    fn unlock(&self, volume: &str, _password: &str, _dispose: bool) -> Result<(), VolumeError> {
        info!(volume = %volume, "Test mode: skipping volume unlock");
        Ok(())
    }

    fn lock(&self) -> Result<(), VolumeError> {
        info!("Test mode: skipping volume lock");
        Ok(())
    }

    fn needs_password(&self) -> bool {
        false
    }
}

fn run(program: &str, args: &[&str], stdin: Option<&str>) -> Result<(), VolumeError> {
    let command = format!("{program} {}", args.first().copied().unwrap_or_default());
    let spawn_error = |source| VolumeError::Spawn {
        command: command.clone(),
        source,
    };

    let mut child = Command::new(program)
        .args(args)
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(spawn_error)?;

    if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
        pipe.write_all(input.as_bytes()).map_err(spawn_error)?;
    }

    let output = child.wait_with_output().map_err(spawn_error)?;
    if output.status.success() {
        Ok(())
    } else {
        Err(VolumeError::Command {
            command,
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_names_cannot_escape_device_dir() {
        let volume = LuksVolume::new("/dev/lvmvolume", "/mnt/secure");

        assert_eq!(
            volume.device("vault").unwrap(),
            PathBuf::from("/dev/lvmvolume/vault")
        );
        for name in ["", ".", "..", "../sda", "a/b"] {
            assert!(matches!(volume.device(name), Err(VolumeError::InvalidName(_))));
        }
    }

    #[test]
    fn noop_volume_always_succeeds() {
        assert!(NoopVolume.unlock("vault", "secret", true).is_ok());
        assert!(NoopVolume.lock().is_ok());
        assert!(!NoopVolume.needs_password());
        assert!(LuksVolume::new("/dev/lvmvolume", "/mnt/secure").needs_password());
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let result = run("definitely-not-a-real-binary-for-tests", &["x"], None);
        assert!(matches!(result, Err(VolumeError::Spawn { .. })));
    }
}
