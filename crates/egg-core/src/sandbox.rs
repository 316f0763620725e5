//! Per-language sandbox image planning.
//!
//! For every distinct language a manifest references, the planner writes a
//! small on-disk image descriptor: a microVM boot descriptor on Linux, a
//! container descriptor elsewhere. The descriptor contract is the product;
//! actually booting the image is left to the optional launch hook and is not
//! part of the trust core.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde_json::json;
use tracing::info;

use crate::errors::{EggError, EggResult};
use crate::manifest::Manifest;

/// Size of the placeholder root filesystem image.
const ROOTFS_SIZE: usize = 1024 * 1024;

/// Planned sandbox images, in first-seen language order.
#[derive(Debug)]
pub struct SandboxPlan {
    images: Vec<(String, PathBuf)>,
    created: Vec<PathBuf>,
}

impl SandboxPlan {
    /// Language → image directory pairs in first-seen order.
    pub fn images(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.images
            .iter()
            .map(|(lang, dir)| (lang.as_str(), dir.as_path()))
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Image directory for `language` (case-insensitive).
    pub fn image_dir(&self, language: &str) -> Option<&Path> {
        let language = language.to_lowercase();
        self.images
            .iter()
            .find(|(lang, _)| *lang == language)
            .map(|(_, dir)| dir.as_path())
    }

    /// Remove the image directories this planner created.
    ///
    /// Directories that already existed before planning are left in place.
    pub fn release(self) -> EggResult<()> {
        for dir in &self.created {
            if dir.exists() {
                fs::remove_dir_all(dir).map_err(|e| EggError::io(dir, e))?;
            }
        }
        Ok(())
    }
}

/// Write image descriptors for every language in `manifest` under `base_dir`.
pub fn prepare_images(manifest: &Manifest, base_dir: &Path) -> EggResult<SandboxPlan> {
    let mut plan = SandboxPlan {
        images: Vec::new(),
        created: Vec::new(),
    };

    for cell in &manifest.cells {
        let language = cell.language.to_lowercase();
        if plan.image_dir(&language).is_some() {
            continue;
        }

        let image_dir = base_dir.join(format!("{language}-image"));
        let existed = image_dir.is_dir();
        fs::create_dir_all(&image_dir).map_err(|e| EggError::io(&image_dir, e))?;
        if !existed {
            plan.created.push(image_dir.clone());
        }

        write_descriptor(&language, &image_dir)?;
        info!(language = %language, dir = %image_dir.display(), "prepared sandbox image");
        plan.images.push((language, image_dir));
    }

    Ok(plan)
}

fn write_descriptor(language: &str, dir: &Path) -> EggResult<()> {
    match std::env::consts::OS {
        "linux" => write_microvm_descriptor(language, dir),
        "macos" | "windows" => write_container_descriptor(language, dir),
        other => Err(EggError::Platform {
            os: other.to_string(),
        }),
    }
}

fn write_microvm_descriptor(language: &str, dir: &Path) -> EggResult<()> {
    let kernel = dir.join("kernel.bin");
    let rootfs = dir.join("rootfs.ext4");
    fs::write(&kernel, []).map_err(|e| EggError::io(&kernel, e))?;
    fs::write(&rootfs, vec![0_u8; ROOTFS_SIZE]).map_err(|e| EggError::io(&rootfs, e))?;

    let descriptor = json!({
        "language": language,
        "boot-source": {
            "kernel_image_path": kernel.display().to_string(),
            "boot_args": "console=ttyS0 reboot=k panic=1 pci=off",
        },
        "drives": [{
            "drive_id": "rootfs",
            "path_on_host": rootfs.display().to_string(),
            "is_root_device": true,
            "is_read_only": false,
        }],
    });
    write_json(&dir.join("microvm.json"), &descriptor)?;

    let conf = format!(
        "# microvm image for {language} cells\n\
         language={language}\n\
         kernel={}\n\
         rootfs={}\n",
        kernel.display(),
        rootfs.display()
    );
    let conf_path = dir.join("microvm.conf");
    fs::write(&conf_path, conf).map_err(|e| EggError::io(&conf_path, e))
}

fn write_container_descriptor(language: &str, dir: &Path) -> EggResult<()> {
    let descriptor = json!({
        "language": language,
        "runtime": "container",
    });
    write_json(&dir.join("container.json"), &descriptor)?;

    let conf = format!(
        "# container image for {language} cells\n\
         language={language}\n\
         runtime=container\n"
    );
    let conf_path = dir.join("container.conf");
    fs::write(&conf_path, conf).map_err(|e| EggError::io(&conf_path, e))
}

fn write_json(path: &Path, value: &serde_json::Value) -> EggResult<()> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|e| EggError::Io {
        path: path.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
    })?;
    fs::write(path, bytes).map_err(|e| EggError::io(path, e))
}

/// Launch hook: boot the image for `language` with the platform runtime.
///
/// Thin collaborator over `firecracker`; the descriptor file is the contract.
pub fn launch_image(plan: &SandboxPlan, language: &str) -> EggResult<()> {
    let dir = plan
        .image_dir(language)
        .ok_or_else(|| EggError::UnsupportedLanguage {
            language: language.to_string(),
        })?;

    if std::env::consts::OS != "linux" {
        return Err(EggError::Platform {
            os: std::env::consts::OS.to_string(),
        });
    }

    let descriptor = dir.join("microvm.json");
    if which::which("firecracker").is_err() {
        return Err(EggError::RuntimeMissing {
            binary: "firecracker".into(),
            language: language.to_string(),
        });
    }

    let status = Command::new("firecracker")
        .arg("--no-api")
        .arg("--config-file")
        .arg(&descriptor)
        .status()
        .map_err(|e| EggError::io(&descriptor, e))?;
    if !status.success() {
        return Err(EggError::io(
            &descriptor,
            std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("firecracker exited with {status}"),
            ),
        ));
    }
    Ok(())
}
