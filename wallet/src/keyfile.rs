//! Keyfiles: a JSON array of the 64 `secret ‖ public` bytes, the layout
//! ledger CLIs already use, so existing keyfiles load unchanged.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;

use umbra_protocol::crypto::Keypair;

pub fn read_keypair(path: &Path) -> Result<Keypair> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read keyfile {}", path.display()))?;
    let bytes: Vec<u8> = serde_json::from_str(&text)
        .with_context(|| format!("keyfile {} is not a JSON byte array", path.display()))?;
    Keypair::from_keypair_bytes(&bytes)
        .with_context(|| format!("keyfile {} does not hold a valid keypair", path.display()))
}

/// Write `keypair` to `path`, owner-readable only on Unix. Refuses to
/// overwrite unless `force` is set.
pub fn write_keypair(path: &Path, keypair: &Keypair, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to replace it)", path.display());
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    let json = serde_json::to_string(&keypair.to_keypair_bytes().to_vec())?;
    fs::write(path, json).with_context(|| format!("failed to write keyfile {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}
