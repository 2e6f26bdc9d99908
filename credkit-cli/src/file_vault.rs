//! Encrypted file-backed vault for the developer CLI.
//!
//! Items live in `vault.json` next to a random 32-byte `vault.key`, which is
//! only ever readable by its owner. Secrets
//! are sealed with XChaCha20-Poly1305 using `service || 0x00 || username` as
//! associated data, so a ciphertext cannot be moved to another item. Every
//! mutation rewrites the file through a temporary file and a rename.
//!
//! There is no authenticator on a terminal: access-control gates are stored
//! and honored for non-interactive lookups, and an interactive lookup counts
//! as a passed challenge.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    Key, XChaCha20Poly1305, XNonce,
};
use credkit_core::vault::{Vault, VaultError, VaultItem, VaultQuery};
use credkit_core::AccessControl;
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use zeroize::Zeroizing;

const KEY_FILE: &str = "vault.key";
const ITEMS_FILE: &str = "vault.json";
const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 24;

/// `ioErr`
const IO_ERROR: i32 = -36;
/// `errSecDecode`
const DECODE_ERROR: i32 = -26275;
/// `errSecDuplicateItem`
const DUPLICATE_ITEM: i32 = -25299;

fn io_error(context: &str, err: &std::io::Error) -> VaultError {
    VaultError::native(IO_ERROR, format!("{context}: {err}"))
}

fn decode_error(context: impl Into<String>) -> VaultError {
    VaultError::native(DECODE_ERROR, context)
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct VaultFile {
    items: Vec<FileItem>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileItem {
    service: String,
    username: String,
    /// base64(nonce || ciphertext)
    sealed: String,
    access_control: AccessControl,
}

impl FileItem {
    fn matches(&self, service: &str, username: Option<&str>) -> bool {
        self.service == service && username.is_none_or(|u| self.username == u)
    }
}

/// A [`Vault`] persisted to a directory.
pub struct FileVault {
    dir: PathBuf,
    cipher: XChaCha20Poly1305,
    lock: Mutex<()>,
}

impl std::fmt::Debug for FileVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileVault").field("dir", &self.dir).finish_non_exhaustive()
    }
}

fn associated_data(service: &str, username: &str) -> Vec<u8> {
    let mut ad = Vec::with_capacity(service.len() + username.len() + 1);
    ad.extend_from_slice(service.as_bytes());
    ad.push(0);
    ad.extend_from_slice(username.as_bytes());
    ad
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), VaultError> {
    let mut tmp = temp_file_beside(path)?;
    tmp.write_all(bytes)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| io_error("write temp file", &e))?;
    tmp.persist(path)
        .map_err(|e| io_error("replace vault file", &e.error))?;
    Ok(())
}

fn temp_file_beside(path: &Path) -> Result<NamedTempFile, VaultError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    NamedTempFile::new_in(dir).map_err(|e| io_error("create temp file", &e))
}

#[cfg(unix)]
fn restrict_permissions(file: &fs::File) -> Result<(), VaultError> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(0o600))
        .map_err(|e| io_error("restrict key file permissions", &e))
}

#[cfg(not(unix))]
fn restrict_permissions(_file: &fs::File) -> Result<(), VaultError> {
    Ok(())
}

/// Creates the key file unless another process got there first, in which
/// case the existing key wins.
fn create_key(path: &Path) -> Result<Zeroizing<Vec<u8>>, VaultError> {
    let mut key = Zeroizing::new(vec![0u8; KEY_LEN]);
    OsRng.fill_bytes(&mut key);

    let mut tmp = temp_file_beside(path)?;
    restrict_permissions(tmp.as_file())?;
    tmp.write_all(&key)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| io_error("write key file", &e))?;
    match tmp.persist_noclobber(path) {
        Ok(_) => {
            tracing::info!(path = %path.display(), "created vault key");
            Ok(key)
        }
        Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => read_key(path),
        Err(e) => Err(io_error("persist key file", &e.error)),
    }
}

fn read_key(path: &Path) -> Result<Zeroizing<Vec<u8>>, VaultError> {
    fs::read(path)
        .map(Zeroizing::new)
        .map_err(|e| io_error("read key file", &e))
}

impl FileVault {
    /// Opens the vault in `dir`, creating the directory and key if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or key file cannot be created or
    /// the key file is corrupt.
    pub fn open(dir: &Path) -> Result<Self, VaultError> {
        fs::create_dir_all(dir).map_err(|e| io_error("create vault directory", &e))?;

        let key_path = dir.join(KEY_FILE);
        let key = if key_path.exists() {
            read_key(&key_path)?
        } else {
            create_key(&key_path)?
        };
        if key.len() != KEY_LEN {
            return Err(decode_error(format!(
                "key file holds {} bytes, expected {KEY_LEN}",
                key.len()
            )));
        }

        Ok(Self {
            dir: dir.to_path_buf(),
            cipher: XChaCha20Poly1305::new(Key::from_slice(&key)),
            lock: Mutex::new(()),
        })
    }

    fn items_path(&self) -> PathBuf {
        self.dir.join(ITEMS_FILE)
    }

    fn load(&self) -> Result<VaultFile, VaultError> {
        let path = self.items_path();
        if !path.exists() {
            return Ok(VaultFile::default());
        }
        let bytes = fs::read(&path).map_err(|e| io_error("read vault file", &e))?;
        serde_json::from_slice(&bytes).map_err(|e| decode_error(format!("vault file: {e}")))
    }

    fn save(&self, file: &VaultFile) -> Result<(), VaultError> {
        let bytes = serde_json::to_vec_pretty(file)
            .map_err(|e| decode_error(format!("encode vault file: {e}")))?;
        write_atomic(&self.items_path(), &bytes)
    }

    fn seal(&self, service: &str, username: &str, secret: &[u8]) -> Result<String, VaultError> {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        let aad = associated_data(service, username);
        let ciphertext = self
            .cipher
            .encrypt(
                XNonce::from_slice(&nonce),
                Payload {
                    msg: secret,
                    aad: &aad,
                },
            )
            .map_err(|e| decode_error(format!("seal secret: {e}")))?;
        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(out))
    }

    fn open_sealed(&self, item: &FileItem) -> Result<Vec<u8>, VaultError> {
        let bytes = STANDARD
            .decode(&item.sealed)
            .map_err(|e| decode_error(format!("sealed secret: {e}")))?;
        if bytes.len() < NONCE_LEN {
            return Err(decode_error("sealed secret too short"));
        }
        let (nonce, ciphertext) = bytes.split_at(NONCE_LEN);
        let aad = associated_data(&item.service, &item.username);
        self.cipher
            .decrypt(
                XNonce::from_slice(nonce),
                Payload {
                    msg: ciphertext,
                    aad: &aad,
                },
            )
            .map_err(|_| decode_error(format!("cannot decrypt {}/{}", item.service, item.username)))
    }

    fn guard(&self) -> Result<std::sync::MutexGuard<'_, ()>, VaultError> {
        self.lock
            .lock()
            .map_err(|e| VaultError::native(IO_ERROR, format!("vault lock poisoned: {e}")))
    }
}

impl Vault for FileVault {
    fn query(&self, query: VaultQuery) -> Result<Vec<VaultItem>, VaultError> {
        let _guard = self.guard()?;
        let file = self.load()?;

        let matches: Vec<&FileItem> = file
            .items
            .iter()
            .filter(|item| item.matches(&query.service, query.username.as_deref()))
            .collect();
        if matches.is_empty() {
            return Err(VaultError::ItemNotFound);
        }
        if query.return_secret
            && !query.allow_interaction
            && matches.iter().any(|item| item.access_control.requires_challenge())
        {
            return Err(VaultError::InteractionNotAllowed);
        }

        matches
            .into_iter()
            .map(|item| {
                let secret = if query.return_secret {
                    Some(self.open_sealed(item)?)
                } else {
                    None
                };
                Ok(VaultItem {
                    service: item.service.clone(),
                    username: item.username.clone(),
                    secret,
                    access_control: Some(item.access_control),
                })
            })
            .collect()
    }

    fn add(
        &self,
        service: String,
        username: String,
        secret: Vec<u8>,
        access_control: AccessControl,
    ) -> Result<(), VaultError> {
        let _guard = self.guard()?;
        let mut file = self.load()?;
        if file.items.iter().any(|item| item.matches(&service, Some(&username))) {
            return Err(VaultError::native(
                DUPLICATE_ITEM,
                "The specified item already exists in the vault.",
            ));
        }
        let sealed = self.seal(&service, &username, &secret)?;
        file.items.push(FileItem {
            service,
            username,
            sealed,
            access_control,
        });
        self.save(&file)
    }

    fn update(
        &self,
        service: String,
        username: String,
        secret: Vec<u8>,
        access_control: AccessControl,
    ) -> Result<(), VaultError> {
        let _guard = self.guard()?;
        let mut file = self.load()?;
        let sealed = self.seal(&service, &username, &secret)?;
        let item = file
            .items
            .iter_mut()
            .find(|item| item.matches(&service, Some(&username)))
            .ok_or(VaultError::ItemNotFound)?;
        item.sealed = sealed;
        item.access_control = access_control;
        self.save(&file)
    }

    fn delete(&self, service: String, username: Option<String>) -> Result<(), VaultError> {
        let _guard = self.guard()?;
        let mut file = self.load()?;
        let before = file.items.len();
        file.items
            .retain(|item| !item.matches(&service, username.as_deref()));
        if file.items.len() == before {
            return Err(VaultError::ItemNotFound);
        }
        self.save(&file)
    }
}
