use std::{
    fs::{self, File},
    io::{self, Read, Write},
    path::{Path, PathBuf},
    sync::Mutex,
};

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use strongbox_core::{
    provider::record::{self, ItemRecord},
    AttributeSet, QueryResult, SecureStoreProvider, Status,
};
use tempfile::NamedTempFile;
use tracing::{instrument, warn};

use crate::key_provider::KeyProvider;

const ITEM_EXTENSION: &str = "item";

/// AES-GCM encrypted, file-backed secure store provider.
///
/// Each item lives in its own file under `root`; the master key is held by a
/// [`KeyProvider`] (OS keyring in production). Nothing is written in
/// plaintext. Meant to be driven through a gateway, which serializes calls.
///
/// Files that cannot be decrypted with the current key (corrupt, or written
/// under a replaced master key) are logged and left out of every query, so
/// they never block the readable items around them.
pub struct EncryptedFileProvider<K: KeyProvider> {
    root: PathBuf,
    key_provider: K,
    cipher: Mutex<Option<Aes256Gcm>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredBlob {
    nonce: String,
    ciphertext: String,
}

/// A decrypted item and the file it came from.
struct StoredItem {
    path: PathBuf,
    record: ItemRecord,
}

impl<K: KeyProvider> EncryptedFileProvider<K> {
    pub fn new(root: impl Into<PathBuf>, key_provider: K) -> Self {
        Self {
            root: root.into(),
            key_provider,
            cipher: Mutex::new(None),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn cipher(&self) -> Result<Aes256Gcm, Status> {
        let mut cached = self.cipher.lock().map_err(|err| {
            warn!("cipher cache lock poisoned: {err}");
            Status::INTERNAL_COMPONENT
        })?;
        if let Some(cipher) = cached.as_ref() {
            return Ok(cipher.clone());
        }

        let material = self.key_provider.get_or_create().map_err(|e| {
            warn!("key provider failed: {e}");
            Status::INTERACTION_NOT_ALLOWED
        })?;
        let cipher = Aes256Gcm::new_from_slice(&material.bytes).map_err(|e| {
            warn!("cipher init failed: {e}");
            Status::INTERNAL_COMPONENT
        })?;
        *cached = Some(cipher.clone());
        Ok(cipher)
    }

    fn load(&self) -> Result<Vec<StoredItem>, Status> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(io_status(err)),
        };

        let cipher = self.cipher()?;
        let mut items = Vec::new();
        for entry in entries {
            let path = entry.map_err(io_status)?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(ITEM_EXTENSION) {
                continue;
            }
            match read_record(&cipher, &path) {
                Ok(record) => items.push(StoredItem { path, record }),
                Err(status) if status == Status::DECODE => {
                    warn!(?path, "skipping unreadable item");
                }
                // Removed by someone else between listing and reading.
                Err(_) if !path.exists() => {}
                Err(status) => return Err(status),
            }
        }
        Ok(items)
    }

    fn write(&self, path: &Path, record: &ItemRecord) -> Result<(), Status> {
        let blob = self.seal(record)?;
        write_blob(path, &blob)
    }

    fn seal(&self, record: &ItemRecord) -> Result<StoredBlob, Status> {
        let cipher = self.cipher()?;
        let plaintext = serde_json::to_vec(record).map_err(|e| {
            warn!("item encode failed: {e}");
            Status::INTERNAL_COMPONENT
        })?;
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher.encrypt(&nonce, plaintext.as_ref()).map_err(|e| {
            warn!("encrypt failed: {e}");
            Status::INTERNAL_COMPONENT
        })?;

        Ok(StoredBlob {
            nonce: URL_SAFE_NO_PAD.encode(nonce.as_slice()),
            ciphertext: URL_SAFE_NO_PAD.encode(ciphertext),
        })
    }

    fn new_item_path(&self) -> PathBuf {
        let mut name = [0u8; 16];
        rand::rngs::OsRng.fill_bytes(&mut name);
        self.root
            .join(format!("{}.{ITEM_EXTENSION}", URL_SAFE_NO_PAD.encode(name)))
    }
}

impl<K: KeyProvider> SecureStoreProvider for EncryptedFileProvider<K> {
    #[instrument(skip_all)]
    fn add(&self, attributes: &AttributeSet) -> Result<(), Status> {
        let record = ItemRecord::from_attributes(attributes)?;
        let items = self.load()?;
        if items.iter().any(|item| item.record.same_identity(&record)) {
            return Err(Status::DUPLICATE_ITEM);
        }
        self.write(&self.new_item_path(), &record)
    }

    #[instrument(skip_all)]
    fn update(&self, query: &AttributeSet, changes: &AttributeSet) -> Result<(), Status> {
        let mut items = self.load()?;
        let mut touched = Vec::new();
        for (index, item) in items.iter_mut().enumerate() {
            if item.record.matches(query) {
                item.record.apply(changes)?;
                touched.push(index);
            }
        }
        if touched.is_empty() {
            return Err(Status::ITEM_NOT_FOUND);
        }

        let records: Vec<ItemRecord> = items.iter().map(|item| item.record.clone()).collect();
        record::ensure_unique(&records)?;

        // Seal everything before the first write so an encode failure
        // leaves every file untouched. Each file is replaced atomically, but
        // an I/O error partway through can still leave a multi-item update
        // partially applied.
        let sealed = touched
            .into_iter()
            .map(|index| {
                let item = &items[index];
                self.seal(&item.record).map(|blob| (&item.path, blob))
            })
            .collect::<Result<Vec<_>, Status>>()?;
        for (path, blob) in sealed {
            write_blob(path, &blob)?;
        }
        Ok(())
    }

    #[instrument(skip_all)]
    fn delete(&self, query: &AttributeSet) -> Result<(), Status> {
        let mut removed = false;
        for item in self.load()? {
            if !item.record.matches(query) {
                continue;
            }
            match fs::remove_file(&item.path) {
                Ok(()) => removed = true,
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => return Err(io_status(err)),
            }
        }
        if !removed {
            return Err(Status::ITEM_NOT_FOUND);
        }
        Ok(())
    }

    #[instrument(skip_all)]
    fn copy_matching(&self, query: &AttributeSet) -> Result<QueryResult, Status> {
        let items = self.load()?;
        record::resolve(
            items
                .iter()
                .map(|item| &item.record)
                .filter(|record| record.matches(query)),
            query,
        )
    }
}

fn read_record(cipher: &Aes256Gcm, path: &Path) -> Result<ItemRecord, Status> {
    let blob = read_blob(path)?;
    let nonce_bytes = URL_SAFE_NO_PAD.decode(blob.nonce).map_err(|e| {
        warn!(?path, "nonce decode failed: {e}");
        Status::DECODE
    })?;
    if nonce_bytes.len() != 12 {
        warn!(?path, "unexpected nonce length {}", nonce_bytes.len());
        return Err(Status::DECODE);
    }
    let nonce = Nonce::from_slice(&nonce_bytes);
    let ciphertext = URL_SAFE_NO_PAD.decode(blob.ciphertext).map_err(|e| {
        warn!(?path, "ciphertext decode failed: {e}");
        Status::DECODE
    })?;

    let plaintext = cipher.decrypt(nonce, ciphertext.as_ref()).map_err(|e| {
        warn!(?path, "decrypt failed: {e}");
        Status::DECODE
    })?;
    serde_json::from_slice(&plaintext).map_err(|e| {
        warn!(?path, "item decode failed: {e}");
        Status::DECODE
    })
}

fn write_blob(path: &Path, blob: &StoredBlob) -> Result<(), Status> {
    let parent = path.parent().ok_or(Status::PARAM)?;
    fs::create_dir_all(parent).map_err(io_status)?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(io_status)?;
    let json = serde_json::to_vec(blob).map_err(|e| {
        warn!("blob encode failed: {e}");
        Status::INTERNAL_COMPONENT
    })?;
    tmp.write_all(&json).map_err(io_status)?;
    tmp.flush().map_err(io_status)?;
    tmp.persist(path).map_err(|e| io_status(e.error))?;
    Ok(())
}

fn read_blob(path: &Path) -> Result<StoredBlob, Status> {
    let mut file = File::open(path).map_err(io_status)?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf).map_err(io_status)?;
    serde_json::from_slice(&buf).map_err(|e| {
        warn!(?path, "blob decode failed: {e}");
        Status::DECODE
    })
}

fn io_status(err: io::Error) -> Status {
    warn!("secure store io failure: {err}");
    Status::IO
}
