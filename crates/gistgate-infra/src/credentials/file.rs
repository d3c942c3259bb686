//! TOML file credential store.
//!
//! Layout of `credentials.toml`:
//!
//! ```toml
//! [openai]
//! api_key = "sk-..."
//! extra_keys = ["sk-...", "sk-..."]
//! ```
//!
//! The file is read on every lookup so hand edits apply to the next request.
//! Writes replace the file atomically (temp file + rename) and are restricted
//! to the owner on Unix.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use gistgate_core::credentials::CredentialStore;
use gistgate_types::error::CredentialStoreError;
use gistgate_types::llm::ProviderId;

pub struct FileCredentialStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<toml::Table, CredentialStoreError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(toml::Table::new()),
            Err(e) => {
                return Err(CredentialStoreError::Io(format!(
                    "{}: {e}",
                    self.path.display()
                )));
            }
        };
        content
            .parse::<toml::Table>()
            .map_err(|e| CredentialStoreError::Parse(format!("{}: {e}", self.path.display())))
    }

    fn save(&self, table: &toml::Table) -> Result<(), CredentialStoreError> {
        let io_err = |e: std::io::Error| CredentialStoreError::Io(format!("{}: {e}", self.path.display()));
        let content = toml::to_string(table)
            .map_err(|e| CredentialStoreError::Parse(format!("failed to encode credentials: {e}")))?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let tmp = self.path.with_extension("toml.tmp");
        {
            let mut file = std::fs::File::create(&tmp).map_err(io_err)?;
            restrict_permissions(&file).map_err(io_err)?;
            file.write_all(content.as_bytes()).map_err(io_err)?;
            file.sync_all().map_err(io_err)?;
        }
        std::fs::rename(&tmp, &self.path).map_err(io_err)
    }

    /// Load, apply `edit` to the provider's table, and write back.
    fn update(
        &self,
        provider: ProviderId,
        edit: impl FnOnce(&mut toml::Table),
    ) -> Result<(), CredentialStoreError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| CredentialStoreError::Io("credential file lock poisoned".to_string()))?;
        let mut table = self.load()?;
        let section = table
            .entry(provider.as_str())
            .or_insert_with(|| toml::Value::Table(toml::Table::new()));
        let toml::Value::Table(section) = section else {
            return Err(CredentialStoreError::Parse(format!(
                "[{provider}] is not a table"
            )));
        };
        edit(section);
        self.save(&table)
    }

    fn lookup(
        &self,
        provider: ProviderId,
        name: &str,
    ) -> Result<Option<toml::Value>, CredentialStoreError> {
        let mut table = self.load()?;
        Ok(match table.remove(provider.as_str()) {
            Some(toml::Value::Table(mut section)) => section.remove(name),
            _ => None,
        })
    }
}

impl CredentialStore for FileCredentialStore {
    fn name(&self) -> &str {
        "file"
    }

    fn get_string(
        &self,
        provider: ProviderId,
        name: &str,
    ) -> Result<Option<String>, CredentialStoreError> {
        match self.lookup(provider, name)? {
            None => Ok(None),
            Some(toml::Value::String(value)) => Ok(Some(value)),
            Some(other) => Err(CredentialStoreError::Parse(format!(
                "{provider}.{name} should be a string, found {}",
                other.type_str()
            ))),
        }
    }

    fn get_list(
        &self,
        provider: ProviderId,
        name: &str,
    ) -> Result<Vec<String>, CredentialStoreError> {
        match self.lookup(provider, name)? {
            None => Ok(Vec::new()),
            Some(toml::Value::Array(values)) => Ok(values
                .into_iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()),
            // A single string is accepted as a one-element list.
            Some(toml::Value::String(value)) => Ok(vec![value]),
            Some(other) => Err(CredentialStoreError::Parse(format!(
                "{provider}.{name} should be a list, found {}",
                other.type_str()
            ))),
        }
    }

    fn set_string(
        &self,
        provider: ProviderId,
        name: &str,
        value: &str,
    ) -> Result<(), CredentialStoreError> {
        self.update(provider, |section| {
            if value.is_empty() {
                section.remove(name);
            } else {
                section.insert(name.to_string(), toml::Value::String(value.to_string()));
            }
        })
    }

    fn set_list(
        &self,
        provider: ProviderId,
        name: &str,
        values: &[String],
    ) -> Result<(), CredentialStoreError> {
        self.update(provider, |section| {
            if values.is_empty() {
                section.remove(name);
            } else {
                let array = values.iter().cloned().map(toml::Value::String).collect();
                section.insert(name.to_string(), toml::Value::Array(array));
            }
        })
    }
}

#[cfg(unix)]
fn restrict_permissions(file: &std::fs::File) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_file: &std::fs::File) -> std::io::Result<()> {
    Ok(())
}
