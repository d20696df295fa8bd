use crate::error::RegistryError;
use meshroom_core::{
    FileId, FileStatus, LocalFile, MemberId, SharedFile, SharedWithMeFile,
};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Metadata carried by an offer announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfferMetadata {
    pub name: String,
    pub size: u64,
}

/// Files we offer and files offered to us.
pub struct SharedFileRegistry {
    local_id: MemberId,
    local: HashMap<FileId, SharedFile>,
    shared_with_me: HashMap<FileId, SharedWithMeFile>,
}

impl SharedFileRegistry {
    pub fn new(local_id: MemberId) -> Self {
        Self {
            local_id,
            local: HashMap::new(),
            shared_with_me: HashMap::new(),
        }
    }

    /// Stores a local offer under a fresh id.
    pub fn offer(&mut self, file: LocalFile) -> FileId {
        let id = FileId::new();
        let size = file.size();
        self.local.insert(
            id.clone(),
            SharedFile {
                id: id.clone(),
                name: file.name,
                size,
                data: file.data,
                owner: self.local_id.clone(),
                downloaded_by: HashSet::new(),
            },
        );
        id
    }

    pub fn revoke(&mut self, id: &FileId) -> Option<SharedFile> {
        self.local.remove(id)
    }

    /// Inserts or refreshes a remote offer. An existing entry keeps its status.
    pub fn record_offer(
        &mut self,
        id: FileId,
        metadata: OfferMetadata,
        owner: MemberId,
    ) -> &SharedWithMeFile {
        let entry = self
            .shared_with_me
            .entry(id.clone())
            .or_insert_with(|| SharedWithMeFile {
                id,
                name: String::new(),
                size: 0,
                owner: owner.clone(),
                status: FileStatus::ToDownload,
            });
        entry.name = metadata.name;
        entry.size = metadata.size;
        entry.owner = owner;
        entry
    }

    /// Revoking an id we never saw is a no-op.
    pub fn record_revocation(&mut self, id: &FileId) -> Option<SharedWithMeFile> {
        let removed = self.shared_with_me.remove(id);
        if removed.is_none() {
            debug!("Revocation for unknown file {}", id);
        }
        removed
    }

    pub fn begin_download(&mut self, id: &FileId) -> Result<(), RegistryError> {
        self.advance(id, FileStatus::ToDownload, FileStatus::Downloading)
    }

    /// Finishes a download we made, and records `by` on our own offer when
    /// the id is one of ours.
    pub fn complete_download(&mut self, id: &FileId, by: &MemberId) -> Result<(), RegistryError> {
        let mut matched = false;

        if self.shared_with_me.contains_key(id) {
            self.advance(id, FileStatus::Downloading, FileStatus::Downloaded)?;
            matched = true;
        }
        if let Some(file) = self.local.get_mut(id) {
            file.downloaded_by.insert(by.clone());
            matched = true;
        }

        if matched {
            Ok(())
        } else {
            Err(RegistryError::UnknownFile(id.clone()))
        }
    }

    fn advance(&mut self, id: &FileId, from: FileStatus, to: FileStatus) -> Result<(), RegistryError> {
        let entry = self
            .shared_with_me
            .get_mut(id)
            .ok_or_else(|| RegistryError::UnknownFile(id.clone()))?;

        if entry.status != from {
            return Err(RegistryError::InvalidTransition {
                id: id.clone(),
                from: entry.status,
                to,
            });
        }
        entry.status = to;
        Ok(())
    }

    /// Drops every remote offer owned by `owner`.
    pub fn forget_member(&mut self, owner: &MemberId) -> Vec<FileId> {
        let ids: Vec<FileId> = self
            .shared_with_me
            .values()
            .filter(|f| &f.owner == owner)
            .map(|f| f.id.clone())
            .collect();
        for id in &ids {
            self.shared_with_me.remove(id);
        }
        ids
    }

    pub fn clear_remote(&mut self) {
        self.shared_with_me.clear();
    }

    pub fn local_offer(&self, id: &FileId) -> Option<&SharedFile> {
        self.local.get(id)
    }

    pub fn shared_with_me(&self, id: &FileId) -> Option<&SharedWithMeFile> {
        self.shared_with_me.get(id)
    }

    /// Snapshot of our offers; later mutations are not reflected.
    pub fn list_local_offers(&self) -> Vec<SharedFile> {
        let mut files: Vec<_> = self.local.values().cloned().collect();
        files.sort_by(|a, b| a.id.cmp(&b.id));
        files
    }

    pub fn list_shared_with_me(&self) -> Vec<SharedWithMeFile> {
        let mut files: Vec<_> = self.shared_with_me.values().cloned().collect();
        files.sort_by(|a, b| a.id.cmp(&b.id));
        files
    }
}
