use std::collections::HashMap;

use crate::cue::cue::{EosCue, EosCueList, QlabCue};
use crate::error::RegistryError;

/// Every known cue engine cue, keyed by uid. The registry owns all cues;
/// parents and children refer to each other by uid.
#[derive(Clone, Debug, Default)]
pub struct QlabRegistry {
    cues: HashMap<String, QlabCue>,
    roots: Vec<String>,
}

impl QlabRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a top-level cue (usually a cue list).
    pub fn add_root(&mut self, mut cue: QlabCue) -> Result<(), RegistryError> {
        self.ensure_vacant(cue.uid())?;
        cue.parent = None;
        cue.children.clear();

        self.roots.push(cue.uid().to_string());
        self.cues.insert(cue.uid().to_string(), cue);
        Ok(())
    }

    /// Register `cue` as the last child of `parent_uid` and link both ways.
    pub fn add_child(&mut self, parent_uid: &str, mut cue: QlabCue) -> Result<(), RegistryError> {
        self.ensure_vacant(cue.uid())?;
        let parent = self
            .cues
            .get_mut(parent_uid)
            .ok_or_else(|| RegistryError::NotFound(parent_uid.to_string()))?;

        parent.children.push(cue.uid().to_string());
        cue.parent = Some(parent_uid.to_string());
        cue.children.clear();
        self.cues.insert(cue.uid().to_string(), cue);
        Ok(())
    }

    /// Remove a cue and everything nested under it, detaching it from its
    /// parent first. Returns the number of cues removed.
    pub fn remove(&mut self, uid: &str) -> Result<usize, RegistryError> {
        let cue = self
            .cues
            .get(uid)
            .ok_or_else(|| RegistryError::NotFound(uid.to_string()))?;

        match cue.parent.clone() {
            Some(parent_uid) => {
                if let Some(parent) = self.cues.get_mut(&parent_uid) {
                    parent.children.retain(|child| child != uid);
                }
            }
            None => self.roots.retain(|root| root != uid),
        }

        let mut removed = 0;
        let mut pending = vec![uid.to_string()];
        while let Some(next) = pending.pop() {
            if let Some(cue) = self.cues.remove(&next) {
                pending.extend(cue.children);
                removed += 1;
            }
        }
        Ok(removed)
    }

    pub fn get(&self, uid: &str) -> Option<&QlabCue> {
        self.cues.get(uid)
    }

    pub fn get_mut(&mut self, uid: &str) -> Option<&mut QlabCue> {
        self.cues.get_mut(uid)
    }

    pub fn contains(&self, uid: &str) -> bool {
        self.cues.contains_key(uid)
    }

    /// Top-level cues in console order.
    pub fn roots(&self) -> impl Iterator<Item = &QlabCue> {
        self.roots.iter().filter_map(|uid| self.cues.get(uid))
    }

    /// Direct children of `uid` in console order.
    pub fn children(&self, uid: &str) -> Vec<&QlabCue> {
        self.cues
            .get(uid)
            .map(|cue| {
                cue.children
                    .iter()
                    .filter_map(|child| self.cues.get(child))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn parent(&self, uid: &str) -> Option<&QlabCue> {
        self.cues
            .get(uid)
            .and_then(|cue| cue.parent.as_deref())
            .and_then(|parent| self.cues.get(parent))
    }

    pub fn iter(&self) -> impl Iterator<Item = &QlabCue> {
        self.cues.values()
    }

    /// Uids in depth-first console order.
    pub fn uids(&self) -> Vec<String> {
        let mut ordered = Vec::with_capacity(self.cues.len());
        let mut pending: Vec<&String> = self.roots.iter().rev().collect();
        while let Some(uid) = pending.pop() {
            ordered.push(uid.clone());
            if let Some(cue) = self.cues.get(uid) {
                pending.extend(cue.children.iter().rev());
            }
        }
        ordered
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    pub fn clear(&mut self) {
        self.cues.clear();
        self.roots.clear();
    }

    fn ensure_vacant(&self, uid: &str) -> Result<(), RegistryError> {
        if self.cues.contains_key(uid) {
            Err(RegistryError::DuplicateUid(uid.to_string()))
        } else {
            Ok(())
        }
    }
}

/// Lighting console cue lists plus a flat index from cue uid to the uid of
/// the list holding it.
#[derive(Clone, Debug, Default)]
pub struct EosRegistry {
    cue_lists: HashMap<String, EosCueList>,
    cue_index: HashMap<String, String>,
}

impl EosRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an empty cue list.
    pub fn add_cue_list(&mut self, mut cue_list: EosCueList) -> Result<(), RegistryError> {
        if self.cue_lists.contains_key(&cue_list.uid) || self.cue_index.contains_key(&cue_list.uid)
        {
            return Err(RegistryError::DuplicateUid(cue_list.uid));
        }

        cue_list.cues.clear();
        self.cue_lists.insert(cue_list.uid.clone(), cue_list);
        Ok(())
    }

    /// Insert `cue` into the list `cue_list_uid` and point it back at it.
    pub fn add_cue(&mut self, cue_list_uid: &str, mut cue: EosCue) -> Result<(), RegistryError> {
        if self.cue_index.contains_key(cue.uid()) || self.cue_lists.contains_key(cue.uid()) {
            return Err(RegistryError::DuplicateUid(cue.uid().to_string()));
        }
        let cue_list = self
            .cue_lists
            .get_mut(cue_list_uid)
            .ok_or_else(|| RegistryError::NotFound(cue_list_uid.to_string()))?;

        cue.cue_list = cue_list_uid.to_string();
        self.cue_index
            .insert(cue.uid().to_string(), cue_list_uid.to_string());
        cue_list.cues.insert(cue.uid().to_string(), cue);
        Ok(())
    }

    /// Remove a cue, or a cue list together with its cues.
    pub fn remove(&mut self, uid: &str) -> Result<(), RegistryError> {
        if let Some(cue_list_uid) = self.cue_index.remove(uid) {
            if let Some(cue_list) = self.cue_lists.get_mut(&cue_list_uid) {
                cue_list.cues.remove(uid);
            }
            return Ok(());
        }

        let cue_list = self
            .cue_lists
            .remove(uid)
            .ok_or_else(|| RegistryError::NotFound(uid.to_string()))?;
        for cue_uid in cue_list.cues.keys() {
            self.cue_index.remove(cue_uid);
        }
        Ok(())
    }

    pub fn cue_list(&self, uid: &str) -> Option<&EosCueList> {
        self.cue_lists.get(uid)
    }

    pub fn cue_list_by_number(&self, number: u32) -> Option<&EosCueList> {
        self.cue_lists.values().find(|list| list.number == number)
    }

    /// Cue lists ordered by list number.
    pub fn cue_lists(&self) -> Vec<&EosCueList> {
        let mut lists: Vec<&EosCueList> = self.cue_lists.values().collect();
        lists.sort_by_key(|list| list.number);
        lists
    }

    pub fn cue(&self, uid: &str) -> Option<&EosCue> {
        self.cue_index
            .get(uid)
            .and_then(|list_uid| self.cue_lists.get(list_uid))
            .and_then(|list| list.cues.get(uid))
    }

    pub fn cue_list_of(&self, cue_uid: &str) -> Option<&EosCueList> {
        self.cue_index
            .get(cue_uid)
            .and_then(|list_uid| self.cue_lists.get(list_uid))
    }

    pub fn cues(&self) -> impl Iterator<Item = &EosCue> {
        self.cue_lists.values().flat_map(|list| list.cues.values())
    }

    pub fn cue_count(&self) -> usize {
        self.cue_index.len()
    }

    pub fn cue_list_count(&self) -> usize {
        self.cue_lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cue_lists.is_empty()
    }

    pub fn clear(&mut self) {
        self.cue_lists.clear();
        self.cue_index.clear();
    }
}
