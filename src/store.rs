//! Groups of codes as the backend describes them, plus the backup reminder.

use serde::{Deserialize, Serialize};

/// A stored TOTP entry. Deleting is soft: the record stays with `deleted` set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeSummary {
    pub code_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_name: Option<String>,
    /// Seconds since the UNIX epoch.
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<i64>,
}

impl CodeSummary {
    pub fn display_name(&self) -> &str {
        self.preferred_name.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeGroup {
    pub group_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codes: Option<Vec<CodeSummary>>,
}

impl CodeGroup {
    pub fn code(&self, code_id: &str) -> Option<&CodeSummary> {
        self.codes.as_ref()?.iter().find(|c| c.code_id == code_id)
    }

    /// Codes that have not been soft-deleted.
    pub fn live_codes(&self) -> impl Iterator<Item = &CodeSummary> {
        self.codes.iter().flatten().filter(|c| !c.deleted)
    }
}

/// In-memory collection of groups, looked up by identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupStore {
    groups: Vec<CodeGroup>,
}

impl GroupStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn groups(&self) -> &[CodeGroup] {
        &self.groups
    }

    pub fn set_groups(&mut self, groups: Vec<CodeGroup>) {
        self.groups = groups;
    }

    /// Insert a group, replacing any existing group with the same id in place.
    pub fn insert_group(&mut self, group: CodeGroup) {
        match self.groups.iter_mut().find(|g| g.group_id == group.group_id) {
            Some(existing) => *existing = group,
            None => self.groups.push(group),
        }
    }

    pub fn remove_group(&mut self, group_id: &str) -> Option<CodeGroup> {
        let idx = self.groups.iter().position(|g| g.group_id == group_id)?;
        Some(self.groups.remove(idx))
    }

    pub fn group_by_id(&self, group_id: &str) -> Option<&CodeGroup> {
        self.groups.iter().find(|g| g.group_id == group_id)
    }

    fn group_mut(&mut self, group_id: &str) -> Option<&mut CodeGroup> {
        self.groups.iter_mut().find(|g| g.group_id == group_id)
    }

    pub fn group_has_codes(&self, group_id: &str) -> bool {
        self.group_by_id(group_id)
            .and_then(|g| g.codes.as_ref())
            .is_some_and(|codes| !codes.is_empty())
    }

    /// Append a code to a group. Returns `false` when the group is unknown.
    pub fn add_code_to_group(&mut self, group_id: &str, code: CodeSummary) -> bool {
        match self.group_mut(group_id) {
            Some(group) => {
                group.codes.get_or_insert_with(Vec::new).push(code);
                true
            }
            None => false,
        }
    }

    pub fn code_by_id(&self, group_id: &str, code_id: &str) -> Option<&CodeSummary> {
        self.group_by_id(group_id)?.code(code_id)
    }

    /// Replace a code in place, e.g. after a rename. Returns `false` when
    /// either the group or the code is unknown.
    pub fn replace_code(&mut self, group_id: &str, code: CodeSummary) -> bool {
        let Some(existing) = self
            .group_mut(group_id)
            .and_then(|g| g.codes.as_mut())
            .and_then(|codes| codes.iter_mut().find(|c| c.code_id == code.code_id))
        else {
            return false;
        };
        *existing = code;
        true
    }

    pub fn remove_code(&mut self, group_id: &str, code_id: &str) -> Option<CodeSummary> {
        let codes = self.group_mut(group_id)?.codes.as_mut()?;
        let idx = codes.iter().position(|c| c.code_id == code_id)?;
        Some(codes.remove(idx))
    }

    /// Mark a code deleted at `deleted_at` (UNIX seconds) without dropping it.
    pub fn soft_delete_code(&mut self, group_id: &str, code_id: &str, deleted_at: i64) -> bool {
        let Some(code) = self
            .group_mut(group_id)
            .and_then(|g| g.codes.as_mut())
            .and_then(|codes| codes.iter_mut().find(|c| c.code_id == code_id))
        else {
            return false;
        };
        code.deleted = true;
        code.deleted_at = Some(deleted_at);
        true
    }
}

/// How far behind the user's backups are.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupWarning {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_backup_at: Option<i64>,
    pub number_not_backed_up: u32,
}

impl BackupWarning {
    pub fn is_due(&self) -> bool {
        self.number_not_backed_up > 0
    }

    pub fn last_backup_label(&self) -> String {
        match self.last_backup_at {
            Some(at) => at.to_string(),
            None => "Never".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(id: &str) -> CodeSummary {
        CodeSummary {
            code_id: id.into(),
            name: format!("{id}-name"),
            preferred_name: None,
            created_at: 1_700_000_000,
            deleted: false,
            deleted_at: None,
        }
    }

    fn group(id: &str) -> CodeGroup {
        CodeGroup {
            group_id: id.into(),
            name: format!("{id}-group"),
            codes: None,
        }
    }

    #[test]
    fn insert_group_replaces_by_id() {
        let mut store = GroupStore::new();
        store.insert_group(group("a"));
        store.insert_group(group("b"));
        let mut renamed = group("a");
        renamed.name = "Renamed".into();
        store.insert_group(renamed);

        assert_eq!(store.groups().len(), 2);
        assert_eq!(store.groups()[0].name, "Renamed");
    }

    #[test]
    fn add_code_creates_list_on_demand() {
        let mut store = GroupStore::new();
        store.insert_group(group("a"));
        assert!(!store.group_has_codes("a"));
        assert!(store.add_code_to_group("a", code("c1")));
        assert!(store.group_has_codes("a"));
        assert!(!store.add_code_to_group("missing", code("c2")));
        assert!(!store.group_has_codes("missing"));
    }

    #[test]
    fn replace_and_remove_code() {
        let mut store = GroupStore::new();
        store.insert_group(group("a"));
        store.add_code_to_group("a", code("c1"));

        let mut renamed = code("c1");
        renamed.preferred_name = Some("Work GitHub".into());
        assert!(store.replace_code("a", renamed));
        assert_eq!(
            store.code_by_id("a", "c1").unwrap().display_name(),
            "Work GitHub"
        );
        assert!(!store.replace_code("a", code("unknown")));

        assert_eq!(store.remove_code("a", "c1").map(|c| c.code_id), Some("c1".into()));
        assert!(store.code_by_id("a", "c1").is_none());
        assert!(store.remove_group("a").is_some());
        assert!(store.group_by_id("a").is_none());
    }

    #[test]
    fn soft_delete_keeps_record() {
        let mut store = GroupStore::new();
        store.insert_group(group("a"));
        store.add_code_to_group("a", code("c1"));
        store.add_code_to_group("a", code("c2"));

        assert!(store.soft_delete_code("a", "c1", 1_700_000_100));
        let deleted = store.code_by_id("a", "c1").unwrap();
        assert!(deleted.deleted);
        assert_eq!(deleted.deleted_at, Some(1_700_000_100));

        let live: Vec<_> = store
            .group_by_id("a")
            .unwrap()
            .live_codes()
            .map(|c| c.code_id.as_str())
            .collect();
        assert_eq!(live, vec!["c2"]);
    }

    #[test]
    fn group_reads_backend_json() {
        let json = r#"{
            "groupId": "g1",
            "name": "Personal",
            "codes": [
                {"codeId": "c1", "name": "GitHub", "preferredName": "gh", "createdAt": 10, "deleted": false},
                {"codeId": "c2", "name": "AWS", "createdAt": 11, "deleted": true, "deletedAt": 12}
            ]
        }"#;
        let group: CodeGroup = serde_json::from_str(json).expect("decode group");
        assert_eq!(group.code("c1").unwrap().display_name(), "gh");
        assert_eq!(group.code("c2").unwrap().deleted_at, Some(12));
        assert_eq!(group.live_codes().count(), 1);
    }

    #[test]
    fn backup_warning_labels() {
        let never = BackupWarning::default();
        assert!(!never.is_due());
        assert_eq!(never.last_backup_label(), "Never");

        let behind: BackupWarning =
            serde_json::from_str(r#"{"lastBackupAt": 42, "numberNotBackedUp": 3}"#).unwrap();
        assert!(behind.is_due());
        assert_eq!(behind.last_backup_label(), "42");
    }
}
