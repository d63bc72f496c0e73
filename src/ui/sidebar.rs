use std::collections::HashSet;

use log::error;

use crate::api::ApiError;
use crate::models::chat::{ sort_groups, ConversationGroup, ConversationSummary };

/// What the conversation list pane is currently showing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SidebarStatus {
    Loading,
    Empty,
    Populated,
    /// A filter is active and nothing matches it.
    NoResults,
}

/// One selectable row in the flattened sidebar view.
#[derive(Clone, Debug, PartialEq)]
pub enum SidebarRow {
    GroupHeader {
        name: String,
        collapsed: bool,
        count: usize,
    },
    Card(ConversationSummary),
}

/// Conversation list state: grouped history, a live substring filter and
/// per-group collapse. Collapse choices live for the process only; nothing
/// here is persisted.
pub struct SidebarState {
    groups: Vec<ConversationGroup>,
    collapsed: HashSet<String>,
    filter: String,
    status: SidebarStatus,
    active_id: Option<String>,
    selected: usize,
}

impl Default for SidebarState {
    fn default() -> Self {
        Self::new()
    }
}

impl SidebarState {
    pub fn new() -> Self {
        Self {
            groups: Vec::new(),
            collapsed: HashSet::new(),
            filter: String::new(),
            status: SidebarStatus::Loading,
            active_id: None,
            selected: 0,
        }
    }

    pub fn status(&self) -> SidebarStatus {
        self.status
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active_id.as_deref()
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    /// Install a fresh history fetch. Errors leave an empty list rather
    /// than a stale or broken one.
    pub fn apply_history(&mut self, result: Result<Vec<ConversationGroup>, ApiError>) {
        match result {
            Ok(mut groups) => {
                groups.retain(|group| !group.conversations.is_empty());
                sort_groups(&mut groups);
                self.groups = groups;
            }
            Err(err) => {
                error!("Conversation history fetch failed: {}", err);
                self.groups.clear();
            }
        }
        self.recompute_status();
        self.clamp_selection();
    }

    pub fn begin_load(&mut self) {
        self.status = SidebarStatus::Loading;
    }

    /// Case-insensitive substring filter over conversation previews.
    pub fn set_filter(&mut self, term: &str) {
        self.filter = term.to_string();
        self.recompute_status();
        self.clamp_selection();
    }

    pub fn clear_filter(&mut self) {
        self.set_filter("");
    }

    pub fn toggle_group(&mut self, name: &str) {
        if !self.collapsed.remove(name) {
            self.collapsed.insert(name.to_string());
        }
        self.clamp_selection();
    }

    /// Exactly one conversation is highlighted at a time.
    pub fn set_active(&mut self, id: Option<String>) {
        self.active_id = id;
    }

    /// Flattened view of what the pane shows: headers for groups with at
    /// least one matching conversation, cards beneath expanded headers.
    pub fn visible_rows(&self) -> Vec<SidebarRow> {
        let mut rows = Vec::new();
        for group in &self.groups {
            let matching: Vec<&ConversationSummary> = group.conversations
                .iter()
                .filter(|summary| self.matches(summary))
                .collect();
            if matching.is_empty() {
                continue;
            }
            let collapsed = self.collapsed.contains(&group.name);
            rows.push(SidebarRow::GroupHeader {
                name: group.name.clone(),
                collapsed,
                count: matching.len(),
            });
            if !collapsed {
                rows.extend(matching.into_iter().cloned().map(SidebarRow::Card));
            }
        }
        rows
    }

    pub fn move_selection_up(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn move_selection_down(&mut self) {
        let last = self.visible_rows().len().saturating_sub(1);
        self.selected = (self.selected + 1).min(last);
    }

    pub fn selected_row(&self) -> Option<SidebarRow> {
        self.visible_rows().into_iter().nth(self.selected)
    }

    fn matches(&self, summary: &ConversationSummary) -> bool {
        if self.filter.is_empty() {
            return true;
        }
        summary.preview.to_lowercase().contains(&self.filter.to_lowercase())
    }

    fn recompute_status(&mut self) {
        let total: usize = self.groups
            .iter()
            .map(|group| group.conversations.len())
            .sum();
        self.status = if total == 0 {
            SidebarStatus::Empty
        } else if !self.filter.is_empty() && self.visible_rows().is_empty() {
            SidebarStatus::NoResults
        } else {
            SidebarStatus::Populated
        };
    }

    fn clamp_selection(&mut self) {
        let last = self.visible_rows().len().saturating_sub(1);
        self.selected = self.selected.min(last);
    }
}
