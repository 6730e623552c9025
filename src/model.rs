//! Entities served by the request-scoped loaders.

pub type RiskId = i64;
pub type CaseId = i64;

/// A tracked risk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Risk {
    pub id: RiskId,
    pub title: String,
}

/// A case opened against one or more risks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Case {
    pub id: CaseId,
    pub title: String,
}

/// An external directory user, as listed by the directory service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub id: String,
    pub display_name: String,
    pub real_name: String,
    pub avatar_url: Option<String>,
}

impl DirectoryEntry {
    /// Entry standing in for a user the directory does not know about.
    pub fn placeholder(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: String::new(),
            real_name: String::new(),
            avatar_url: None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.display_name.is_empty() && self.real_name.is_empty() && self.avatar_url.is_none()
    }
}
