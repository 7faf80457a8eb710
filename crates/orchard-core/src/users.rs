//! Loading users from a YAML file

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use orchard_lang::{Error as LangError, Result as LangResult, User, UserLoader};

/// Reads users from a YAML list on every call, so edits to the file are
/// picked up by the next reconciliation cycle.
///
/// Names listed in `domain_admins` always exist and always carry the
/// `domain_admin` flag, even when the file is missing.
#[derive(Debug, Clone)]
pub struct FileUserLoader {
    path: PathBuf,
    domain_admins: Vec<String>,
}

impl FileUserLoader {
    pub fn new(path: impl Into<PathBuf>, domain_admins: Vec<String>) -> Self {
        Self {
            path: path.into(),
            domain_admins,
        }
    }

    fn read(&self) -> LangResult<Vec<User>> {
        if !self.path.is_file() {
            tracing::debug!(path = ?self.path, "No users file");
            return Ok(Vec::new());
        }
        let decode = |source: LangError| LangError::Decode {
            path: self.path.clone(),
            source: Box::new(source),
        };
        let content = fs::read_to_string(&self.path).map_err(|e| decode(e.into()))?;
        serde_yaml::from_str::<Option<Vec<User>>>(&content)
            .map(Option::unwrap_or_default)
            .map_err(|e| decode(e.into()))
    }
}

impl UserLoader for FileUserLoader {
    fn load_all(&self) -> LangResult<BTreeMap<String, User>> {
        let mut users: BTreeMap<String, User> = self
            .read()?
            .into_iter()
            .map(|u| (u.name.clone(), u))
            .collect();
        for name in &self.domain_admins {
            users
                .entry(name.clone())
                .or_insert_with(|| User::new(name.as_str()))
                .domain_admin = true;
        }
        tracing::debug!(count = users.len(), "Loaded users");
        Ok(users)
    }

    fn load_by_name(&self, name: &str) -> LangResult<Option<User>> {
        Ok(self.load_all()?.remove(name))
    }
}
