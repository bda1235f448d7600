use std::collections::HashMap;

use uuid::Uuid;

use crate::database::Database;
use crate::error::Result;

/// Memoizes user id -> display name for the duration of one listing.
///
/// Create one per operation and drop it afterwards; it is never shared, so
/// it cannot go stale.
pub struct NameCache<'a> {
    db: &'a Database,
    names: HashMap<Uuid, String>,
}

impl<'a> NameCache<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self {
            db,
            names: HashMap::new(),
        }
    }

    pub fn name_of(&mut self, id: Uuid) -> Result<String> {
        if let Some(name) = self.names.get(&id) {
            return Ok(name.clone());
        }
        let name = self.db.user_name(id)?;
        self.names.insert(id, name.clone());
        Ok(name)
    }

    /// Number of distinct ids resolved so far.
    #[cfg(test)]
    fn len(&self) -> usize {
        self.names.len()
    }
}
