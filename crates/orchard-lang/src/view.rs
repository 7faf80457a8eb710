//! Access-checked view of a policy for one user

use crate::acl::Privilege;
use crate::bundle::Bundle;
use crate::error::{Error, Result};
use crate::object::{Kind, Metadata, PolicyObject};
use crate::policy::Policy;
use crate::user::User;

/// A policy seen through a user's privileges
#[derive(Debug, Clone, Copy)]
pub struct PolicyView<'a> {
    policy: &'a Policy,
    user: &'a User,
}

impl<'a> PolicyView<'a> {
    pub fn new(policy: &'a Policy, user: &'a User) -> Self {
        Self { policy, user }
    }

    pub fn user(&self) -> &User {
        self.user
    }

    fn privilege(&self, kind: Kind, namespace: &str) -> Result<Privilege> {
        self.policy.acl().privilege(self.user, kind, namespace)
    }

    fn denied(&self, action: &'static str, kind: Kind, meta: &Metadata) -> Error {
        Error::AccessDenied {
            user: self.user.name.clone(),
            action,
            object: format!("{} '{}/{}'", kind, meta.namespace, meta.name),
        }
    }

    /// Fail unless the user may view the object
    pub fn view_object(&self, object: &PolicyObject) -> Result<()> {
        let meta = object.metadata();
        if self.privilege(object.kind(), &meta.namespace)?.view {
            Ok(())
        } else {
            Err(self.denied("view", object.kind(), meta))
        }
    }

    /// Fail unless the user may add, change or remove the object
    pub fn manage_object(&self, object: &PolicyObject) -> Result<()> {
        let meta = object.metadata();
        if self.privilege(object.kind(), &meta.namespace)?.manage {
            Ok(())
        } else {
            Err(self.denied("manage", object.kind(), meta))
        }
    }

    /// Consuming a bundle requires managing claims in the bundle's namespace
    pub fn can_consume(&self, bundle: &Bundle) -> Result<()> {
        if self.privilege(Kind::Claim, &bundle.metadata.namespace)?.manage {
            Ok(())
        } else {
            Err(self.denied("consume", Kind::Bundle, &bundle.metadata))
        }
    }

    /// A copy of the policy with the object added, if the user may manage it.
    /// The second value tells whether anything changed.
    pub fn add_object(&self, object: PolicyObject) -> Result<(Policy, bool)> {
        self.manage_object(&object)?;
        let mut updated = self.policy.clone();
        let changed = updated.add_object(object);
        Ok((updated, changed))
    }

    /// A copy of the policy with the object removed, if the user may manage it
    pub fn remove_object(&self, kind: Kind, namespace: &str, name: &str) -> Result<(Policy, bool)> {
        let meta = Metadata::new(namespace, name);
        if !self.privilege(kind, namespace)?.manage {
            return Err(self.denied("manage", kind, &meta));
        }
        let mut updated = self.policy.clone();
        let changed = updated.remove_object(kind, namespace, name).is_some();
        Ok((updated, changed))
    }

    /// Objects the user may see
    pub fn visible_objects(&self) -> Result<Vec<PolicyObject>> {
        let mut visible = Vec::new();
        for object in self.policy.objects() {
            if self.privilege(object.kind(), &object.metadata().namespace)?.view {
                visible.push(object);
            }
        }
        Ok(visible)
    }
}
