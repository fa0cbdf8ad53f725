/*!
 * Resource Instances
 * Allocation records tying one granted unit to its pool
 */

use super::types::ResourceType;
use crate::core::id::{InstanceId, ResourceId};
use serde::{Serialize, Serializer};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// One granted unit of a resource type
///
/// Two records are equal only if they carry the same instance id, so a
/// process holding several units of one type can release them individually.
#[derive(Debug, Clone)]
pub struct ResourceInstance {
    resource: Arc<ResourceType>,
    instance_id: InstanceId,
}

impl ResourceInstance {
    pub(crate) fn new(resource: Arc<ResourceType>, instance_id: InstanceId) -> Self {
        Self {
            resource,
            instance_id,
        }
    }

    #[inline]
    pub fn id(&self) -> InstanceId {
        self.instance_id
    }

    #[inline]
    pub fn resource(&self) -> &Arc<ResourceType> {
        &self.resource
    }

    #[inline]
    pub fn resource_id(&self) -> ResourceId {
        self.resource.id()
    }

    #[inline]
    pub fn resource_name(&self) -> &str {
        self.resource.name()
    }
}

impl PartialEq for ResourceInstance {
    fn eq(&self, other: &Self) -> bool {
        self.instance_id == other.instance_id
    }
}

impl Eq for ResourceInstance {}

impl Hash for ResourceInstance {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.instance_id.hash(state);
    }
}

impl fmt::Display for ResourceInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.resource.name(), self.instance_id)
    }
}

impl Serialize for ResourceInstance {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("ResourceInstance", 3)?;
        s.serialize_field("instance_id", &self.instance_id)?;
        s.serialize_field("resource_id", &self.resource.id())?;
        s.serialize_field("resource", self.resource.name())?;
        s.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_is_by_instance_id() {
        let res = Arc::new(ResourceType::new(ResourceId(0), "R0", 2));
        let a = ResourceInstance::new(Arc::clone(&res), InstanceId(1));
        let b = ResourceInstance::new(Arc::clone(&res), InstanceId(2));
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
        assert_eq!(a.to_string(), "R0#1");
    }
}
