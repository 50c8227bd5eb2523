/// Identity plumbing shared by every entity: `Entity`, identity equality and
/// hashing, and the `Persistent` conversion to and from `Record`.
macro_rules! impl_entity {
    ($t:ident) => {
        impl bakehouse_core::Entity for $t {
            const NAME: &'static str = stringify!($t);

            fn identity(&self) -> bakehouse_core::Identity {
                self.identity
            }
        }

        /// Same instance, or both persisted under the same id.
        impl PartialEq for $t {
            fn eq(&self, other: &Self) -> bool {
                core::ptr::eq(self, other) || self.identity.same_entity(other.identity)
            }
        }

        impl Eq for $t {}

        /// Hashes the identity only; every transient instance lands in one bucket.
        impl core::hash::Hash for $t {
            fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
                core::hash::Hash::hash(&self.identity, state);
            }
        }

        impl $crate::record::Persistent for $t {
            const KIND: $crate::schema::EntityKind = $crate::schema::EntityKind::$t;

            fn into_record(self) -> $crate::record::Record {
                $crate::record::Record::$t(self)
            }

            fn from_record(record: $crate::record::Record) -> Option<Self> {
                match record {
                    $crate::record::Record::$t(value) => Some(value),
                    _ => None,
                }
            }
        }
    };
}
