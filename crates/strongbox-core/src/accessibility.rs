use serde::{Deserialize, Serialize};

use crate::attributes::{Attribute, AttributeSet, Tag};

/// Provider-level accessibility tag, one per policy variant.
///
/// The string forms match the keychain constants so records written by one
/// provider read the same everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessibleTag {
    #[serde(rename = "akpu")]
    WhenPasscodeSetThisDeviceOnly,
    #[serde(rename = "aku")]
    WhenUnlockedThisDeviceOnly,
    #[serde(rename = "cku")]
    AfterFirstUnlockThisDeviceOnly,
    #[serde(rename = "ak")]
    WhenUnlocked,
    #[serde(rename = "ck")]
    AfterFirstUnlock,
}

impl AccessibleTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessibleTag::WhenPasscodeSetThisDeviceOnly => "akpu",
            AccessibleTag::WhenUnlockedThisDeviceOnly => "aku",
            AccessibleTag::AfterFirstUnlockThisDeviceOnly => "cku",
            AccessibleTag::WhenUnlocked => "ak",
            AccessibleTag::AfterFirstUnlock => "ck",
        }
    }

    /// Device-only tags can never be attached to a synchronizable item.
    pub fn is_device_only(&self) -> bool {
        matches!(
            self,
            AccessibleTag::WhenPasscodeSetThisDeviceOnly
                | AccessibleTag::WhenUnlockedThisDeviceOnly
                | AccessibleTag::AfterFirstUnlockThisDeviceOnly
        )
    }
}

/// When a secret can be read and whether it may leave the device.
///
/// The `ThisDeviceOnly` variants carry no synchronizable flag because the
/// underlying stores refuse to synchronize device-local items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Accessibility {
    WhenPasscodeSetThisDeviceOnly,
    WhenUnlockedThisDeviceOnly,
    AfterFirstUnlockThisDeviceOnly,
    WhenUnlocked { synchronizable: bool },
    AfterFirstUnlock { synchronizable: bool },
}

impl Default for Accessibility {
    fn default() -> Self {
        Accessibility::WhenUnlocked {
            synchronizable: false,
        }
    }
}

impl Accessibility {
    pub fn tag(&self) -> AccessibleTag {
        match self {
            Accessibility::WhenPasscodeSetThisDeviceOnly => {
                AccessibleTag::WhenPasscodeSetThisDeviceOnly
            }
            Accessibility::WhenUnlockedThisDeviceOnly => AccessibleTag::WhenUnlockedThisDeviceOnly,
            Accessibility::AfterFirstUnlockThisDeviceOnly => {
                AccessibleTag::AfterFirstUnlockThisDeviceOnly
            }
            Accessibility::WhenUnlocked { .. } => AccessibleTag::WhenUnlocked,
            Accessibility::AfterFirstUnlock { .. } => AccessibleTag::AfterFirstUnlock,
        }
    }

    /// `None` means the policy does not take a flag at all, which is not the
    /// same as requiring `false`.
    pub fn synchronizable(&self) -> Option<bool> {
        match self {
            Accessibility::WhenUnlocked { synchronizable }
            | Accessibility::AfterFirstUnlock { synchronizable } => Some(*synchronizable),
            _ => None,
        }
    }

    /// Attributes contributed by this policy: always the accessibility tag,
    /// plus the synchronizable flag for the variants that carry one.
    pub fn attribute_fragment(&self) -> AttributeSet {
        let mut fragment = AttributeSet::new().with(Attribute::Accessible, self.tag());
        if let Some(synchronizable) = self.synchronizable() {
            fragment.add(Attribute::Synchronizable, synchronizable);
        }
        fragment
    }

    /// Rebuild a policy from what a provider recorded.
    pub fn from_stored(tag: AccessibleTag, synchronizable: bool) -> Self {
        match tag {
            AccessibleTag::WhenPasscodeSetThisDeviceOnly => {
                Accessibility::WhenPasscodeSetThisDeviceOnly
            }
            AccessibleTag::WhenUnlockedThisDeviceOnly => Accessibility::WhenUnlockedThisDeviceOnly,
            AccessibleTag::AfterFirstUnlockThisDeviceOnly => {
                Accessibility::AfterFirstUnlockThisDeviceOnly
            }
            AccessibleTag::WhenUnlocked => Accessibility::WhenUnlocked { synchronizable },
            AccessibleTag::AfterFirstUnlock => Accessibility::AfterFirstUnlock { synchronizable },
        }
    }

    /// Read the policy back from an item's attributes. Returns `None` when no
    /// accessibility tag is present.
    pub fn from_attributes(attributes: &AttributeSet) -> Option<Self> {
        let tag = match attributes.tag(Attribute::Accessible)? {
            Tag::Accessible(tag) => tag,
            _ => return None,
        };
        let synchronizable = attributes
            .bool(Attribute::Synchronizable)
            .unwrap_or(false);
        Some(Self::from_stored(tag, synchronizable))
    }
}
