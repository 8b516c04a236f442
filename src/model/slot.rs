use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Authentication,
    Signature,
    KeyManagement,
    CardAuthentication,
}

impl Slot {
    /// The slot SSH keys live in
    pub fn default_ssh() -> Self {
        Self::Authentication
    }

    /// PIV key reference, as printed by ykman
    pub fn id(self) -> u8 {
        match self {
            Slot::Authentication => 0x9a,
            Slot::Signature => 0x9c,
            Slot::KeyManagement => 0x9d,
            Slot::CardAuthentication => 0x9e,
        }
    }

    pub fn from_id(id: u8) -> Result<Self, SlotError> {
        match id {
            0x9a => Ok(Slot::Authentication),
            0x9c => Ok(Slot::Signature),
            0x9d => Ok(Slot::KeyManagement),
            0x9e => Ok(Slot::CardAuthentication),
            _ => Err(SlotError::Unsupported {
                slot: format!("{id:02x}"),
            }),
        }
    }

    pub fn to_yubikey_slot_id(self) -> yubikey::piv::SlotId {
        match self {
            Slot::Authentication => yubikey::piv::SlotId::Authentication,
            Slot::Signature => yubikey::piv::SlotId::Signature,
            Slot::KeyManagement => yubikey::piv::SlotId::KeyManagement,
            Slot::CardAuthentication => yubikey::piv::SlotId::CardAuthentication,
        }
    }
}

impl Default for Slot {
    fn default() -> Self {
        Self::default_ssh()
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}", self.id())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SlotError {
    #[error("Slot not supported: {slot}")]
    Unsupported { slot: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_conversion() {
        let slot = Slot::Authentication;
        let yubikey_slot = slot.to_yubikey_slot_id();
        assert_eq!(yubikey_slot, yubikey::piv::SlotId::Authentication);
    }

    #[test]
    fn test_slot_from_id() {
        assert_eq!(Slot::from_id(0x9c).unwrap(), Slot::Signature);
        assert!(Slot::from_id(0x82).is_err());
    }

    #[test]
    fn test_default_ssh_slot() {
        assert_eq!(Slot::default(), Slot::Authentication);
        assert_eq!(Slot::default().to_string(), "9a");
    }

    #[test]
    fn test_slot_error_display() {
        let err = SlotError::Unsupported {
            slot: "Unknown".to_string(),
        };
        assert!(err.to_string().contains("not supported"));
    }
}
