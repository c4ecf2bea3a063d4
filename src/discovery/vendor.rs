//! MAC vendor lookup.

use mac_oui::Oui;
use pnet::util::MacAddr;
use std::sync::OnceLock;
use tracing::warn;

/// Maps a MAC address to the organization that owns its OUI prefix.
pub trait VendorLookup: Send + Sync {
    fn lookup_vendor(&self, mac: MacAddr) -> Option<String>;
}

static OUI_DB: OnceLock<Option<Oui>> = OnceLock::new();

fn oui_db() -> Option<&'static Oui> {
    OUI_DB
        .get_or_init(|| match Oui::default() {
            Ok(db) => Some(db),
            Err(e) => {
                warn!(error = %e, "failed to load OUI database, vendor lookup disabled");
                None
            }
        })
        .as_ref()
}

/// [`VendorLookup`] backed by the bundled `mac_oui` database.
#[derive(Debug, Default, Clone, Copy)]
pub struct OuiVendorLookup;

impl VendorLookup for OuiVendorLookup {
    fn lookup_vendor(&self, mac: MacAddr) -> Option<String> {
        let db = oui_db()?;
        match db.lookup_by_mac(&mac.to_string()) {
            Ok(Some(entry)) => Some(entry.company_name.clone()),
            _ => None,
        }
    }
}

/// Vendor for an optional MAC; `None` when there is no MAC or no match.
pub fn vendor_for(lookup: &dyn VendorLookup, mac: Option<MacAddr>) -> Option<String> {
    mac.and_then(|mac| lookup.lookup_vendor(mac))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Lookup that never knows a vendor.
    pub(crate) struct NoVendors;

    impl VendorLookup for NoVendors {
        fn lookup_vendor(&self, _mac: MacAddr) -> Option<String> {
            None
        }
    }

    struct Fixed;

    impl VendorLookup for Fixed {
        fn lookup_vendor(&self, _mac: MacAddr) -> Option<String> {
            Some("Acme Networks".to_string())
        }
    }

    #[test]
    fn test_vendor_for_without_mac() {
        assert_eq!(vendor_for(&Fixed, None), None);
    }

    #[test]
    fn test_vendor_for_with_mac() {
        let mac = MacAddr::new(0x00, 0x1b, 0x63, 0x00, 0x00, 0x01);
        assert_eq!(vendor_for(&Fixed, Some(mac)).as_deref(), Some("Acme Networks"));
        assert_eq!(vendor_for(&NoVendors, Some(mac)), None);
    }

    #[test]
    fn test_oui_lookup_does_not_panic_on_unknown_prefix() {
        let mac = MacAddr::new(0xfe, 0xff, 0xff, 0x00, 0x00, 0x01);
        let _ = OuiVendorLookup.lookup_vendor(mac);
    }
}
