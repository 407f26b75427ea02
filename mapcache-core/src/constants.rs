//! Constants shared across the cache format
//!
//! Well-known class codes, table keys and the small amount of fixed layout
//! information that is not expressed through record schemas.

use crate::class_code::ClassCode;

/// `head` read as a big-endian integer
pub const HEAD_MAGIC: u32 = 0x6865_6164;

/// Scenario class; the root of every map
pub const SCENARIO_CLASS: ClassCode = ClassCode::new(*b"scnr");

/// Game globals
pub const GLOBALS_CLASS: ClassCode = ClassCode::new(*b"matg");

/// Multilingual unicode string list globals
pub const UNICODE_GLOBALS_CLASS: ClassCode = ClassCode::new(*b"ugh!");

/// Resource layout table (pages, segments, shared caches)
pub const RESOURCE_LAYOUT_CLASS: ClassCode = ClassCode::new(*b"play");

/// Resource gestalt (one entry per resource)
pub const RESOURCE_GESTALT_CLASS: ClassCode = ClassCode::new(*b"zone");

/// Classes that have exactly one exposed tag per container
pub const SYSTEM_CLASSES: [ClassCode; 5] = [
    SCENARIO_CLASS,
    GLOBALS_CLASS,
    UNICODE_GLOBALS_CLASS,
    RESOURCE_LAYOUT_CLASS,
    RESOURCE_GESTALT_CLASS,
];

/// Key for the tag name table
pub const FILE_NAMES_KEY: &str = "LetsAllPlayNice!";

/// Key for the string id table
pub const STRINGS_KEY: &str = "ILikeSafeStrings";

/// Key used for every table in pre-release Reach builds
pub const REACH_BETA_KEY: &str = "rs&m*l#/t%_()e;[";

/// Key for the localized string tables
pub const LOCALES_KEY: &str = "BungieHaloReach!";

/// Returned for string ids that do not resolve
pub const INVALID_STRING: &str = "<invalid>";

/// Bytes between the `zone` metadata and the layout table it embeds
pub const PLAY_FROM_ZONE_OFFSET: u64 = 28;

/// Capacity of the header build string
pub const BUILD_STRING_LENGTH: usize = 32;

/// Capacity of the header scenario name
pub const SCENARIO_NAME_LENGTH: usize = 256;

/// Check whether a class code is a system class
pub fn is_system_class(code: ClassCode) -> bool {
    SYSTEM_CLASSES.contains(&code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_classes() {
        assert!(is_system_class(SCENARIO_CLASS));
        assert!(is_system_class("zone".parse().unwrap()));
        assert!(!is_system_class("bitm".parse().unwrap()));
    }

    #[test]
    fn test_keys_are_block_sized() {
        assert_eq!(FILE_NAMES_KEY.len(), 16);
        assert_eq!(STRINGS_KEY.len(), 16);
        assert_eq!(REACH_BETA_KEY.len(), 16);
        assert_eq!(LOCALES_KEY.len(), 16);
    }
}
