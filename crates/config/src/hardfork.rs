// Copyright (C) 2015-2025 The Neo Project.
//
// hardfork.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! Hardfork identifiers and height-gated activation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A named, block-height-gated change in protocol semantics.
///
/// Hardforks are strictly ordered; a later fork never activates below an
/// earlier one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[repr(u8)]
pub enum Hardfork {
    /// Aspidochelone hardfork.
    Aspidochelone = 0,
    /// Basilisk hardfork.
    Basilisk = 1,
    /// Cockatrice hardfork.
    Cockatrice = 2,
    /// Domovoi hardfork.
    Domovoi = 3,
    /// Echidna hardfork.
    Echidna = 4,
}

impl Hardfork {
    /// All hardforks in activation order.
    pub fn all() -> [Hardfork; 5] {
        [
            Hardfork::Aspidochelone,
            Hardfork::Basilisk,
            Hardfork::Cockatrice,
            Hardfork::Domovoi,
            Hardfork::Echidna,
        ]
    }
}

impl fmt::Display for Hardfork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Hardfork::Aspidochelone => "HF_Aspidochelone",
            Hardfork::Basilisk => "HF_Basilisk",
            Hardfork::Cockatrice => "HF_Cockatrice",
            Hardfork::Domovoi => "HF_Domovoi",
            Hardfork::Echidna => "HF_Echidna",
        };
        f.write_str(name)
    }
}

impl FromStr for Hardfork {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim_start_matches("HF_") {
            "Aspidochelone" => Ok(Hardfork::Aspidochelone),
            "Basilisk" => Ok(Hardfork::Basilisk),
            "Cockatrice" => Ok(Hardfork::Cockatrice),
            "Domovoi" => Ok(Hardfork::Domovoi),
            "Echidna" => Ok(Hardfork::Echidna),
            other => Err(format!("unknown hardfork: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering() {
        assert!(Hardfork::Aspidochelone < Hardfork::Basilisk);
        assert!(Hardfork::Domovoi < Hardfork::Echidna);
    }

    #[test]
    fn test_parse_with_and_without_prefix() {
        assert_eq!(
            Hardfork::from_str("HF_Basilisk").unwrap(),
            Hardfork::Basilisk
        );
        assert_eq!(Hardfork::from_str("Echidna").unwrap(), Hardfork::Echidna);
        assert!(Hardfork::from_str("HF_Wyvern").is_err());
    }
}
