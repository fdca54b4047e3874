//! teid_table - open addressing table that compresses 32 bit TEIDs to one byte codes

use crate::{CompressedCode, TunnelId};
use std::net::IpAddr;

// One slot per possible compressed code.
pub const TEID_TABLE_SIZE: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeidLookup {
    Existing(CompressedCode),
    Inserted(CompressedCode),
    // No free slot and no match.  Every slot has been cleared and the caller must look up again.
    TableFull,
}

/// Result of [`TeidHashTable::bind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    pub code: CompressedCode,
    pub is_new: bool,
    pub table_was_reset: bool,
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    teid: TunnelId,
    // Destination that has been sent this TEID in full against this slot's code.
    announced_to: Option<IpAddr>,
}

pub struct TeidHashTable {
    slots: [Option<Slot>; TEID_TABLE_SIZE],
    // Incremented on every reset.  A code obtained in an earlier epoch must not be used.
    epoch: u64,
}

impl TeidHashTable {
    pub fn new() -> Self {
        TeidHashTable {
            slots: [None; TEID_TABLE_SIZE],
            epoch: 0,
        }
    }

    /// Linear probe from the slot given by the low byte of the TEID.  When the table is full the whole
    /// table is cleared, invalidating every existing code.
    pub fn lookup_or_insert(&mut self, teid: TunnelId) -> TeidLookup {
        let home = teid.0 as u8;
        for probe in 0..TEID_TABLE_SIZE {
            let idx = home.wrapping_add(probe as u8);
            let slot = &mut self.slots[idx as usize];
            match slot {
                None => {
                    *slot = Some(Slot {
                        teid,
                        announced_to: None,
                    });
                    return TeidLookup::Inserted(CompressedCode(idx));
                }
                Some(s) if s.teid == teid => return TeidLookup::Existing(CompressedCode(idx)),
                Some(_) => {}
            }
        }
        self.reset();
        TeidLookup::TableFull
    }

    /// Look up a TEID, retrying once if that reset the table.
    pub fn bind(&mut self, teid: TunnelId) -> Binding {
        match self.lookup_or_insert(teid) {
            TeidLookup::Existing(code) => Binding {
                code,
                is_new: false,
                table_was_reset: false,
            },
            TeidLookup::Inserted(code) => Binding {
                code,
                is_new: true,
                table_was_reset: false,
            },
            TeidLookup::TableFull => match self.lookup_or_insert(teid) {
                TeidLookup::Inserted(code) | TeidLookup::Existing(code) => Binding {
                    code,
                    is_new: true,
                    table_was_reset: true,
                },
                // The table was just emptied so the home slot is free.
                TeidLookup::TableFull => unreachable!("TEID table full straight after reset"),
            },
        }
    }

    fn reset(&mut self) {
        self.slots = [None; TEID_TABLE_SIZE];
        self.epoch += 1;
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn get(&self, code: CompressedCode) -> Option<TunnelId> {
        self.slots[code.0 as usize].map(|s| s.teid)
    }

    pub fn occupied(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Whether `destination` has already been sent the full TEID bound to `code`.
    pub fn is_announced_to(&self, code: CompressedCode, destination: IpAddr) -> bool {
        self.slots[code.0 as usize].is_some_and(|s| s.announced_to == Some(destination))
    }

    /// Record that `destination` has been sent `teid` in full against `code`.  Ignored if the slot has
    /// since been cleared or rebound to another TEID.
    pub fn mark_announced(&mut self, code: CompressedCode, teid: TunnelId, destination: IpAddr) {
        if let Some(slot) = &mut self.slots[code.0 as usize]
            && slot.teid == teid
        {
            slot.announced_to = Some(destination);
        }
    }
}

impl Default for TeidHashTable {
    fn default() -> Self {
        Self::new()
    }
}
