//! Per-channel conversion requests and their two sample banks.

/// One of the two banks owned by a request.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Bank {
    #[default]
    Ping,
    Pong,
}

impl Bank {
    /// The bank this one alternates with.
    pub const fn other(self) -> Self {
        match self {
            Self::Ping => Self::Pong,
            Self::Pong => Self::Ping,
        }
    }

    pub const fn index(self) -> usize {
        match self {
            Self::Ping => 0,
            Self::Pong => 1,
        }
    }
}

/// Samples wanted from one channel, written into two caller-owned banks.
///
/// The driver borrows the banks for the whole session and only writes to the
/// active one; the other bank is what callbacks get to see. Hand the request
/// back with [`AdcBuf::reclaim`](crate::AdcBuf::reclaim) once the session is
/// over to read delivered counts and sample data.
#[derive(Debug)]
pub struct ConversionRequest<'a> {
    pub(crate) channel: usize,
    pub(crate) requested: u32,
    pub(crate) delivered: u32,
    pub(crate) banks: [&'a mut [u16]; 2],
    pub(crate) active_bank: Bank,
    pub(crate) fill: usize,
    pub(crate) fills: u32,
}

impl<'a> ConversionRequest<'a> {
    /// `channel` indexes the driver's channel table. `requested` is the
    /// total sample count for one-shot sessions and the per-cycle quota for
    /// continuous ones.
    pub fn new(
        channel: usize,
        requested: u32,
        ping: &'a mut [u16],
        pong: &'a mut [u16],
    ) -> Self {
        Self {
            channel,
            requested,
            delivered: 0,
            banks: [ping, pong],
            active_bank: Bank::Ping,
            fill: 0,
            fills: 0,
        }
    }

    pub fn channel(&self) -> usize {
        self.channel
    }

    pub fn requested(&self) -> u32 {
        self.requested
    }

    /// Samples written so far in the current cycle.
    pub fn delivered(&self) -> u32 {
        self.delivered
    }

    /// Capacity of each bank.
    pub fn bank_len(&self) -> usize {
        self.banks[0].len()
    }

    pub fn bank(&self, bank: Bank) -> &[u16] {
        self.banks[bank.index()]
    }

    /// Bank the driver writes next.
    pub fn active_bank(&self) -> Bank {
        self.active_bank
    }

    /// Completed bank fills since the session started.
    pub fn fills(&self) -> u32 {
        self.fills
    }

    pub(crate) fn is_satisfied(&self) -> bool {
        self.delivered >= self.requested
    }

    /// Whether the bank completed as fill number `sequence` has been written
    /// again since.
    pub(crate) fn bank_overwritten(&self, sequence: u32) -> bool {
        match self.fills.saturating_sub(sequence) {
            0 => false,
            // The writer is back on that bank once anything lands in it.
            1 => self.fill > 0,
            _ => true,
        }
    }

    pub(crate) fn reset(&mut self) {
        self.delivered = 0;
        self.active_bank = Bank::Ping;
        self.fill = 0;
        self.fills = 0;
    }

    /// Release the borrowed banks.
    pub fn into_banks(self) -> [&'a mut [u16]; 2] {
        self.banks
    }
}
