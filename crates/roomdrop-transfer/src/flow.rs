//! Sender-side backpressure.

use roomdrop_common::TransferError;

use crate::channel::DataChannel;

/// Chunking and buffering parameters for one transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferOptions {
    /// Plaintext bytes per binary frame.
    pub chunk_size: usize,
    /// Suspend writes once the channel buffers more than this.
    pub high_water: usize,
    /// Resume writes once the channel drains to this.
    pub low_water: usize,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            chunk_size: 16 * 1024,
            high_water: 8 * 1024 * 1024,
            low_water: 4 * 1024 * 1024,
        }
    }
}

impl TransferOptions {
    pub fn validate(&self) -> Result<(), TransferError> {
        if self.chunk_size == 0 {
            return Err(TransferError::Protocol("chunk_size must be positive".into()));
        }
        if self.low_water >= self.high_water {
            return Err(TransferError::Protocol(format!(
                "low_water ({}) must be below high_water ({})",
                self.low_water, self.high_water
            )));
        }
        Ok(())
    }

    pub fn flow_control(&self) -> FlowControl {
        FlowControl {
            high_water: self.high_water,
            low_water: self.low_water,
        }
    }
}

/// High/low-water hysteresis on a channel's buffered byte count.
#[derive(Debug, Clone, Copy)]
pub struct FlowControl {
    high_water: usize,
    low_water: usize,
}

impl FlowControl {
    /// Call after each write. Returns `true` if the sender had to wait.
    pub async fn after_write<C: DataChannel + ?Sized>(&self, channel: &C) -> bool {
        if channel.buffered_amount() <= self.high_water {
            return false;
        }
        tracing::trace!(
            buffered = channel.buffered_amount(),
            low_water = self.low_water,
            "Backpressure: waiting for drain"
        );
        channel.buffered_amount_low(self.low_water).await;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_16k_chunks_with_8m_4m_marks() {
        let opts = TransferOptions::default();
        assert_eq!(opts.chunk_size, 16_384);
        assert_eq!(opts.high_water, 8_388_608);
        assert_eq!(opts.low_water, 4_194_304);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn zero_chunk_is_invalid() {
        let opts = TransferOptions {
            chunk_size: 0,
            ..Default::default()
        };
        assert!(opts.validate().is_err());
    }

    #[test]
    fn inverted_watermarks_are_invalid() {
        let opts = TransferOptions {
            chunk_size: 1024,
            high_water: 100,
            low_water: 200,
        };
        assert!(opts.validate().is_err());
    }
}
