use core::time::Duration;

/// Number of measurement channels a device exposes.
pub const CHANNEL_COUNT: usize = 4;

/// The physical quantity behind each channel index.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelKind {
    /// Volts across the shunt
    ShuntVoltage = 0,
    /// Volts on the bus (load side)
    BusVoltage = 1,
    /// Amps through the shunt
    Current = 2,
    /// Watts delivered to the load
    Power = 3,
}

impl ChannelKind {
    pub const ALL: [ChannelKind; CHANNEL_COUNT] = [
        ChannelKind::ShuntVoltage,
        ChannelKind::BusVoltage,
        ChannelKind::Current,
        ChannelKind::Power,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }
}

impl TryFrom<usize> for ChannelKind {
    type Error = usize;

    fn try_from(index: usize) -> Result<Self, Self::Error> {
        Self::ALL.get(index).copied().ok_or(index)
    }
}

/// A single periodically sampled measurement.
pub trait Channel {
    type Error;

    /// Starts periodic sampling of this channel.
    ///
    /// When other channels of the same device are already being sampled, the running period is
    /// kept and `period` is ignored.
    fn start(&self, period: Duration) -> Result<(), Self::Error>;

    fn stop(&self);

    /// The last sampled value, `NaN` until the first sample has been taken.
    #[must_use]
    fn value(&self) -> f32;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_round_trips() {
        for kind in ChannelKind::ALL {
            assert_eq!(ChannelKind::try_from(kind.index()), Ok(kind));
        }
        assert_eq!(ChannelKind::try_from(CHANNEL_COUNT), Err(CHANNEL_COUNT));
    }
}
